//! Compile-then-invoke execution of generated code in a fresh engine context.

use std::cell::RefCell;
use std::rc::Rc;

use boa_engine::{js_string, Context, JsObject, JsValue, NativeFunction, Script, Source};
use boa_gc::{Finalize, Trace};
use thiserror::Error;
use tracing::{debug, warn};

use super::backend::{BindingSet, LibraryLoadError};
use super::capture::CaptureSurface;
use super::value::{error_message, render_returned, thrown_message};
use super::{ExecutionResult, Failure};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CompilationError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RuntimeError(pub String);

/// A compiled async function awaiting its arguments.
#[derive(Debug)]
pub struct Invocable {
    function: JsObject,
    params: Vec<String>,
}

impl Invocable {
    /// Parameter names in the order [`SandboxExecutor::invoke`] expects the
    /// arguments.
    pub fn params(&self) -> &[String] {
        &self.params
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Settlement {
    Returned(Option<String>),
    Threw(String),
}

/// First settlement of the awaited promise. Values are rendered to strings
/// before they are stored, so nothing here needs tracing.
#[derive(Debug, Clone, Default, Trace, Finalize)]
struct SettlementSlot {
    #[unsafe_ignore_trace]
    inner: Rc<RefCell<Option<Settlement>>>,
}

impl SettlementSlot {
    fn take(&self) -> Option<Settlement> {
        self.inner.borrow_mut().take()
    }
}

fn settle_with(slot: &SettlementSlot, settle: fn(&JsValue, &mut Context) -> Settlement) -> NativeFunction {
    NativeFunction::from_copy_closure_with_captures(
        move |_this, args, slot: &SettlementSlot, ctx| {
            let value = args.first().cloned().unwrap_or_default();
            let settlement = settle(&value, ctx);
            slot.inner.borrow_mut().get_or_insert(settlement);
            Ok(JsValue::undefined())
        },
        slot.clone(),
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SandboxExecutor;

impl SandboxExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Wraps `code` as the body of an async function taking `params`.
    pub fn compile(
        &self,
        ctx: &mut Context,
        code: &str,
        params: &[&str],
    ) -> Result<Invocable, CompilationError> {
        let source = format!("(async function({}) {{\n{}\n}})", params.join(", "), code);
        let script = Script::parse(Source::from_bytes(source.as_bytes()), None, ctx)
            .map_err(|e| CompilationError(e.to_string()))?;
        let value = script
            .evaluate(ctx)
            .map_err(|e| CompilationError(error_message(e, ctx)))?;
        let function = match value.as_object() {
            Some(obj) if obj.is_callable() => obj.clone(),
            _ => return Err(CompilationError("code did not produce a function".into())),
        };
        debug!(params = ?params, "compiled generated code");
        Ok(Invocable { function, params: params.iter().map(|p| p.to_string()).collect() })
    }

    /// Calls the function and drives the job queue until its promise settles.
    /// Returns the rendered value, `None` when nothing was returned.
    pub fn invoke(
        &self,
        ctx: &mut Context,
        invocable: &Invocable,
        args: &[JsValue],
    ) -> Result<Option<String>, RuntimeError> {
        let returned = invocable
            .function
            .call(&JsValue::undefined(), args, ctx)
            .map_err(|e| RuntimeError(error_message(e, ctx)))?;

        let then = match returned.as_object() {
            Some(obj) => obj
                .get(js_string!("then"), ctx)
                .map_err(|e| RuntimeError(error_message(e, ctx)))?,
            None => JsValue::undefined(),
        };
        let (promise, then) = match (returned.as_object(), then.as_object()) {
            (Some(promise), Some(then)) if then.is_callable() => (promise.clone(), then.clone()),
            _ => return Ok(render_returned(&returned, ctx)),
        };

        let slot = SettlementSlot::default();
        let on_fulfilled = settle_with(&slot, |v, ctx| Settlement::Returned(render_returned(v, ctx)))
            .to_js_function(ctx.realm());
        let on_rejected = settle_with(&slot, |v, ctx| Settlement::Threw(thrown_message(v, ctx)))
            .to_js_function(ctx.realm());
        let handlers = [JsValue::from(on_fulfilled), JsValue::from(on_rejected)];
        then.call(&JsValue::from(promise), &handlers, ctx)
            .map_err(|e| RuntimeError(error_message(e, ctx)))?;

        ctx.run_jobs();

        let settled = slot.take();
        match settled {
            Some(Settlement::Returned(value)) => Ok(value),
            Some(Settlement::Threw(message)) => Err(RuntimeError(message)),
            None => Err(RuntimeError("execution did not settle".into())),
        }
    }

    /// Runs `code` with `bindings` and `surface` in a fresh context and
    /// folds every outcome into an [`ExecutionResult`].
    pub fn run(&self, code: &str, bindings: &BindingSet, surface: CaptureSurface) -> ExecutionResult {
        let mut ctx = Context::default();

        let (console, plot) = match surface.install(&mut ctx) {
            Ok(pair) => pair,
            Err(e) => {
                let message = error_message(e, &mut ctx);
                return ExecutionResult::aborted(Failure::runtime(&RuntimeError(message)));
            }
        };

        let mut params = vec!["console", "plot"];
        let mut args = vec![console, plot];
        for (name, module) in bindings.iter() {
            match module.install(&mut ctx) {
                Ok(obj) => {
                    params.push(name);
                    args.push(obj.into());
                }
                Err(e) => {
                    let reason = error_message(e, &mut ctx);
                    let err = LibraryLoadError::Failed { name: name.to_string(), reason };
                    warn!(error = %err, "binding install failed");
                    return ExecutionResult::aborted(Failure::library_load(&err));
                }
            }
        }

        let invocable = match self.compile(&mut ctx, code, &params) {
            Ok(invocable) => invocable,
            Err(e) => {
                warn!(error = %e, "compilation failed");
                return ExecutionResult::aborted(Failure::compilation(&e));
            }
        };

        let outcome = self.invoke(&mut ctx, &invocable, &args);
        let logs = surface.logs();
        let plot = surface.last_plot();
        match outcome {
            Err(e) => {
                warn!(error = %e, "generated code threw");
                ExecutionResult::failed(logs, plot, Failure::runtime(&e))
            }
            Ok(returned) => match surface.reported_error() {
                Some(reported) => ExecutionResult::failed(logs, plot, Failure::user_reported(reported)),
                None => ExecutionResult::succeeded(logs, plot, returned),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{FailureKind, Status};

    fn run(code: &str) -> ExecutionResult {
        SandboxExecutor::new().run(code, &BindingSet::empty(), CaptureSurface::new())
    }

    #[test]
    fn returns_value_and_logs() {
        let r = run(r#"console.log("sum", 1 + 1); return 4;"#);
        assert_eq!(r.logs(), ["sum 2".to_string()]);
        assert_eq!(r.returned_value(), Some("4"));
        assert!(r.failure().is_none());
    }

    #[test]
    fn awaits_async_bodies() {
        let r = run("const v = await Promise.resolve(21); return v * 2;");
        assert_eq!(r.returned_value(), Some("42"));
    }

    #[test]
    fn undefined_is_absent() {
        let r = run("console.log('x');");
        assert_eq!(r.returned_value(), None);
        assert_eq!(r.status(), Status::Succeeded);
    }

    #[test]
    fn syntax_errors_are_compilation_failures() {
        let r = run("this is not valid (");
        let failure = r.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Compilation);
        assert!(failure.message.starts_with("Compilation Error: "));
        assert!(r.logs().is_empty());
    }

    #[test]
    fn thrown_errors_keep_prior_logs() {
        let r = run(r#"console.log("before"); throw new Error("boom");"#);
        assert_eq!(r.logs(), ["before".to_string()]);
        assert_eq!(r.failure().unwrap().message, "Runtime Error: boom");
        assert_eq!(r.returned_value(), None);
    }

    #[test]
    fn never_settling_body() {
        let r = run("await new Promise(() => {}); return 1;");
        assert_eq!(r.failure().unwrap().message, "Runtime Error: execution did not settle");
    }

    #[test]
    fn compile_exposes_params_in_order() {
        let mut ctx = Context::default();
        let inv = SandboxExecutor::new()
            .compile(&mut ctx, "return 1;", &["console", "plot", "math"])
            .unwrap();
        assert_eq!(inv.params(), ["console", "plot", "math"]);
    }
}
