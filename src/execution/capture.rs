//! Per-execution capture of `console` output, reported errors and plots.

use std::cell::RefCell;
use std::rc::Rc;

use boa_engine::object::ObjectInitializer;
use boa_engine::{js_string, Context, JsResult, JsValue, NativeFunction};
use boa_gc::{Finalize, Trace};

use super::value::{display_value, json_arg};
use super::Plot;

#[derive(Debug, Clone, PartialEq)]
pub enum CapturedEvent {
    LogLine(String),
    PlotEmission(Plot),
    Failure(String),
}

/// Ordered event buffer shared between the host and the functions injected
/// into one engine context. A fresh surface is created for every run.
#[derive(Debug, Clone, Default, Trace, Finalize)]
pub struct CaptureSurface {
    #[unsafe_ignore_trace]
    events: Rc<RefCell<Vec<CapturedEvent>>>,
}

type Recorder = fn(&CaptureSurface, &[JsValue], &mut Context);

fn join_args(args: &[JsValue], ctx: &mut Context) -> String {
    args.iter()
        .map(|v| display_value(v, ctx))
        .collect::<Vec<_>>()
        .join(" ")
}

impl CaptureSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self, line: impl Into<String>) {
        self.events.borrow_mut().push(CapturedEvent::LogLine(line.into()));
    }

    /// Records a reported error. Only the first report in a run is kept.
    pub fn error(&self, message: impl Into<String>) {
        let mut events = self.events.borrow_mut();
        if events.iter().any(|e| matches!(e, CapturedEvent::Failure(_))) {
            return;
        }
        events.push(CapturedEvent::Failure(message.into()));
    }

    pub fn plot(&self, series: serde_json::Value, layout: serde_json::Value) {
        self.events
            .borrow_mut()
            .push(CapturedEvent::PlotEmission(Plot { series, layout }));
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.borrow().clone()
    }

    pub fn logs(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                CapturedEvent::LogLine(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    /// Last plot emitted; earlier emissions are overwritten.
    pub fn last_plot(&self) -> Option<Plot> {
        self.events.borrow().iter().rev().find_map(|e| match e {
            CapturedEvent::PlotEmission(plot) => Some(plot.clone()),
            _ => None,
        })
    }

    pub fn reported_error(&self) -> Option<String> {
        self.events.borrow().iter().find_map(|e| match e {
            CapturedEvent::Failure(message) => Some(message.clone()),
            _ => None,
        })
    }

    fn native(&self, record: Recorder) -> NativeFunction {
        NativeFunction::from_copy_closure_with_captures(
            move |_this, args, surface: &CaptureSurface, ctx| {
                record(surface, args, ctx);
                Ok(JsValue::undefined())
            },
            self.clone(),
        )
    }

    /// Builds the `console` object and the `plot` function bound to this
    /// surface inside `ctx`.
    pub fn install(&self, ctx: &mut Context) -> JsResult<(JsValue, JsValue)> {
        let log: Recorder = |s, args, ctx| s.log(join_args(args, ctx));
        let console = ObjectInitializer::new(ctx)
            .function(self.native(log), js_string!("log"), 0)
            .function(self.native(log), js_string!("info"), 0)
            .function(self.native(log), js_string!("warn"), 0)
            .function(
                self.native(|s, args, ctx| s.error(join_args(args, ctx))),
                js_string!("error"),
                0,
            )
            .build();

        let plot = self
            .native(|s, args, ctx| {
                let series = json_arg(args, 0, ctx);
                let layout = json_arg(args, 1, ctx);
                s.plot(series, layout)
            })
            .to_js_function(ctx.realm());

        Ok((console.into(), plot.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::Source;
    use serde_json::json;

    fn run(src: &str) -> CaptureSurface {
        let surface = CaptureSurface::new();
        let mut ctx = Context::default();
        let (console, plot) = surface.install(&mut ctx).unwrap();
        let f = ctx
            .eval(Source::from_bytes(&format!("(function(console, plot) {{ {} }})", src)))
            .unwrap();
        let f = f.as_object().unwrap().clone();
        f.call(&JsValue::undefined(), &[console, plot], &mut ctx).unwrap();
        surface
    }

    #[test]
    fn logs_keep_emission_order() {
        let s = run(r#"console.log("a"); console.info("b", 2); console.log({x: 1});"#);
        assert_eq!(s.logs(), vec!["a", "b 2", r#"{"x":1}"#]);
    }

    #[test]
    fn first_reported_error_wins() {
        let s = run(r#"console.error("x", 1); console.error("y"); console.log("after");"#);
        assert_eq!(s.reported_error().as_deref(), Some("x 1"));
        assert_eq!(s.logs(), vec!["after"]);
    }

    #[test]
    fn last_plot_wins() {
        let s = run(r#"plot([1], {t: 1}); plot([2], {t: 2});"#);
        let p = s.last_plot().unwrap();
        assert_eq!(p.series, json!([2]));
        assert_eq!(p.layout, json!({"t": 2}));
    }

    #[test]
    fn plot_without_layout() {
        let s = run("plot([{x: [0, 1], y: [1, 2]}]);");
        assert_eq!(s.last_plot().unwrap().layout, serde_json::Value::Null);
    }

    #[test]
    fn natives_survive_collection() {
        let surface = CaptureSurface::new();
        let mut ctx = Context::default();
        let (console, _) = surface.install(&mut ctx).unwrap();
        boa_gc::force_collect();
        let f = ctx
            .eval(Source::from_bytes("(function(console) { console.log('still here'); })"))
            .unwrap();
        let f = f.as_object().unwrap().clone();
        f.call(&JsValue::undefined(), &[console], &mut ctx).unwrap();
        assert_eq!(surface.logs(), vec!["still here"]);
    }

    #[test]
    fn surfaces_are_independent() {
        let a = CaptureSurface::new();
        let b = CaptureSurface::new();
        a.log("only a");
        assert!(b.events().is_empty());
        assert_eq!(a.events(), vec![CapturedEvent::LogLine("only a".into())]);
    }
}
