//! The `algebra` binding: rewriting, substitution, rendering and the
//! request-style compute API.

use std::collections::BTreeMap;

use boa_engine::object::ObjectInitializer;
use boa_engine::{Context, JsObject, JsResult, JsString, JsValue, NativeFunction};
use serde_json::Value;

use super::calculus::{into_js, scope_arg};
use crate::execution::value::{from_json, json_arg, optional_string_arg, string_arg, text, type_error};
use crate::execution::BindingModule;
use crate::symbolic::compute::{self, ComputeRequest};
use crate::symbolic::ops;
use crate::symbolic::rewrite as rewriting;
use crate::symbolic::{parse, parse_expr, Expr, Number, Statement};

pub const NAME: &str = "algebra";

fn statement_arg(args: &[JsValue], ctx: &mut Context) -> JsResult<Statement> {
    let source = string_arg(args, 0, "expr", ctx)?;
    parse(&source).map_err(into_js)
}

fn rewrite(args: &[JsValue], ctx: &mut Context, f: fn(&Expr) -> Expr) -> JsResult<JsValue> {
    let statement = statement_arg(args, ctx)?;
    Ok(text(statement.map(|e| f(&e)).to_string()))
}

fn simplify(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    rewrite(args, ctx, ops::simplify)
}

fn expand(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    rewrite(args, ctx, ops::expand)
}

fn factor(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    rewrite(args, ctx, ops::factor)
}

fn together(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    rewrite(args, ctx, rewriting::together)
}

fn cancel(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    rewrite(args, ctx, rewriting::cancel)
}

fn trigsimp(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    rewrite(args, ctx, rewriting::trigsimp)
}

fn apart(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let statement = statement_arg(args, ctx)?;
    let var = match optional_string_arg(args, 1, ctx)? {
        Some(var) => var,
        None => match statement.free_symbols().into_iter().next() {
            Some(var) => var,
            None => return Ok(text(statement.map(|e| ops::simplify(&e)).to_string())),
        },
    };
    let split = statement.try_map(|e| rewriting::apart(&e, &var)).map_err(into_js)?;
    Ok(text(split.to_string()))
}

/// Substitution mapping whose values are numbers or expression strings.
fn mapping_arg(args: &[JsValue], index: usize, ctx: &mut Context) -> JsResult<BTreeMap<String, Expr>> {
    let map = match json_arg(args, index, ctx) {
        Value::Object(map) => map,
        Value::Null => return Ok(BTreeMap::new()),
        other => return Err(type_error(format!("mapping must be an object, got {}", other))),
    };
    map.into_iter()
        .map(|(name, value)| {
            let expr = match &value {
                Value::Number(n) => Expr::Num(Number::from_f64(n.as_f64().unwrap_or(f64::NAN))),
                Value::String(s) => parse_expr(s).map_err(into_js)?,
                other => return Err(type_error(format!("value for '{}' must be a number or string, got {}", name, other))),
            };
            Ok((name, expr))
        })
        .collect()
}

fn subs(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let statement = statement_arg(args, ctx)?;
    let mapping = mapping_arg(args, 1, ctx)?;
    Ok(text(statement.map(|e| ops::substitute(&e, &mapping)).to_string()))
}

fn evalf(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let expr = statement_arg(args, ctx)?.into_zero_form();
    let scope = scope_arg(args, 1, ctx)?;
    ops::evaluate(&expr, &scope).map(JsValue::from).map_err(into_js)
}

fn latex(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    Ok(text(statement_arg(args, ctx)?.to_latex()))
}

fn free_symbols(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let symbols: Vec<Value> = statement_arg(args, ctx)?
        .free_symbols()
        .into_iter()
        .map(Value::String)
        .collect();
    from_json(Value::Array(symbols), ctx)
}

fn js_compute(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let request: ComputeRequest = serde_json::from_value(json_arg(args, 0, ctx))
        .map_err(|e| type_error(format!("invalid compute request: {}", e)))?;
    let response = compute::compute(&request).map_err(into_js)?;
    let json = serde_json::to_value(response).map_err(|e| type_error(e.to_string()))?;
    from_json(json, ctx)
}

fn js_batch(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let items = match json_arg(args, 0, ctx) {
        Value::Array(items) => items,
        other => return Err(type_error(format!("batch expects an array, got {}", other))),
    };
    from_json(Value::Array(compute::batch(&items)), ctx)
}

fn js_tasks(_: &JsValue, _: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let names = compute::task_names().into_iter().map(Value::String).collect();
    from_json(Value::Array(names), ctx)
}

#[derive(Debug, Default)]
pub struct AlgebraModule;

impl BindingModule for AlgebraModule {
    fn name(&self) -> &str {
        NAME
    }

    fn install(&self, ctx: &mut Context) -> JsResult<JsObject> {
        let functions: [(NativeFunction, &str, usize); 14] = [
            (NativeFunction::from_fn_ptr(simplify), "simplify", 1),
            (NativeFunction::from_fn_ptr(expand), "expand", 1),
            (NativeFunction::from_fn_ptr(factor), "factor", 1),
            (NativeFunction::from_fn_ptr(together), "together", 1),
            (NativeFunction::from_fn_ptr(cancel), "cancel", 1),
            (NativeFunction::from_fn_ptr(apart), "apart", 2),
            (NativeFunction::from_fn_ptr(trigsimp), "trigsimp", 1),
            (NativeFunction::from_fn_ptr(subs), "subs", 2),
            (NativeFunction::from_fn_ptr(evalf), "evalf", 2),
            (NativeFunction::from_fn_ptr(latex), "latex", 1),
            (NativeFunction::from_fn_ptr(free_symbols), "freeSymbols", 1),
            (NativeFunction::from_fn_ptr(js_compute), "compute", 1),
            (NativeFunction::from_fn_ptr(js_batch), "batch", 1),
            (NativeFunction::from_fn_ptr(js_tasks), "tasks", 0),
        ];
        let mut object = ObjectInitializer::new(ctx);
        for (function, name, length) in functions {
            object.function(function, JsString::from(name), length);
        }
        Ok(object.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::property::Attribute;
    use boa_engine::{js_string, Source};
    use std::collections::HashMap;

    fn eval(code: &str) -> String {
        let mut ctx = Context::default();
        let module = AlgebraModule.install(&mut ctx).unwrap();
        ctx.register_global_property(js_string!("algebra"), module, Attribute::all())
            .unwrap();
        let value = ctx.eval(Source::from_bytes(code)).unwrap();
        value.to_string(&mut ctx).unwrap().to_std_string_escaped()
    }

    #[test]
    fn rational_rewrites_are_exposed() {
        assert_eq!(eval("algebra.cancel('(x^2 - 1)/(x - 1)')"), "x + 1");
        assert_eq!(eval("algebra.together('1/x + 1/y')"), "(x + y)/(x*y)");
        assert_eq!(eval("algebra.apart('1/(x^2 - 1)', 'x')"), "-1/(2*(x + 1)) + 1/(2*(x - 1))");
        assert_eq!(eval("algebra.apart('1/(x^2 - 1)')"), "-1/(2*(x + 1)) + 1/(2*(x - 1))");
        assert_eq!(eval("algebra.trigsimp('sin(x)/cos(x)')"), "tan(x)");
    }

    #[test]
    fn scope_is_only_numbers() {
        let mut ctx = Context::default();
        let scope = JsValue::from_json(&serde_json::json!({"x": 2}), &mut ctx).unwrap();
        let parsed = scope_arg(&[JsValue::undefined(), scope], 1, &mut ctx).unwrap();
        assert_eq!(parsed, HashMap::from([("x".to_string(), 2.0)]));
    }
}
