//! The `calculus` binding: equation solving and calculus over expression
//! strings.

use std::collections::HashMap;

use boa_engine::object::ObjectInitializer;
use boa_engine::{Context, JsError, JsObject, JsResult, JsString, JsValue, NativeFunction};
use serde_json::Value;

use crate::execution::value::{arg, from_json, json_arg, optional_string_arg, string_arg, text, type_error};
use crate::execution::BindingModule;
use crate::symbolic::ops::{self, Direction};
use crate::symbolic::{parse, parse_expr, Expr, SymbolicError};

pub const NAME: &str = "calculus";

pub(crate) fn into_js(err: SymbolicError) -> JsError {
    type_error(err.to_string())
}

/// Reads an expression argument given either as a string or a number.
fn expr_arg(args: &[JsValue], index: usize, what: &str, ctx: &mut Context) -> JsResult<Expr> {
    let source = string_arg(args, index, what, ctx)?;
    parse_expr(&source).map_err(into_js)
}

fn optional_expr_arg(args: &[JsValue], index: usize, ctx: &mut Context) -> JsResult<Option<Expr>> {
    match optional_string_arg(args, index, ctx)? {
        Some(source) => parse_expr(&source).map(Some).map_err(into_js),
        None => Ok(None),
    }
}

fn var_arg(args: &[JsValue], index: usize, expr: &Expr, ctx: &mut Context) -> JsResult<String> {
    match optional_string_arg(args, index, ctx)? {
        Some(var) => Ok(var),
        None => expr
            .free_symbols()
            .into_iter()
            .next()
            .ok_or_else(|| type_error("expression has no variable")),
    }
}

fn order_arg(args: &[JsValue], index: usize, default: u32, ctx: &mut Context) -> JsResult<u32> {
    let value = arg(args, index);
    if value.is_undefined() || value.is_null() {
        return Ok(default);
    }
    let n = value.to_number(ctx)?;
    if !(n.is_finite() && n.fract() == 0.0 && (0.0..=50.0).contains(&n)) {
        return Err(type_error(format!("order must be an integer between 0 and 50, got {}", n)));
    }
    Ok(n as u32)
}

/// Numeric variable scope from a JS object of numbers.
pub(crate) fn scope_arg(args: &[JsValue], index: usize, ctx: &mut Context) -> JsResult<HashMap<String, f64>> {
    match json_arg(args, index, ctx) {
        Value::Null => Ok(HashMap::new()),
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| match v.as_f64() {
                Some(f) => Ok((k, f)),
                None => Err(type_error(format!("value for '{}' must be a number", k))),
            })
            .collect(),
        other => Err(type_error(format!("scope must be an object, got {}", other))),
    }
}

fn point_arg(args: &[JsValue], index: usize, ctx: &mut Context) -> JsResult<f64> {
    let value = arg(args, index);
    if let Some(s) = value.as_string() {
        return match s.to_std_string_escaped().trim() {
            "oo" | "inf" | "Infinity" | "+oo" => Ok(f64::INFINITY),
            "-oo" | "-inf" | "-Infinity" => Ok(f64::NEG_INFINITY),
            other => {
                let expr = parse_expr(other).map_err(into_js)?;
                ops::evaluate(&expr, &HashMap::new()).map_err(into_js)
            }
        };
    }
    if value.is_undefined() {
        return Ok(0.0);
    }
    value.to_number(ctx)
}

fn diff(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let expr = expr_arg(args, 0, "expr", ctx)?;
    let var = var_arg(args, 1, &expr, ctx)?;
    let order = order_arg(args, 2, 1, ctx)?;
    Ok(text(ops::diff_n(&expr, &var, order).to_string()))
}

fn integrate(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let expr = expr_arg(args, 0, "expr", ctx)?;
    let var = var_arg(args, 1, &expr, ctx)?;
    let lower = optional_expr_arg(args, 2, ctx)?;
    let upper = optional_expr_arg(args, 3, ctx)?;
    let result = match (lower, upper) {
        (Some(lo), Some(hi)) => ops::integrate_definite(&expr, &var, &lo, &hi),
        (None, None) => ops::integrate(&expr, &var),
        _ => return Err(type_error("definite integrals need both bounds")),
    };
    result.map(|e| text(e.to_string())).map_err(into_js)
}

fn solve(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let source = string_arg(args, 0, "expr", ctx)?;
    let target = parse(&source).map_err(into_js)?.into_zero_form();
    let var = var_arg(args, 1, &target, ctx)?;
    let roots = ops::solve(&target, &var).map_err(into_js)?;
    let roots: Vec<Value> = roots.iter().map(|r| Value::String(r.to_string())).collect();
    from_json(Value::Array(roots), ctx)
}

fn limit(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let expr = expr_arg(args, 0, "expr", ctx)?;
    let var = var_arg(args, 1, &expr, ctx)?;
    let point = point_arg(args, 2, ctx)?;
    let dir = match optional_string_arg(args, 3, ctx)? {
        Some(d) => Direction::parse(&d).map_err(into_js)?,
        None => Direction::Both,
    };
    let value = ops::limit(&expr, &var, point, dir).map_err(into_js)?;
    Ok(JsValue::from(value.to_f64()))
}

fn series(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let expr = expr_arg(args, 0, "expr", ctx)?;
    let var = var_arg(args, 1, &expr, ctx)?;
    let center = optional_expr_arg(args, 2, ctx)?.unwrap_or_else(|| Expr::int(0));
    let order = order_arg(args, 3, 6, ctx)?.max(1);
    Ok(text(ops::series(&expr, &var, &center, order).to_string()))
}

fn evaluate(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let expr = expr_arg(args, 0, "expr", ctx)?;
    let scope = scope_arg(args, 1, ctx)?;
    ops::evaluate(&expr, &scope).map(JsValue::from).map_err(into_js)
}

#[derive(Debug, Default)]
pub struct CalculusModule;

impl BindingModule for CalculusModule {
    fn name(&self) -> &str {
        NAME
    }

    fn install(&self, ctx: &mut Context) -> JsResult<JsObject> {
        let functions: [(NativeFunction, &str, usize); 6] = [
            (NativeFunction::from_fn_ptr(diff), "diff", 3),
            (NativeFunction::from_fn_ptr(integrate), "integrate", 4),
            (NativeFunction::from_fn_ptr(solve), "solve", 2),
            (NativeFunction::from_fn_ptr(limit), "limit", 4),
            (NativeFunction::from_fn_ptr(series), "series", 4),
            (NativeFunction::from_fn_ptr(evaluate), "evaluate", 2),
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

    fn eval(code: &str) -> String {
        let mut ctx = Context::default();
        let module = CalculusModule.install(&mut ctx).unwrap();
        ctx.register_global_property(js_string!("calculus"), module, Attribute::all())
            .unwrap();
        let value = ctx.eval(Source::from_bytes(code)).unwrap();
        value.to_string(&mut ctx).unwrap().to_std_string_escaped()
    }

    #[test]
    fn limit_points_accept_infinity_spellings() {
        assert_eq!(eval("Math.abs(calculus.limit('1/x', 'x', '-oo')) < 1e-6"), "true");
        assert_eq!(eval("Math.abs(calculus.limit('1/x', 'x', 'oo')) < 1e-6"), "true");
    }

    #[test]
    fn diff_order_is_bounded() {
        assert_eq!(eval("calculus.diff('x^3', 'x', 2)"), "6*x");
        assert_eq!(
            eval("try { calculus.diff('x^3', 'x', 4294967297); 'ok' } catch (e) { 'rejected' }"),
            "rejected"
        );
    }
}
