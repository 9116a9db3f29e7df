//! The `math` binding: expression evaluation and dense linear algebra over
//! plain JS numbers and row-major arrays.

use std::f64::consts::{E, PI};

use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{js_string, Context, JsError, JsObject, JsResult, JsString, JsValue, NativeFunction};
use evalexpr::{
    eval_with_context, ContextWithMutableFunctions, ContextWithMutableVariables,
    DefaultNumericTypes, Function, HashMapContext, Value as ExprValue,
};
use serde_json::Value;
use thiserror::Error;

use crate::execution::value::{arg, from_json, json_arg, range_error, string_arg, type_error};
use crate::execution::BindingModule;

pub const NAME: &str = "math";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericError {
    #[error("{0}")]
    Type(String),

    #[error("{0}")]
    Shape(String),

    #[error("matrix is singular")]
    Singular,

    #[error("cannot evaluate '{expr}': {reason}")]
    Eval { expr: String, reason: String },
}

type Result<T> = std::result::Result<T, NumericError>;

/// A scalar, vector or row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    Scalar(f64),
    Vector(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

fn number(value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| NumericError::Type(format!("expected a number, got {}", value)))
}

impl Tensor {
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Number(_) => Ok(Tensor::Scalar(number(value)?)),
            Value::Array(items) if items.iter().all(Value::is_array) && !items.is_empty() => {
                let rows = items
                    .iter()
                    .filter_map(Value::as_array)
                    .map(|cells| cells.iter().map(number).collect::<Result<Vec<_>>>())
                    .collect::<Result<Vec<_>>>()?;
                let width = rows[0].len();
                if rows.iter().any(|r| r.len() != width) {
                    return Err(NumericError::Shape("matrix rows have different lengths".into()));
                }
                Ok(Tensor::Matrix(rows))
            }
            Value::Array(items) => Ok(Tensor::Vector(items.iter().map(number).collect::<Result<_>>()?)),
            other => Err(NumericError::Type(format!("expected a number or array, got {}", other))),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Tensor::Scalar(x) => Value::from(*x),
            Tensor::Vector(v) => Value::from(v.clone()),
            Tensor::Matrix(m) => Value::Array(m.iter().map(|r| Value::from(r.clone())).collect()),
        }
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Tensor {
        match self {
            Tensor::Scalar(x) => Tensor::Scalar(f(*x)),
            Tensor::Vector(v) => Tensor::Vector(v.iter().copied().map(f).collect()),
            Tensor::Matrix(m) => {
                Tensor::Matrix(m.iter().map(|r| r.iter().copied().map(&f).collect()).collect())
            }
        }
    }

    fn flatten(&self) -> Vec<f64> {
        match self {
            Tensor::Scalar(x) => vec![*x],
            Tensor::Vector(v) => v.clone(),
            Tensor::Matrix(m) => m.iter().flatten().copied().collect(),
        }
    }

    fn matrix(&self, what: &str) -> Result<&Vec<Vec<f64>>> {
        match self {
            Tensor::Matrix(m) => Ok(m),
            _ => Err(NumericError::Type(format!("{} expects a matrix", what))),
        }
    }
}

fn elementwise(a: &Tensor, b: &Tensor, op: impl Fn(f64, f64) -> f64) -> Result<Tensor> {
    use Tensor::*;
    Ok(match (a, b) {
        (Scalar(x), t) => t.map(|y| op(*x, y)),
        (t, Scalar(y)) => t.map(|x| op(x, *y)),
        (Vector(u), Vector(v)) if u.len() == v.len() => {
            Vector(u.iter().zip(v).map(|(x, y)| op(*x, *y)).collect())
        }
        (Matrix(m), Matrix(n)) if m.len() == n.len() && m.iter().zip(n).all(|(r, s)| r.len() == s.len()) => {
            Matrix(
                m.iter()
                    .zip(n)
                    .map(|(r, s)| r.iter().zip(s).map(|(x, y)| op(*x, *y)).collect())
                    .collect(),
            )
        }
        _ => return Err(NumericError::Shape("operands have different shapes".into())),
    })
}

pub fn add(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    elementwise(a, b, |x, y| x + y)
}

pub fn subtract(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    elementwise(a, b, |x, y| x - y)
}

pub fn dot(u: &[f64], v: &[f64]) -> Result<f64> {
    if u.len() != v.len() {
        return Err(NumericError::Shape(format!(
            "dot product of vectors with lengths {} and {}",
            u.len(),
            v.len()
        )));
    }
    Ok(u.iter().zip(v).map(|(x, y)| x * y).sum())
}

fn columns(m: &[Vec<f64>]) -> usize {
    m.first().map(Vec::len).unwrap_or(0)
}

/// Matrix product for matrices and vectors; scalars broadcast.
pub fn multiply(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    use Tensor::*;
    match (a, b) {
        (Scalar(_), _) | (_, Scalar(_)) => elementwise(a, b, |x, y| x * y),
        (Vector(u), Vector(v)) => Ok(Scalar(dot(u, v)?)),
        (Matrix(m), Vector(v)) => Ok(Vector(m.iter().map(|row| dot(row, v)).collect::<Result<_>>()?)),
        (Vector(v), Matrix(m)) => {
            if v.len() != m.len() {
                return Err(NumericError::Shape("vector length does not match matrix rows".into()));
            }
            Ok(Vector((0..columns(m)).map(|j| v.iter().zip(m).map(|(x, row)| x * row[j]).sum()).collect()))
        }
        (Matrix(m), Matrix(n)) => {
            if columns(m) != n.len() {
                return Err(NumericError::Shape(format!(
                    "cannot multiply {}x{} by {}x{}",
                    m.len(),
                    columns(m),
                    n.len(),
                    columns(n)
                )));
            }
            let t = transpose_rows(n);
            Ok(Matrix(
                m.iter()
                    .map(|row| t.iter().map(|col| dot(row, col)).collect::<Result<_>>())
                    .collect::<Result<_>>()?,
            ))
        }
    }
}

fn transpose_rows(m: &[Vec<f64>]) -> Vec<Vec<f64>> {
    (0..columns(m)).map(|j| m.iter().map(|row| row[j]).collect()).collect()
}

pub fn transpose(t: &Tensor) -> Tensor {
    match t {
        Tensor::Matrix(m) => Tensor::Matrix(transpose_rows(m)),
        other => other.clone(),
    }
}

fn square(m: &[Vec<f64>], what: &str) -> Result<usize> {
    let n = m.len();
    if m.iter().any(|r| r.len() != n) {
        return Err(NumericError::Shape(format!("{} requires a square matrix", what)));
    }
    Ok(n)
}

const PIVOT_EPSILON: f64 = 1e-12;

/// Determinant by Gaussian elimination with partial pivoting.
pub fn det(m: &[Vec<f64>]) -> Result<f64> {
    let n = square(m, "det")?;
    let mut a = m.to_vec();
    let mut det = 1.0;
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return Ok(0.0);
        }
        if pivot != col {
            a.swap(pivot, col);
            det = -det;
        }
        det *= a[col][col];
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
        }
    }
    Ok(det)
}

/// Inverse by Gauss-Jordan elimination.
pub fn inv(m: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let n = square(m, "inv")?;
    let mut a: Vec<Vec<f64>> = m
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = row.clone();
            r.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return Err(NumericError::Singular);
        }
        a.swap(pivot, col);
        let p = a[col][col];
        for k in 0..2 * n {
            a[col][k] /= p;
        }
        for row in 0..n {
            if row != col {
                let factor = a[row][col];
                for k in 0..2 * n {
                    a[row][k] -= factor * a[col][k];
                }
            }
        }
    }
    Ok(a.into_iter().map(|r| r[n..].to_vec()).collect())
}

pub fn identity(n: usize) -> Vec<Vec<f64>> {
    (0..n).map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect()).collect()
}

/// Euclidean norm for vectors, Frobenius norm for matrices.
pub fn norm(t: &Tensor) -> f64 {
    t.flatten().iter().map(|x| x * x).sum::<f64>().sqrt()
}

pub fn mean(t: &Tensor) -> Result<f64> {
    let values = t.flatten();
    if values.is_empty() {
        return Err(NumericError::Shape("mean of an empty array".into()));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

pub fn round(t: &Tensor, digits: i32) -> Tensor {
    let scale = 10f64.powi(digits);
    t.map(|x| (x * scale).round() / scale)
}

/// Appends `.0` to integer literals so division stays floating point.
fn float_literals(expr: &str) -> String {
    let chars: Vec<char> = expr.chars().collect();
    let mut out = String::with_capacity(expr.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let starts_number = c.is_ascii_digit()
            && (i == 0 || !(chars[i - 1].is_alphanumeric() || chars[i - 1] == '_' || chars[i - 1] == '.'));
        if !starts_number {
            out.push(c);
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        out.extend(&chars[start..i]);
        let is_float = matches!(chars.get(i), Some('.') | Some('e') | Some('E'));
        if !is_float {
            out.push_str(".0");
        }
    }
    out
}

fn unary(f: fn(f64) -> f64) -> Function<DefaultNumericTypes> {
    Function::new(move |arg| Ok(ExprValue::Float(f(arg.as_number()?))))
}

fn expression_context(
    scope: &serde_json::Map<String, Value>,
) -> std::result::Result<HashMapContext<DefaultNumericTypes>, String> {
    let mut ctx = HashMapContext::<DefaultNumericTypes>::new();
    let functions: [(&str, fn(f64) -> f64); 16] = [
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("sinh", f64::sinh),
        ("cosh", f64::cosh),
        ("tanh", f64::tanh),
        ("exp", f64::exp),
        ("ln", f64::ln),
        ("log10", f64::log10),
        ("log2", f64::log2),
        ("sqrt", f64::sqrt),
        ("cbrt", f64::cbrt),
        ("abs", f64::abs),
    ];
    for (name, f) in functions {
        ctx.set_function(name.to_string(), unary(f)).map_err(|e| e.to_string())?;
    }
    ctx.set_function(
        "log".to_string(),
        Function::new(|arg| match arg {
            ExprValue::Tuple(items) if items.len() == 2 => {
                let value: f64 = items[0].as_number()?;
                let base: f64 = items[1].as_number()?;
                Ok(ExprValue::Float(value.ln() / base.ln()))
            }
            other => {
                let value: f64 = other.as_number()?;
                Ok(ExprValue::Float(value.ln()))
            }
        }),
    )
    .map_err(|e| e.to_string())?;
    ctx.set_value("pi".to_string(), ExprValue::Float(PI)).map_err(|e| e.to_string())?;
    ctx.set_value("e".to_string(), ExprValue::Float(E)).map_err(|e| e.to_string())?;
    for (name, value) in scope {
        let value = match value {
            Value::Number(n) => ExprValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            Value::Bool(b) => ExprValue::Boolean(*b),
            other => return Err(format!("scope value '{}' must be a number, got {}", name, other)),
        };
        ctx.set_value(name.clone(), value).map_err(|e| e.to_string())?;
    }
    Ok(ctx)
}

/// Evaluates a numeric expression, with `scope` supplying variable values.
pub fn evaluate(expr: &str, scope: &serde_json::Map<String, Value>) -> Result<f64> {
    let fail = |reason: String| NumericError::Eval { expr: expr.to_string(), reason };
    let ctx = expression_context(scope).map_err(fail)?;
    match eval_with_context(&float_literals(expr), &ctx).map_err(|e| fail(e.to_string()))? {
        ExprValue::Float(f) => Ok(f),
        ExprValue::Int(i) => Ok(i as f64),
        other => Err(fail(format!("result {} is not a number", other))),
    }
}

fn into_js(err: NumericError) -> JsError {
    match err {
        NumericError::Shape(_) | NumericError::Singular => range_error(err.to_string()),
        _ => type_error(err.to_string()),
    }
}

fn tensor_arg(args: &[JsValue], index: usize, ctx: &mut Context) -> JsResult<Tensor> {
    Tensor::from_json(&json_arg(args, index, ctx)).map_err(into_js)
}

fn matrix_arg(args: &[JsValue], index: usize, what: &str, ctx: &mut Context) -> JsResult<Vec<Vec<f64>>> {
    let t = tensor_arg(args, index, ctx)?;
    t.matrix(what).cloned().map_err(into_js)
}

fn count_arg(args: &[JsValue], index: usize, what: &str, ctx: &mut Context) -> JsResult<usize> {
    let n = arg(args, index).to_number(ctx)?;
    if !(n.is_finite() && n >= 0.0 && n.fract() == 0.0) {
        return Err(range_error(format!("{} must be a non-negative integer", what)));
    }
    Ok(n as usize)
}

fn tensor_result(t: Tensor, ctx: &mut Context) -> JsResult<JsValue> {
    from_json(t.to_json(), ctx)
}

fn js_evaluate(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let expr = string_arg(args, 0, "expr", ctx)?;
    let scope = match json_arg(args, 1, ctx) {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => return Err(type_error(format!("scope must be an object, got {}", other))),
    };
    evaluate(&expr, &scope).map(JsValue::from).map_err(into_js)
}

fn binary(
    args: &[JsValue],
    ctx: &mut Context,
    op: fn(&Tensor, &Tensor) -> Result<Tensor>,
) -> JsResult<JsValue> {
    let a = tensor_arg(args, 0, ctx)?;
    let b = tensor_arg(args, 1, ctx)?;
    let t = op(&a, &b).map_err(into_js)?;
    tensor_result(t, ctx)
}

fn js_add(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    binary(args, ctx, add)
}

fn js_subtract(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    binary(args, ctx, subtract)
}

fn js_multiply(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    binary(args, ctx, multiply)
}

fn js_transpose(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let t = tensor_arg(args, 0, ctx)?;
    tensor_result(transpose(&t), ctx)
}

fn js_det(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let m = matrix_arg(args, 0, "det", ctx)?;
    det(&m).map(JsValue::from).map_err(into_js)
}

fn js_inv(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let m = matrix_arg(args, 0, "inv", ctx)?;
    let inverse = inv(&m).map_err(into_js)?;
    tensor_result(Tensor::Matrix(inverse), ctx)
}

fn js_identity(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let n = count_arg(args, 0, "n", ctx)?;
    tensor_result(Tensor::Matrix(identity(n)), ctx)
}

fn js_zeros(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let rows = count_arg(args, 0, "rows", ctx)?;
    if arg(args, 1).is_undefined() {
        return tensor_result(Tensor::Vector(vec![0.0; rows]), ctx);
    }
    let cols = count_arg(args, 1, "cols", ctx)?;
    tensor_result(Tensor::Matrix(vec![vec![0.0; cols]; rows]), ctx)
}

fn js_dot(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let u = tensor_arg(args, 0, ctx)?.flatten();
    let v = tensor_arg(args, 1, ctx)?.flatten();
    dot(&u, &v).map(JsValue::from).map_err(into_js)
}

fn js_norm(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let t = tensor_arg(args, 0, ctx)?;
    Ok(JsValue::from(norm(&t)))
}

fn js_sum(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let t = tensor_arg(args, 0, ctx)?;
    Ok(JsValue::from(t.flatten().iter().sum::<f64>()))
}

fn js_mean(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let t = tensor_arg(args, 0, ctx)?;
    mean(&t).map(JsValue::from).map_err(into_js)
}

fn js_linspace(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let start = arg(args, 0).to_number(ctx)?;
    let end = arg(args, 1).to_number(ctx)?;
    let n = if arg(args, 2).is_undefined() { 100 } else { count_arg(args, 2, "n", ctx)? };
    tensor_result(Tensor::Vector(linspace(start, end, n)), ctx)
}

fn js_round(_: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let t = tensor_arg(args, 0, ctx)?;
    let digits = if arg(args, 1).is_undefined() { 0 } else { count_arg(args, 1, "digits", ctx)? };
    tensor_result(round(&t, digits.min(15) as i32), ctx)
}

#[derive(Debug, Default)]
pub struct NumericModule;

impl BindingModule for NumericModule {
    fn name(&self) -> &str {
        NAME
    }

    fn install(&self, ctx: &mut Context) -> JsResult<JsObject> {
        let functions: [(NativeFunction, &str, usize); 15] = [
            (NativeFunction::from_fn_ptr(js_evaluate), "evaluate", 2),
            (NativeFunction::from_fn_ptr(js_add), "add", 2),
            (NativeFunction::from_fn_ptr(js_subtract), "subtract", 2),
            (NativeFunction::from_fn_ptr(js_multiply), "multiply", 2),
            (NativeFunction::from_fn_ptr(js_transpose), "transpose", 1),
            (NativeFunction::from_fn_ptr(js_det), "det", 1),
            (NativeFunction::from_fn_ptr(js_inv), "inv", 1),
            (NativeFunction::from_fn_ptr(js_identity), "identity", 1),
            (NativeFunction::from_fn_ptr(js_zeros), "zeros", 2),
            (NativeFunction::from_fn_ptr(js_dot), "dot", 2),
            (NativeFunction::from_fn_ptr(js_norm), "norm", 1),
            (NativeFunction::from_fn_ptr(js_sum), "sum", 1),
            (NativeFunction::from_fn_ptr(js_mean), "mean", 1),
            (NativeFunction::from_fn_ptr(js_linspace), "linspace", 3),
            (NativeFunction::from_fn_ptr(js_round), "round", 2),
        ];
        let mut object = ObjectInitializer::new(ctx);
        for (function, name, length) in functions {
            object.function(function, JsString::from(name), length);
        }
        object.property(js_string!("pi"), PI, Attribute::READONLY);
        object.property(js_string!("e"), E, Attribute::READONLY);
        Ok(object.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(v: Value) -> serde_json::Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn evaluates_with_functions_and_scope() {
        assert_eq!(evaluate("1/2", &scope(json!({}))).unwrap(), 0.5);
        assert_eq!(evaluate("x^2 + 1", &scope(json!({"x": 3}))).unwrap(), 10.0);
        assert!((evaluate("sin(pi/2)", &scope(json!({}))).unwrap() - 1.0).abs() < 1e-12);
        assert!((evaluate("log(8, 2)", &scope(json!({}))).unwrap() - 3.0).abs() < 1e-12);
        assert!(evaluate("y + 1", &scope(json!({}))).is_err());
    }

    #[test]
    fn literal_rewriting_leaves_identifiers_alone() {
        assert_eq!(float_literals("x2 + 3/4"), "x2 + 3.0/4.0");
        assert_eq!(float_literals("2.5e3"), "2.5e3");
    }

    #[test]
    fn matrix_products() {
        let a = Tensor::from_json(&json!([[1, 2], [3, 4]])).unwrap();
        let b = Tensor::from_json(&json!([[0, 1], [1, 0]])).unwrap();
        assert_eq!(
            multiply(&a, &b).unwrap(),
            Tensor::Matrix(vec![vec![2.0, 1.0], vec![4.0, 3.0]])
        );
        let v = Tensor::from_json(&json!([1, 1])).unwrap();
        assert_eq!(multiply(&a, &v).unwrap(), Tensor::Vector(vec![3.0, 7.0]));
        assert_eq!(multiply(&v, &v).unwrap(), Tensor::Scalar(2.0));
        assert!(add(&a, &v).is_err());
    }

    #[test]
    fn determinant_and_inverse() {
        let m = vec![vec![4.0, 7.0], vec![2.0, 6.0]];
        assert!((det(&m).unwrap() - 10.0).abs() < 1e-9);
        let i = inv(&m).unwrap();
        assert!((i[0][0] - 0.6).abs() < 1e-9);
        assert!((i[1][0] + 0.2).abs() < 1e-9);
        assert_eq!(inv(&[vec![1.0, 2.0], vec![2.0, 4.0]]), Err(NumericError::Singular));
        assert!(det(&[vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn helpers() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(norm(&Tensor::Vector(vec![3.0, 4.0])), 5.0);
        assert_eq!(round(&Tensor::Scalar(1.23456), 2), Tensor::Scalar(1.23));
        assert!(mean(&Tensor::Vector(vec![])).is_err());
        assert_eq!(transpose(&Tensor::Matrix(vec![vec![1.0, 2.0]])), Tensor::Matrix(vec![vec![1.0], vec![2.0]]));
    }
}
