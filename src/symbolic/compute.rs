//! Task-dispatch API over the symbolic engine: one request in, one rendered
//! result out, plus a non-throwing batch form.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::expr::{Expr, Statement};
use super::matrix::Matrix;
use super::number::{format_f64, Number};
use super::ops::{self, Direction};
use super::{parser, rewrite, SymbolicError};

const TASKS: &[&str] = &[
    "apart", "cancel", "collect", "det", "diff", "evalf", "expand", "factor", "integrate", "inv",
    "limit", "ratsimp", "series", "simplify", "solve", "subs", "together", "transpose", "trigsimp",
];

const ALIASES: &[(&str, &str)] = &[
    ("d", "diff"),
    ("derivative", "diff"),
    ("determinant", "det"),
    ("differentiate", "diff"),
    ("inverse", "inv"),
];

fn default_series_order() -> u32 {
    6
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeRequest {
    pub expr: String,
    pub task: String,
    #[serde(default)]
    pub var: Option<String>,
    #[serde(default)]
    pub subs: Option<BTreeMap<String, f64>>,
    #[serde(default, alias = "solve_for")]
    pub solve_for: Option<String>,
    #[serde(default = "default_series_order", alias = "series_order")]
    pub series_order: u32,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl ComputeRequest {
    pub fn new(expr: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            task: task.into(),
            var: None,
            subs: None,
            solve_for: None,
            series_order: default_series_order(),
            kwargs: Map::new(),
        }
    }

    pub fn with_var(mut self, var: impl Into<String>) -> Self {
        self.var = Some(var.into());
        self
    }

    pub fn with_subs(mut self, subs: BTreeMap<String, f64>) -> Self {
        self.subs = Some(subs);
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComputeResponse {
    pub result: String,
    pub latex: Option<String>,
    pub meta: Map<String, Value>,
}

enum Outcome {
    Statement(Statement),
    Roots(Vec<Expr>),
    Value(f64),
}

impl Outcome {
    fn render(&self) -> (String, String) {
        match self {
            Outcome::Statement(s) => (s.to_string(), s.to_latex()),
            Outcome::Roots(roots) => {
                let plain: Vec<String> = roots.iter().map(Expr::to_string).collect();
                let latex: Vec<String> = roots.iter().map(Expr::to_latex).collect();
                (
                    format!("[{}]", plain.join(", ")),
                    format!("\\left[ {}\\right]", latex.join(", ")),
                )
            }
            Outcome::Value(v) => (format_f64(*v), format_f64(*v)),
        }
    }
}

/// Sorted list of supported task names and their aliases.
pub fn task_names() -> Vec<String> {
    let mut names: Vec<String> = TASKS
        .iter()
        .chain(ALIASES.iter().map(|(alias, _)| alias))
        .map(|s| s.to_string())
        .collect();
    names.sort();
    names
}

fn canonical_task(task: &str) -> &str {
    let task = task.trim();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == task)
        .map(|(_, target)| *target)
        .unwrap_or(task)
}

fn require_var<'a>(req: &'a ComputeRequest, task: &str) -> Result<&'a str, SymbolicError> {
    req.var
        .as_deref()
        .ok_or_else(|| SymbolicError::InvalidArgument(format!("Provide 'var' for {}.", task)))
}

fn as_exprs(subs: &BTreeMap<String, f64>) -> BTreeMap<String, Expr> {
    subs.iter()
        .map(|(k, v)| (k.clone(), Expr::Num(Number::from_f64(*v))))
        .collect()
}

fn kwarg_expr(req: &ComputeRequest, key: &str) -> Result<Option<Expr>, SymbolicError> {
    match req.kwargs.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64().map(|f| Expr::Num(Number::from_f64(f)))),
        Some(Value::String(s)) => parser::parse_expr(s).map(Some),
        Some(other) => Err(SymbolicError::InvalidArgument(format!(
            "kwarg '{}' must be a number or expression, got {}",
            key, other
        ))),
    }
}

/// Picks the variable a task acts on: explicit, else the first free symbol.
fn default_symbol(explicit: Option<&str>, statement: &Statement) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| statement.free_symbols().into_iter().next())
}

const MAX_DIFF_ORDER: u64 = 50;

fn diff_order(req: &ComputeRequest) -> Result<u32, SymbolicError> {
    match req.kwargs.get("order") {
        None | Some(Value::Null) => Ok(1),
        Some(v) => v
            .as_u64()
            .filter(|n| *n <= MAX_DIFF_ORDER)
            .map(|n| n as u32)
            .ok_or_else(|| {
                SymbolicError::InvalidArgument(format!(
                    "order must be an integer between 0 and {}, got {}",
                    MAX_DIFF_ORDER, v
                ))
            }),
    }
}

/// Runs one task against one expression.
pub fn compute(req: &ComputeRequest) -> Result<ComputeResponse, SymbolicError> {
    if !(1..=50).contains(&req.series_order) {
        return Err(SymbolicError::InvalidArgument(format!(
            "seriesOrder must be between 1 and 50, got {}",
            req.series_order
        )));
    }
    let task = canonical_task(&req.task);
    if matches!(task, "det" | "inv" | "transpose") {
        return matrix_task(&req.expr, task);
    }

    let statement = parser::parse(&req.expr)?;
    let subs = req.subs.as_ref().map(as_exprs).unwrap_or_default();
    let mut meta = Map::new();

    let outcome = match task {
        "simplify" => {
            let simplified = statement.clone().map(|e| ops::simplify(&e));
            Outcome::Statement(if subs.is_empty() {
                simplified
            } else {
                simplified.map(|e| ops::substitute(&e, &subs))
            })
        }
        "expand" => Outcome::Statement(statement.clone().map(|e| ops::expand(&e))),
        "factor" => Outcome::Statement(statement.clone().map(|e| ops::factor(&e))),
        "collect" => {
            let var = require_var(req, "collect")?;
            Outcome::Statement(statement.clone().map(|e| ops::collect(&e, var)))
        }
        "together" => Outcome::Statement(statement.clone().map(|e| rewrite::together(&e))),
        "cancel" | "ratsimp" => Outcome::Statement(statement.clone().map(|e| rewrite::cancel(&e))),
        "trigsimp" => Outcome::Statement(statement.clone().map(|e| rewrite::trigsimp(&e))),
        "apart" => match default_symbol(req.var.as_deref(), &statement) {
            Some(var) => Outcome::Statement(statement.clone().try_map(|e| rewrite::apart(&e, &var))?),
            None => Outcome::Statement(statement.clone().map(|e| ops::simplify(&e))),
        },
        "solve" => {
            let target = default_symbol(req.solve_for.as_deref().or(req.var.as_deref()), &statement)
                .ok_or_else(|| {
                    SymbolicError::InvalidArgument(
                        "No variable to solve for; provide 'solveFor' or 'var'.".to_string(),
                    )
                })?;
            Outcome::Roots(ops::solve(&statement.clone().into_zero_form(), &target)?)
        }
        "diff" => {
            let var = require_var(req, "differentiation")?;
            let order = diff_order(req)?;
            Outcome::Statement(statement.clone().map(|e| ops::diff_n(&e, var, order)))
        }
        "integrate" => {
            let var = require_var(req, "integration")?;
            let bounds = (kwarg_expr(req, "lower")?, kwarg_expr(req, "upper")?);
            Outcome::Statement(statement.clone().try_map(|e| match &bounds {
                (Some(lo), Some(hi)) => ops::integrate_definite(&e, var, lo, hi),
                _ => ops::integrate(&e, var),
            })?)
        }
        "evalf" => {
            let expr = statement.clone().into_zero_form();
            let expr = ops::substitute(&expr, &subs);
            Outcome::Value(ops::evaluate(&expr, &HashMap::new())?)
        }
        "limit" => {
            let var = default_symbol(req.var.as_deref(), &statement).unwrap_or_else(|| "x".into());
            let point = req.subs.as_ref().and_then(|s| s.get(&var)).copied().unwrap_or(0.0);
            meta.insert("limitPoint".into(), json!(point));
            let others: BTreeMap<String, Expr> =
                subs.into_iter().filter(|(k, _)| *k != var).collect();
            let expr = ops::substitute(&statement.clone().into_zero_form(), &others);
            let dir = match req.kwargs.get("dir").and_then(Value::as_str) {
                Some(d) => Direction::parse(d)?,
                None => Direction::Both,
            };
            Outcome::Statement(Statement::Expr(Expr::Num(ops::limit(&expr, &var, point, dir)?)))
        }
        "series" => {
            let var = default_symbol(req.var.as_deref(), &statement).unwrap_or_else(|| "x".into());
            let center = subs.get(&var).cloned().unwrap_or_else(|| Expr::int(0));
            let expr = statement.clone().into_zero_form();
            Outcome::Statement(Statement::Expr(ops::series(&expr, &var, &center, req.series_order)))
        }
        "subs" => {
            if subs.is_empty() {
                return Err(SymbolicError::InvalidArgument(
                    "Provide 'subs' mapping for substitution.".to_string(),
                ));
            }
            Outcome::Statement(statement.clone().map(|e| ops::substitute(&e, &subs)))
        }
        _ => return Err(SymbolicError::Unsupported(req.task.clone())),
    };

    let free: Vec<Value> = statement.free_symbols().into_iter().map(Value::String).collect();
    meta.insert("freeSymbols".into(), Value::Array(free));
    let (result, latex) = outcome.render();
    Ok(ComputeResponse { result, latex: Some(latex), meta })
}

fn matrix_task(source: &str, task: &str) -> Result<ComputeResponse, SymbolicError> {
    let action = match task {
        "det" => "compute determinant",
        "inv" => "compute inverse",
        _ => "transpose",
    };
    let matrix = Matrix::parse(source)?.ok_or_else(|| {
        SymbolicError::InvalidArgument(format!("Expression is not a matrix; cannot {}.", action))
    })?;
    let (result, latex) = match task {
        "det" => {
            let det = matrix.det()?;
            (det.to_string(), det.to_latex())
        }
        "inv" => {
            let inverse = matrix.inverse()?;
            (inverse.to_string(), inverse.to_latex())
        }
        _ => {
            let transposed = matrix.transpose();
            (transposed.to_string(), transposed.to_latex())
        }
    };
    let mut meta = Map::new();
    let free: Vec<Value> = matrix.free_symbols().into_iter().map(Value::String).collect();
    meta.insert("freeSymbols".into(), Value::Array(free));
    meta.insert("shape".into(), json!([matrix.rows(), matrix.cols()]));
    Ok(ComputeResponse { result, latex: Some(latex), meta })
}

/// Runs every request, reporting failures per item instead of aborting.
pub fn batch(items: &[Value]) -> Vec<Value> {
    items
        .iter()
        .map(|item| {
            let outcome = serde_json::from_value::<ComputeRequest>(item.clone())
                .map_err(|e| format!("ValidationError: {}", e))
                .and_then(|req| compute(&req).map_err(|e| format!("{}: {}", e.kind(), e)));
            match outcome {
                Ok(resp) => json!({ "ok": true, "data": resp }),
                Err(error) => json!({ "ok": false, "error": error }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_route_to_diff() {
        let resp = compute(&ComputeRequest::new("x^2", "derivative").with_var("x")).unwrap();
        assert_eq!(resp.result, "2*x");
        assert_eq!(resp.meta["freeSymbols"], json!(["x"]));
    }

    #[test]
    fn diff_order_is_validated() {
        let mut req = ComputeRequest::new("x^3", "diff").with_var("x");
        req.kwargs.insert("order".into(), json!(4));
        assert_eq!(compute(&req).unwrap().result, "0");

        req.kwargs.insert("order".into(), json!(4294967297u64));
        let err = compute(&req).unwrap_err();
        assert_eq!(err.kind(), "ValueError");
        assert!(err.to_string().contains("between 0 and 50"));

        req.kwargs.insert("order".into(), json!("two"));
        assert!(compute(&req).is_err());
    }

    #[test]
    fn rational_rewrites_are_distinct_tasks() {
        let run = |expr: &str, task: &str| compute(&ComputeRequest::new(expr, task)).unwrap().result;
        assert_eq!(run("(x^2 - 1)/(x - 1)", "cancel"), "x + 1");
        assert_eq!(run("(x^2 - 1)/(x - 1)", "ratsimp"), "x + 1");
        assert_eq!(run("1/x + 1/y", "together"), "(x + y)/(x*y)");
        assert_eq!(run("1/(x^2 - 1)", "apart"), "-1/(2*(x + 1)) + 1/(2*(x - 1))");
        assert_eq!(run("sin(x)^2 + cos(x)^2", "trigsimp"), "1");
        assert_ne!(run("1/(x^2 - 1)", "apart"), run("1/(x^2 - 1)", "simplify"));
    }

    #[test]
    fn matrix_tasks() {
        let resp = compute(&ComputeRequest::new("Matrix([[1, 2], [3, 4]])", "det")).unwrap();
        assert_eq!(resp.result, "-2");
        assert_eq!(resp.meta["shape"], json!([2, 2]));

        let resp = compute(&ComputeRequest::new("[[a, 1], [0, 1]]", "inverse")).unwrap();
        assert_eq!(resp.result, "Matrix([[1/a, -1/a], [0, 1]])");
        assert_eq!(resp.meta["freeSymbols"], json!(["a"]));

        let resp = compute(&ComputeRequest::new("[[1, 2, 3]]", "transpose")).unwrap();
        assert_eq!(resp.result, "Matrix([[1], [2], [3]])");
    }

    #[test]
    fn matrix_tasks_reject_plain_expressions() {
        let err = compute(&ComputeRequest::new("x^2", "det")).unwrap_err();
        assert_eq!(err.to_string(), "Expression is not a matrix; cannot compute determinant.");
        let err = compute(&ComputeRequest::new("[[1, 2], [2, 4]]", "inv")).unwrap_err();
        assert_eq!(err.to_string(), "Matrix det == 0; not invertible.");
        assert!(task_names().contains(&"transpose".to_string()));
    }

    #[test]
    fn apart_rejects_symbolic_coefficients() {
        let err = compute(&ComputeRequest::new("1/(x + y)", "apart").with_var("x")).unwrap_err();
        assert_eq!(err.kind(), "ValueError");
    }

    #[test]
    fn solve_defaults_to_first_free_symbol() {
        let resp = compute(&ComputeRequest::new("x^2 = 9", "solve")).unwrap();
        assert_eq!(resp.result, "[-3, 3]");
    }

    #[test]
    fn solve_without_symbols_fails() {
        let err = compute(&ComputeRequest::new("4", "solve")).unwrap_err();
        assert_eq!(err.kind(), "ValueError");
    }

    #[test]
    fn limit_records_point() {
        let mut subs = BTreeMap::new();
        subs.insert("x".to_string(), 0.0);
        let resp =
            compute(&ComputeRequest::new("sin(x)/x", "limit").with_var("x").with_subs(subs)).unwrap();
        assert_eq!(resp.result, "1");
        assert_eq!(resp.meta["limitPoint"], json!(0.0));
    }

    #[test]
    fn evalf_applies_subs() {
        let mut subs = BTreeMap::new();
        subs.insert("x".to_string(), 2.0);
        let resp = compute(&ComputeRequest::new("x^2 + 1", "evalf").with_subs(subs)).unwrap();
        assert_eq!(resp.result, "5");
    }

    #[test]
    fn missing_var_and_unknown_task() {
        assert!(compute(&ComputeRequest::new("x", "integrate")).is_err());
        let err = compute(&ComputeRequest::new("x", "frobnicate")).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported operation: frobnicate");
    }

    #[test]
    fn batch_never_throws() {
        let out = batch(&[
            json!({ "expr": "x + x", "task": "simplify" }),
            json!({ "expr": "x +", "task": "simplify" }),
            json!({ "task": "simplify" }),
        ]);
        assert_eq!(out[0]["ok"], json!(true));
        assert_eq!(out[0]["data"]["result"], json!("2*x"));
        assert_eq!(out[1]["ok"], json!(false));
        assert!(out[1]["error"].as_str().unwrap().starts_with("ParseError"));
        assert!(out[2]["error"].as_str().unwrap().starts_with("ValidationError"));
    }

    #[test]
    fn task_list_is_sorted_and_includes_aliases() {
        let names = task_names();
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
        assert!(names.contains(&"differentiate".to_string()));
    }
}
