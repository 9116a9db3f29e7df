//! Algebraic operations over [`Expr`]: canonical simplification, expansion,
//! calculus, equation solving and numeric evaluation.

use std::collections::{BTreeMap, HashMap};

use super::expr::{Constant, Expr, Func};
use super::number::Number;
use super::SymbolicError;

// ---------------------------------------------------------------------------
// simplification
// ---------------------------------------------------------------------------

/// Bottom-up canonical form: flattened sums/products, folded constants,
/// collected like terms and powers, sorted operands.
pub fn simplify(expr: &Expr) -> Expr {
    match expr {
        Expr::Num(_) | Expr::Const(_) | Expr::Sym(_) => expr.clone(),
        Expr::Add(terms) => simplify_add(terms.iter().map(simplify).collect()),
        Expr::Mul(factors) => simplify_mul(factors.iter().map(simplify).collect()),
        Expr::Pow(b, e) => simplify_pow(simplify(b), simplify(e)),
        Expr::Func(f, a) => simplify_func(*f, simplify(a)),
    }
}

fn rebuild_term(coeff: Number, mut rest: Vec<Expr>) -> Expr {
    if coeff.is_zero() {
        return Expr::int(0);
    }
    if rest.is_empty() {
        return Expr::Num(coeff);
    }
    if coeff.is_one() && rest.len() == 1 {
        return rest.remove(0);
    }
    if !coeff.is_one() {
        rest.insert(0, Expr::Num(coeff));
    }
    Expr::Mul(rest)
}

fn term_order(a: &Expr, b: &Expr) -> std::cmp::Ordering {
    let constant = |e: &Expr| e.free_symbols().is_empty();
    let (_, ra) = a.split_coefficient();
    let (_, rb) = b.split_coefficient();
    let key = |rest: Vec<Expr>| Expr::Mul(rest).sort_key();
    constant(a)
        .cmp(&constant(b))
        .then_with(|| b.degree().cmp(&a.degree()))
        .then_with(|| key(ra).cmp(&key(rb)))
}

fn simplify_add(terms: Vec<Expr>) -> Expr {
    let mut flat = Vec::with_capacity(terms.len());
    for t in terms {
        match t {
            Expr::Add(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }

    let mut constant = Number::ZERO;
    let mut groups: Vec<(String, Vec<Expr>, Number)> = Vec::new();
    for t in flat {
        if let Expr::Num(n) = t {
            constant = constant.add(n);
            continue;
        }
        let (coeff, rest) = t.split_coefficient();
        let key = Expr::Mul(rest.clone()).sort_key();
        match groups.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, c)) => *c = c.add(coeff),
            None => groups.push((key, rest, coeff)),
        }
    }

    let mut out: Vec<Expr> = groups
        .into_iter()
        .filter(|(_, _, c)| !c.is_zero())
        .map(|(_, rest, c)| rebuild_term(c, rest))
        .collect();
    if !constant.is_zero() {
        out.push(Expr::Num(constant));
    }
    out.sort_by(term_order);
    match out.len() {
        0 => Expr::int(0),
        1 => out.remove(0),
        _ => Expr::Add(out),
    }
}

fn split_power(expr: Expr) -> (Expr, Expr) {
    match expr {
        Expr::Pow(b, e) => (*b, *e),
        other => (other, Expr::int(1)),
    }
}

fn simplify_mul(factors: Vec<Expr>) -> Expr {
    let mut flat = Vec::with_capacity(factors.len());
    for f in factors {
        match f {
            Expr::Mul(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }

    let mut coeff = Number::ONE;
    let mut groups: Vec<(String, Expr, Vec<Expr>)> = Vec::new();
    for f in flat {
        if let Expr::Num(n) = f {
            coeff = coeff.mul(n);
            continue;
        }
        let (base, exp) = split_power(f);
        let key = base.sort_key();
        match groups.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, exps)) => exps.push(exp),
            None => groups.push((key, base, vec![exp])),
        }
    }
    if coeff.is_zero() {
        return Expr::int(0);
    }

    let mut rest = Vec::new();
    for (_, base, exps) in groups {
        let exponent = simplify_add(exps);
        match simplify_pow(base, exponent) {
            Expr::Num(n) => coeff = coeff.mul(n),
            Expr::Mul(inner) => {
                for x in inner {
                    match x {
                        Expr::Num(n) => coeff = coeff.mul(n),
                        other => rest.push(other),
                    }
                }
            }
            other => rest.push(other),
        }
    }
    if coeff.is_zero() {
        return Expr::int(0);
    }

    // numeric coefficient distributes over a single sum: 2*(x + 1) -> 2*x + 2
    if !coeff.is_one() && rest.len() == 1 {
        if let Expr::Add(terms) = &rest[0] {
            return simplify_add(
                terms
                    .iter()
                    .map(|t| simplify_mul(vec![Expr::Num(coeff), t.clone()]))
                    .collect(),
            );
        }
    }

    rest.sort_by_key(Expr::sort_key);
    rebuild_term(coeff, rest)
}

fn simplify_pow(base: Expr, exponent: Expr) -> Expr {
    if exponent.is_zero() {
        return Expr::int(1);
    }
    if exponent.is_one() {
        return base;
    }
    if base.is_one() {
        return Expr::int(1);
    }
    if let (Some(b), Some(e)) = (base.as_number(), exponent.as_number()) {
        if b.is_zero() && !e.is_negative() {
            return Expr::int(0);
        }
        if b.is_exact() && e.is_exact() {
            if let Some(n) = b.pow(e) {
                return Expr::Num(n);
            }
        } else if let Some(n) = b.pow(e) {
            return Expr::Num(n);
        }
        return Expr::pow(base, exponent);
    }
    if matches!(base, Expr::Const(Constant::E)) {
        return simplify_func(Func::Exp, exponent);
    }
    let int_exponent = exponent.as_number().and_then(Number::as_integer);
    match base {
        Expr::Pow(inner, e) if int_exponent.is_some() => {
            let combined = simplify_mul(vec![*e, exponent]);
            simplify_pow(*inner, combined)
        }
        Expr::Mul(factors) if int_exponent.is_some() => simplify_mul(
            factors
                .into_iter()
                .map(|f| simplify_pow(f, exponent.clone()))
                .collect(),
        ),
        Expr::Func(Func::Exp, arg) => {
            simplify_func(Func::Exp, simplify_mul(vec![*arg, exponent]))
        }
        base => Expr::pow(base, exponent),
    }
}

fn simplify_func(func: Func, arg: Expr) -> Expr {
    if let Some(n) = arg.as_number() {
        if !n.is_exact() {
            return Expr::Num(Number::Float(func.apply(n.to_f64())));
        }
        let exact = match (func, n.as_integer()) {
            (Func::Sin | Func::Tan | Func::Asin | Func::Atan | Func::Sinh | Func::Tanh, Some(0)) => {
                Some(0)
            }
            (Func::Cos | Func::Cosh | Func::Exp, Some(0)) => Some(1),
            (Func::Ln, Some(1)) => Some(0),
            _ => None,
        };
        if let Some(v) = exact {
            return Expr::int(v);
        }
        if func == Func::Abs {
            return Expr::Num(n.abs());
        }
    }
    match (func, &arg) {
        (Func::Sin, Expr::Const(Constant::Pi)) => Expr::int(0),
        (Func::Cos, Expr::Const(Constant::Pi)) => Expr::int(-1),
        (Func::Ln, Expr::Const(Constant::E)) => Expr::int(1),
        (Func::Exp, Expr::Func(Func::Ln, inner)) => (**inner).clone(),
        (Func::Ln, Expr::Func(Func::Exp, inner)) => (**inner).clone(),
        (Func::Abs, Expr::Func(Func::Abs, _)) => arg,
        _ => Expr::func(func, arg),
    }
}

// ---------------------------------------------------------------------------
// expansion
// ---------------------------------------------------------------------------

const MAX_EXPANSION_POWER: i64 = 64;

/// Distributes products over sums and multiplies out integer powers of sums.
pub fn expand(expr: &Expr) -> Expr {
    let expanded = match expr {
        Expr::Num(_) | Expr::Const(_) | Expr::Sym(_) => return expr.clone(),
        Expr::Add(terms) => Expr::Add(terms.iter().map(expand).collect()),
        Expr::Mul(factors) => expand_product(factors.iter().map(expand).collect()),
        Expr::Pow(b, e) => {
            let base = expand(b);
            let power = e.as_number().and_then(Number::as_integer);
            match (&base, power) {
                (Expr::Add(_), Some(n)) if (2..=MAX_EXPANSION_POWER).contains(&n) => {
                    expand_product(vec![base.clone(); n as usize])
                }
                _ => Expr::pow(base, expand(e)),
            }
        }
        Expr::Func(f, a) => Expr::func(*f, expand(a)),
    };
    simplify(&expanded)
}

fn expand_product(factors: Vec<Expr>) -> Expr {
    let mut acc = vec![Expr::int(1)];
    for f in factors {
        let f = simplify(&f);
        let terms = match f {
            Expr::Add(ts) => ts,
            other => vec![other],
        };
        let mut next = Vec::with_capacity(acc.len() * terms.len());
        for a in &acc {
            for t in &terms {
                next.push(simplify_mul(vec![a.clone(), t.clone()]));
            }
        }
        acc = next;
    }
    simplify_add(acc)
}

// ---------------------------------------------------------------------------
// substitution and numeric evaluation
// ---------------------------------------------------------------------------

pub fn substitute(expr: &Expr, bindings: &BTreeMap<String, Expr>) -> Expr {
    fn walk(expr: &Expr, bindings: &BTreeMap<String, Expr>) -> Expr {
        match expr {
            Expr::Sym(s) => bindings.get(s).cloned().unwrap_or_else(|| expr.clone()),
            Expr::Num(_) | Expr::Const(_) => expr.clone(),
            Expr::Add(xs) => Expr::Add(xs.iter().map(|x| walk(x, bindings)).collect()),
            Expr::Mul(xs) => Expr::Mul(xs.iter().map(|x| walk(x, bindings)).collect()),
            Expr::Pow(b, e) => Expr::pow(walk(b, bindings), walk(e, bindings)),
            Expr::Func(f, a) => Expr::func(*f, walk(a, bindings)),
        }
    }
    simplify(&walk(expr, bindings))
}

pub fn substitute_one(expr: &Expr, var: &str, value: Expr) -> Expr {
    let mut bindings = BTreeMap::new();
    bindings.insert(var.to_string(), value);
    substitute(expr, &bindings)
}

/// Evaluates to `f64`; every free symbol must be bound.
pub fn evaluate(expr: &Expr, scope: &HashMap<String, f64>) -> Result<f64, SymbolicError> {
    Ok(match expr {
        Expr::Num(n) => n.to_f64(),
        Expr::Const(c) => c.value(),
        Expr::Sym(s) => *scope
            .get(s)
            .ok_or_else(|| SymbolicError::UnboundSymbol(s.clone()))?,
        Expr::Add(xs) => {
            let mut sum = 0.0;
            for x in xs {
                sum += evaluate(x, scope)?;
            }
            sum
        }
        Expr::Mul(xs) => {
            let mut product = 1.0;
            for x in xs {
                product *= evaluate(x, scope)?;
            }
            product
        }
        Expr::Pow(b, e) => evaluate(b, scope)?.powf(evaluate(e, scope)?),
        Expr::Func(f, a) => f.apply(evaluate(a, scope)?),
    })
}

fn eval_at(expr: &Expr, var: &str, value: f64) -> Result<f64, SymbolicError> {
    let mut scope = HashMap::new();
    scope.insert(var.to_string(), value);
    evaluate(expr, &scope)
}

/// Rounds values that are within floating noise of an integer.
fn snap(value: f64) -> Number {
    let rounded = value.round();
    if value.is_finite() && (value - rounded).abs() < 1e-9 * value.abs().max(1.0) {
        Number::from_f64(rounded)
    } else {
        Number::Float(value)
    }
}

// ---------------------------------------------------------------------------
// calculus
// ---------------------------------------------------------------------------

pub fn diff(expr: &Expr, var: &str) -> Expr {
    simplify(&derive(expr, var))
}

pub fn diff_n(expr: &Expr, var: &str, order: u32) -> Expr {
    let mut out = simplify(expr);
    for _ in 0..order {
        out = diff(&out, var);
    }
    out
}

fn derive(expr: &Expr, var: &str) -> Expr {
    if !expr.contains(var) {
        return Expr::int(0);
    }
    match expr {
        Expr::Sym(_) => Expr::int(1),
        Expr::Num(_) | Expr::Const(_) => Expr::int(0),
        Expr::Add(terms) => Expr::Add(terms.iter().map(|t| derive(t, var)).collect()),
        Expr::Mul(factors) => Expr::Add(
            (0..factors.len())
                .map(|i| {
                    let mut product: Vec<Expr> = factors.clone();
                    product[i] = derive(&factors[i], var);
                    Expr::Mul(product)
                })
                .collect(),
        ),
        Expr::Pow(b, e) => {
            let (b, e) = (&**b, &**e);
            if !e.contains(var) {
                Expr::mul(vec![
                    e.clone(),
                    Expr::pow(b.clone(), Expr::add(vec![e.clone(), Expr::int(-1)])),
                    derive(b, var),
                ])
            } else if !b.contains(var) {
                Expr::mul(vec![expr.clone(), Expr::func(Func::Ln, b.clone()), derive(e, var)])
            } else {
                Expr::mul(vec![
                    expr.clone(),
                    Expr::add(vec![
                        Expr::mul(vec![derive(e, var), Expr::func(Func::Ln, b.clone())]),
                        Expr::mul(vec![e.clone(), derive(b, var), Expr::pow(b.clone(), Expr::int(-1))]),
                    ]),
                ])
            }
        }
        Expr::Func(f, u) => {
            let u = &**u;
            let outer = match f {
                Func::Sin => Expr::func(Func::Cos, u.clone()),
                Func::Cos => Expr::neg(Expr::func(Func::Sin, u.clone())),
                Func::Tan => Expr::add(vec![
                    Expr::pow(Expr::func(Func::Tan, u.clone()), Expr::int(2)),
                    Expr::int(1),
                ]),
                Func::Asin => Expr::pow(
                    Expr::sub(Expr::int(1), Expr::pow(u.clone(), Expr::int(2))),
                    Expr::Num(Number::Rational(-1, 2)),
                ),
                Func::Acos => Expr::neg(Expr::pow(
                    Expr::sub(Expr::int(1), Expr::pow(u.clone(), Expr::int(2))),
                    Expr::Num(Number::Rational(-1, 2)),
                )),
                Func::Atan => Expr::pow(
                    Expr::add(vec![Expr::pow(u.clone(), Expr::int(2)), Expr::int(1)]),
                    Expr::int(-1),
                ),
                Func::Sinh => Expr::func(Func::Cosh, u.clone()),
                Func::Cosh => Expr::func(Func::Sinh, u.clone()),
                Func::Tanh => Expr::sub(
                    Expr::int(1),
                    Expr::pow(Expr::func(Func::Tanh, u.clone()), Expr::int(2)),
                ),
                Func::Exp => expr.clone(),
                Func::Ln => Expr::pow(u.clone(), Expr::int(-1)),
                Func::Abs => Expr::div(u.clone(), expr.clone()),
            };
            Expr::mul(vec![outer, derive(u, var)])
        }
    }
}

/// Coefficient `a` when `u = a*var + b` with `a` free of `var` and non-zero.
fn linear_coefficient(u: &Expr, var: &str) -> Option<Expr> {
    let slope = diff(u, var);
    (!slope.contains(var) && !slope.is_zero()).then_some(slope)
}

/// Indefinite integral without the constant of integration.
pub fn integrate(expr: &Expr, var: &str) -> Result<Expr, SymbolicError> {
    let expr = simplify(expr);
    integrate_canonical(&expr, var, true).map(|e| simplify(&e))
}

fn no_closed_form(expr: &Expr) -> SymbolicError {
    SymbolicError::NoClosedForm(format!("integral of {}", expr))
}

fn integrate_canonical(expr: &Expr, var: &str, allow_expand: bool) -> Result<Expr, SymbolicError> {
    if !expr.contains(var) {
        return Ok(Expr::mul(vec![expr.clone(), Expr::sym(var)]));
    }
    let x = Expr::sym(var);
    match expr {
        Expr::Sym(_) => Ok(Expr::mul(vec![
            Expr::Num(Number::Rational(1, 2)),
            Expr::pow(x, Expr::int(2)),
        ])),
        Expr::Add(terms) => terms
            .iter()
            .map(|t| integrate_canonical(t, var, allow_expand))
            .collect::<Result<Vec<_>, _>>()
            .map(Expr::Add),
        Expr::Mul(factors) => {
            let (constant, dependent): (Vec<Expr>, Vec<Expr>) =
                factors.iter().cloned().partition(|f| !f.contains(var));
            if dependent.len() == 1 {
                let inner = integrate_canonical(&dependent[0], var, allow_expand)?;
                let mut product = constant;
                product.push(inner);
                return Ok(Expr::Mul(product));
            }
            if allow_expand {
                let expanded = expand(expr);
                if expanded != *expr {
                    return integrate_canonical(&expanded, var, false);
                }
            }
            Err(no_closed_form(expr))
        }
        Expr::Pow(b, e) => {
            let (b, e) = (&**b, &**e);
            if !e.contains(var) {
                if let (Expr::Add(_), Some(n)) = (b, e.as_number().and_then(Number::as_integer)) {
                    if allow_expand && n > 1 {
                        return integrate_canonical(&expand(expr), var, false);
                    }
                }
                let a = linear_coefficient(b, var).ok_or_else(|| no_closed_form(expr))?;
                if e.as_number() == Some(Number::MINUS_ONE) {
                    return Ok(Expr::div(Expr::func(Func::Ln, b.clone()), a));
                }
                let raised = simplify(&Expr::add(vec![e.clone(), Expr::int(1)]));
                return Ok(Expr::div(
                    Expr::pow(b.clone(), raised.clone()),
                    Expr::mul(vec![raised, a]),
                ));
            }
            if !b.contains(var) {
                let a = linear_coefficient(e, var).ok_or_else(|| no_closed_form(expr))?;
                return Ok(Expr::div(
                    expr.clone(),
                    Expr::mul(vec![a, Expr::func(Func::Ln, b.clone())]),
                ));
            }
            Err(no_closed_form(expr))
        }
        Expr::Func(f, u) => {
            let u = &**u;
            let a = linear_coefficient(u, var).ok_or_else(|| no_closed_form(expr))?;
            let anti = match f {
                Func::Sin => Expr::neg(Expr::func(Func::Cos, u.clone())),
                Func::Cos => Expr::func(Func::Sin, u.clone()),
                Func::Tan => Expr::neg(Expr::func(Func::Ln, Expr::func(Func::Cos, u.clone()))),
                Func::Exp => expr.clone(),
                Func::Sinh => Expr::func(Func::Cosh, u.clone()),
                Func::Cosh => Expr::func(Func::Sinh, u.clone()),
                Func::Ln => Expr::sub(
                    Expr::mul(vec![u.clone(), Expr::func(Func::Ln, u.clone())]),
                    u.clone(),
                ),
                _ => return Err(no_closed_form(expr)),
            };
            Ok(Expr::div(anti, a))
        }
        Expr::Num(_) | Expr::Const(_) => Ok(Expr::mul(vec![expr.clone(), x])),
    }
}

const SIMPSON_INTERVALS: usize = 1000;

/// Definite integral; falls back to Simpson quadrature when no antiderivative
/// is found.
pub fn integrate_definite(
    expr: &Expr,
    var: &str,
    lower: &Expr,
    upper: &Expr,
) -> Result<Expr, SymbolicError> {
    match integrate(expr, var) {
        Ok(anti) => Ok(simplify(&Expr::sub(
            substitute_one(&anti, var, upper.clone()),
            substitute_one(&anti, var, lower.clone()),
        ))),
        Err(SymbolicError::NoClosedForm(_)) => {
            let empty = HashMap::new();
            let a = evaluate(lower, &empty)?;
            let b = evaluate(upper, &empty)?;
            let h = (b - a) / SIMPSON_INTERVALS as f64;
            let mut sum = eval_at(expr, var, a)? + eval_at(expr, var, b)?;
            for i in 1..SIMPSON_INTERVALS {
                let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
                sum += weight * eval_at(expr, var, a + h * i as f64)?;
            }
            Ok(Expr::Num(snap(sum * h / 3.0)))
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Both,
    Left,
    Right,
}

impl Direction {
    pub fn parse(s: &str) -> Result<Self, SymbolicError> {
        match s {
            "+" => Ok(Direction::Right),
            "-" => Ok(Direction::Left),
            "+-" | "-+" | "" => Ok(Direction::Both),
            other => Err(SymbolicError::InvalidArgument(format!(
                "dir must be '+', '-' or '+-', got '{}'",
                other
            ))),
        }
    }
}

const LIMIT_TOLERANCE: f64 = 1e-6;

fn one_sided_limit(expr: &Expr, var: &str, point: f64, side: f64) -> Result<f64, SymbolicError> {
    let mut previous: Option<f64> = None;
    let mut last = f64::NAN;
    for k in 4..=9 {
        let h = 10f64.powi(-k);
        let x = if point.is_infinite() { point.signum() * 10f64.powi(k) } else { point + side * h };
        let v = eval_at(expr, var, x)?;
        if let Some(p) = previous {
            if v.is_finite() && p.is_finite() && v.abs() > 1e6 && v.abs() > p.abs() * 5.0 {
                last = v.signum() * f64::INFINITY;
                continue;
            }
        }
        previous = Some(v);
        last = v;
    }
    Ok(last)
}

/// Numeric limit of `expr` as `var` approaches `point`.
pub fn limit(expr: &Expr, var: &str, point: f64, dir: Direction) -> Result<Number, SymbolicError> {
    if point.is_finite() && dir == Direction::Both {
        if let Ok(v) = eval_at(expr, var, point) {
            if v.is_finite() {
                return Ok(snap(v));
            }
        }
    }
    let right = || one_sided_limit(expr, var, point, 1.0);
    let left = || one_sided_limit(expr, var, point, -1.0);
    let value = match dir {
        Direction::Right => right()?,
        Direction::Left => left()?,
        Direction::Both if point.is_infinite() => right()?,
        Direction::Both => {
            let (l, r) = (left()?, right()?);
            let agree = if l.is_infinite() || r.is_infinite() {
                l == r
            } else {
                (l - r).abs() <= LIMIT_TOLERANCE * l.abs().max(1.0)
            };
            if !agree {
                return Err(SymbolicError::LimitDoesNotExist(format!(
                    "{} as {} -> {} (left {}, right {})",
                    expr, var, point, l, r
                )));
            }
            (l + r) / 2.0
        }
    };
    if value.is_nan() {
        return Err(SymbolicError::LimitDoesNotExist(format!("{} as {} -> {}", expr, var, point)));
    }
    if value.is_infinite() {
        return Ok(Number::Float(value));
    }
    let rounded = (value * 1e8).round() / 1e8;
    Ok(snap(rounded))
}

/// Taylor polynomial of `expr` around `center` with terms below `order`.
pub fn series(expr: &Expr, var: &str, center: &Expr, order: u32) -> Expr {
    let x = Expr::sym(var);
    let shift = if center.is_zero() {
        x
    } else {
        Expr::sub(x, center.clone())
    };
    let mut derivative = simplify(expr);
    let mut factorial = Number::ONE;
    let mut terms = Vec::new();
    for k in 0..order {
        if k > 0 {
            derivative = diff(&derivative, var);
            factorial = factorial.mul(Number::int(i64::from(k)));
        }
        let at_center = substitute_one(&derivative, var, center.clone());
        if at_center.is_zero() {
            continue;
        }
        let coeff = factorial.recip().unwrap_or(Number::ONE);
        terms.push(Expr::mul(vec![
            Expr::Num(coeff),
            at_center,
            Expr::pow(shift.clone(), Expr::int(i64::from(k))),
        ]));
    }
    simplify(&Expr::Add(terms))
}

// ---------------------------------------------------------------------------
// polynomials and solving
// ---------------------------------------------------------------------------

/// Coefficients by degree when `expr` is a polynomial in `var`.
pub fn polynomial_coefficients(expr: &Expr, var: &str) -> Option<Vec<Expr>> {
    let expanded = expand(expr);
    let terms = match expanded {
        Expr::Add(ts) => ts,
        other => vec![other],
    };
    let mut coeffs: BTreeMap<usize, Vec<Expr>> = BTreeMap::new();
    for term in terms {
        let factors = match term {
            Expr::Mul(fs) => fs,
            other => vec![other],
        };
        let mut degree = 0usize;
        let mut rest = Vec::new();
        for f in factors {
            match &f {
                Expr::Sym(s) if s == var => degree += 1,
                Expr::Pow(b, e) if matches!(&**b, Expr::Sym(s) if s == var) => {
                    let k = e.as_number().and_then(Number::as_integer)?;
                    degree += usize::try_from(k).ok()?;
                }
                other if other.contains(var) => return None,
                _ => rest.push(f),
            }
        }
        coeffs.entry(degree).or_default().push(Expr::Mul(rest));
    }
    let top = coeffs.keys().next_back().copied().unwrap_or(0);
    let mut out = vec![Expr::int(0); top + 1];
    for (k, parts) in coeffs {
        out[k] = simplify(&Expr::Add(parts));
    }
    while out.len() > 1 && out.last().is_some_and(Expr::is_zero) {
        out.pop();
    }
    Some(out)
}

fn dedup_roots(mut roots: Vec<f64>) -> Vec<f64> {
    roots.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    roots.dedup_by(|a, b| (*a - *b).abs() < 1e-7);
    roots
}

fn bisect(f: &dyn Fn(f64) -> f64, mut lo: f64, mut hi: f64) -> f64 {
    let mut flo = f(lo);
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        let fm = f(mid);
        if fm == 0.0 {
            return mid;
        }
        if (fm < 0.0) == (flo < 0.0) {
            lo = mid;
            flo = fm;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Real roots of `f` on `[lo, hi]` found by sign changes on a fine grid.
fn scan_roots(f: &dyn Fn(f64) -> f64, lo: f64, hi: f64, steps: usize) -> Vec<f64> {
    let mut roots = Vec::new();
    let step = (hi - lo) / steps as f64;
    let mut x0 = lo;
    let mut y0 = f(x0);
    for i in 1..=steps {
        let x1 = lo + step * i as f64;
        let y1 = f(x1);
        if y0 == 0.0 {
            roots.push(x0);
        } else if y0.is_finite() && y1.is_finite() && (y0 < 0.0) != (y1 < 0.0) && y1 != 0.0 {
            let r = bisect(f, x0, x1);
            // sign changes across poles are not roots
            if f(r).abs() < 1e-6 {
                roots.push(r);
            }
        }
        x0 = x1;
        y0 = y1;
    }
    if y0 == 0.0 {
        roots.push(x0);
    }
    dedup_roots(roots)
}

fn numeric_coefficients(coeffs: &[Expr]) -> Option<Vec<f64>> {
    coeffs.iter().map(|c| c.as_number().map(Number::to_f64)).collect()
}

/// Solutions of `expr = 0` for `var`.
pub fn solve(expr: &Expr, var: &str) -> Result<Vec<Expr>, SymbolicError> {
    let target = expand(expr);
    let target = match &target {
        // a quotient is zero where its numerator is
        Expr::Mul(fs) => simplify(&Expr::Mul(
            fs.iter()
                .filter(|f| !matches!(f, Expr::Pow(_, e) if e.as_number().is_some_and(Number::is_negative)))
                .cloned()
                .collect(),
        )),
        other => other.clone(),
    };
    if !target.contains(var) {
        if target.is_zero() {
            return Err(SymbolicError::InvalidArgument(format!(
                "equation holds for every value of {}",
                var
            )));
        }
        return Ok(Vec::new());
    }

    if let Some(coeffs) = polynomial_coefficients(&target, var) {
        match coeffs.len() {
            2 => {
                let root = Expr::div(Expr::neg(coeffs[0].clone()), coeffs[1].clone());
                return Ok(vec![simplify(&root)]);
            }
            3 => return Ok(solve_quadratic(&coeffs[2], &coeffs[1], &coeffs[0])),
            n if n > 3 => {
                if let Some(numeric) = numeric_coefficients(&coeffs) {
                    return Ok(solve_polynomial_numeric(&numeric));
                }
                return Err(SymbolicError::NoClosedForm(format!(
                    "polynomial of degree {} with symbolic coefficients",
                    n - 1
                )));
            }
            _ => {}
        }
    }

    let others: Vec<_> = target.free_symbols().into_iter().filter(|s| s != var).collect();
    if !others.is_empty() {
        return Err(SymbolicError::NoClosedForm(format!(
            "cannot isolate {} in {} = 0",
            var, target
        )));
    }
    let f = |x: f64| eval_at(&target, var, x).unwrap_or(f64::NAN);
    Ok(scan_roots(&f, -100.0, 100.0, 20_000)
        .into_iter()
        .map(|r| Expr::Num(snap(r)))
        .collect())
}

fn solve_quadratic(a: &Expr, b: &Expr, c: &Expr) -> Vec<Expr> {
    let discriminant = simplify(&Expr::sub(
        Expr::pow(b.clone(), Expr::int(2)),
        Expr::mul(vec![Expr::int(4), a.clone(), c.clone()]),
    ));
    let two_a = Expr::mul(vec![Expr::int(2), a.clone()]);
    let neg_b = Expr::neg(b.clone());
    if let Some(d) = discriminant.as_number() {
        if d.is_zero() {
            return vec![simplify(&Expr::div(neg_b, two_a))];
        }
        if d.is_negative() {
            let re = simplify(&Expr::div(neg_b, two_a.clone()));
            let im = simplify(&Expr::div(Expr::sqrt(Expr::Num(d.neg())), two_a));
            return vec![
                simplify(&Expr::sub(re.clone(), Expr::mul(vec![im.clone(), Expr::sym("I")]))),
                simplify(&Expr::add(vec![re, Expr::mul(vec![im, Expr::sym("I")])])),
            ];
        }
    }
    let root = Expr::sqrt(discriminant);
    let mut roots = vec![
        simplify(&Expr::div(Expr::sub(neg_b.clone(), root.clone()), two_a.clone())),
        simplify(&Expr::div(Expr::add(vec![neg_b, root]), two_a)),
    ];
    let numeric = HashMap::new();
    roots.sort_by(|x, y| {
        match (evaluate(x, &numeric), evaluate(y, &numeric)) {
            (Ok(p), Ok(q)) => p.partial_cmp(&q).unwrap_or(std::cmp::Ordering::Equal),
            _ => std::cmp::Ordering::Equal,
        }
    });
    roots
}

fn solve_polynomial_numeric(coeffs: &[f64]) -> Vec<Expr> {
    let lead = coeffs.last().copied().unwrap_or(1.0);
    // Cauchy bound: every real root lies in [-bound, bound]
    let bound = 1.0
        + coeffs[..coeffs.len() - 1]
            .iter()
            .map(|c| (c / lead).abs())
            .fold(0.0, f64::max);
    let f = |x: f64| coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c);
    scan_roots(&f, -bound, bound, 40_000)
        .into_iter()
        .map(|r| Expr::Num(snap(r)))
        .collect()
}

// ---------------------------------------------------------------------------
// factoring
// ---------------------------------------------------------------------------

pub(super) fn lcm(a: i64, b: i64) -> Option<i64> {
    let (mut x, mut y) = (a.checked_abs()?, b.checked_abs()?);
    while y != 0 {
        let t = x % y;
        x = y;
        y = t;
    }
    (a / x.max(1)).checked_mul(b)?.checked_abs()
}

pub(super) fn divisors(n: i64) -> Vec<i64> {
    let Some(n) = n.checked_abs() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut i = 1;
    while i * i <= n && i <= 1_000_000 {
        if n % i == 0 {
            out.push(i);
            out.push(n / i);
        }
        i += 1;
    }
    out
}

/// Integer coefficients for a polynomial with exact rational coefficients.
fn integer_coefficients(coeffs: &[Expr]) -> Option<Vec<i64>> {
    let numbers: Vec<Number> = coeffs.iter().map(Expr::as_number).collect::<Option<_>>()?;
    let mut scale = 1i64;
    for n in &numbers {
        match n {
            Number::Rational(_, d) => scale = lcm(scale, *d)?,
            Number::Float(_) => return None,
        }
    }
    numbers
        .iter()
        .map(|n| n.mul(Number::int(scale)).as_integer())
        .collect()
}

/// Horner evaluation; coefficients ordered by ascending degree.
fn eval_poly(coeffs: &[Number], x: Number) -> Number {
    coeffs
        .iter()
        .rev()
        .fold(Number::ZERO, |acc, c| acc.mul(x).add(*c))
}

/// Divides by `(x - root)`; coefficients ordered by ascending degree.
fn synthetic_division(coeffs: &[Number], root: Number) -> Vec<Number> {
    let mut out = vec![Number::ZERO; coeffs.len() - 1];
    let mut carry = Number::ZERO;
    for k in (1..coeffs.len()).rev() {
        carry = coeffs[k].add(carry.mul(root));
        out[k - 1] = carry;
    }
    out
}

/// Factors univariate polynomials with rational coefficients over the
/// rationals by peeling off rational roots; anything else is returned in
/// canonical form.
pub fn factor(expr: &Expr) -> Expr {
    let simplified = simplify(expr);
    let symbols = simplified.free_symbols();
    if symbols.len() != 1 {
        return simplified;
    }
    let var = symbols.into_iter().next().unwrap_or_default();
    let Some(coeffs) = polynomial_coefficients(&simplified, &var) else {
        return simplified;
    };
    let Some(ints) = integer_coefficients(&coeffs) else {
        return simplified;
    };
    if coeffs.len() < 3 {
        return simplified;
    }

    let x = Expr::sym(var.as_str());
    let mut factors: Vec<Expr> = Vec::new();
    let mut remaining: Vec<Number> = coeffs.iter().filter_map(Expr::as_number).collect();

    let zero_roots = remaining.iter().take_while(|c| c.is_zero()).count();
    if zero_roots > 0 {
        remaining.drain(..zero_roots);
        factors.push(simplify_pow(x.clone(), Expr::int(zero_roots as i64)));
    }

    // rational root theorem on the integer-scaled polynomial
    let constant_term = ints.get(zero_roots).copied().unwrap_or(1);
    let leading_term = ints.last().copied().unwrap_or(1);
    let mut candidates = Vec::new();
    for p in divisors(constant_term) {
        for q in divisors(leading_term) {
            for sign in [1, -1] {
                if let Some(r) = Number::rational(sign * p, q) {
                    if !candidates.contains(&r) {
                        candidates.push(r);
                    }
                }
            }
        }
    }

    let mut found_any = zero_roots > 0;
    for root in candidates {
        let mut multiplicity = 0i64;
        while remaining.len() > 1 && eval_poly(&remaining, root).is_zero() {
            remaining = synthetic_division(&remaining, root);
            multiplicity += 1;
        }
        if multiplicity > 0 {
            found_any = true;
            let linear = simplify(&Expr::sub(x.clone(), Expr::Num(root)));
            factors.push(simplify_pow(linear, Expr::int(multiplicity)));
        }
    }
    if !found_any {
        return simplified;
    }

    let lead = remaining.last().copied().unwrap_or(Number::ONE);
    let rest: Vec<Expr> = remaining
        .iter()
        .enumerate()
        .map(|(k, c)| {
            let c = c.div(lead).unwrap_or(*c);
            Expr::mul(vec![Expr::Num(c), Expr::pow(x.clone(), Expr::int(k as i64))])
        })
        .collect();
    let rest = simplify(&Expr::Add(rest));
    if !rest.is_one() {
        factors.push(rest);
    }
    let mut product = vec![Expr::Num(lead)];
    product.extend(factors);
    // keep factors unexpanded: only fold the numeric lead
    let (coeff, mut parts) = Expr::Mul(product).split_coefficient();
    parts.sort_by_key(Expr::sort_key);
    if coeff.is_one() {
        if parts.len() == 1 {
            return parts.remove(0);
        }
        return Expr::Mul(parts);
    }
    parts.insert(0, Expr::Num(coeff));
    Expr::Mul(parts)
}

/// Groups an expanded expression by powers of `var`.
pub fn collect(expr: &Expr, var: &str) -> Expr {
    let Some(coeffs) = polynomial_coefficients(expr, var) else {
        return expand(expr);
    };
    let x = Expr::sym(var);
    let mut terms: Vec<Expr> = coeffs
        .into_iter()
        .enumerate()
        .filter(|(_, c)| !c.is_zero())
        .map(|(k, c)| {
            let power = simplify_pow(x.clone(), Expr::int(k as i64));
            match c {
                Expr::Num(_) => simplify_mul(vec![c, power]),
                // keep symbolic coefficients grouped as a single factor
                other if k == 0 => other,
                other => Expr::Mul(vec![power, other]),
            }
        })
        .collect();
    terms.reverse();
    match terms.len() {
        0 => Expr::int(0),
        1 => terms.remove(0),
        _ => Expr::Add(terms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::parser::parse_expr;

    fn p(s: &str) -> Expr {
        parse_expr(s).unwrap()
    }

    fn show(e: Expr) -> String {
        e.to_string()
    }

    #[test]
    fn simplify_collects_like_terms() {
        assert_eq!(show(simplify(&p("x + x + 1 + 2"))), "2*x + 3");
        assert_eq!(show(simplify(&p("x - x"))), "0");
        assert_eq!(show(simplify(&p("x*x*x"))), "x^3");
        assert_eq!(show(simplify(&p("2*(x + 1) - 2"))), "2*x");
    }

    #[test]
    fn simplify_folds_special_values() {
        assert_eq!(show(simplify(&p("sin(0) + cos(0)"))), "1");
        assert_eq!(show(simplify(&p("log(E)"))), "1");
        assert_eq!(show(simplify(&p("sqrt(16)"))), "4");
    }

    #[test]
    fn expand_binomial() {
        assert_eq!(show(expand(&p("(x + 1)^2"))), "x^2 + 2*x + 1");
        assert_eq!(show(expand(&p("(x + 1)*(x - 1)"))), "x^2 - 1");
    }

    #[test]
    fn derivatives() {
        assert_eq!(show(diff(&p("x^3"), "x")), "3*x^2");
        assert_eq!(show(diff(&p("sin(x)"), "x")), "cos(x)");
        assert_eq!(show(diff(&p("exp(2*x)"), "x")), "2*exp(2*x)");
        assert_eq!(show(diff_n(&p("x^3"), "x", 2)), "6*x");
    }

    #[test]
    fn integrals() {
        assert_eq!(show(integrate(&p("x^2"), "x").unwrap()), "x^3/3");
        assert_eq!(show(integrate(&p("cos(x)"), "x").unwrap()), "sin(x)");
        assert_eq!(show(integrate(&p("1/x"), "x").unwrap()), "log(x)");
        assert!(integrate(&p("sin(x^2)"), "x").is_err());
    }

    #[test]
    fn definite_integral_uses_antiderivative() {
        let value = integrate_definite(&p("x^2"), "x", &Expr::int(0), &Expr::int(3)).unwrap();
        assert_eq!(show(value), "9");
    }

    #[test]
    fn solve_linear_and_quadratic() {
        assert_eq!(solve(&p("2*x - 4"), "x").unwrap(), vec![Expr::int(2)]);
        let roots: Vec<String> = solve(&p("x^2 - 4"), "x").unwrap().into_iter().map(show).collect();
        assert_eq!(roots, vec!["-2", "2"]);
    }

    #[test]
    fn solve_cubic_numerically() {
        let roots = solve(&p("x^3 - 6*x^2 + 11*x - 6"), "x").unwrap();
        assert_eq!(roots, vec![Expr::int(1), Expr::int(2), Expr::int(3)]);
    }

    #[test]
    fn limits() {
        assert_eq!(limit(&p("sin(x)/x"), "x", 0.0, Direction::Both).unwrap(), Number::ONE);
        assert!(limit(&p("1/x"), "x", 0.0, Direction::Both).is_err());
    }

    #[test]
    fn taylor_series() {
        assert_eq!(show(series(&p("exp(x)"), "x", &Expr::int(0), 3)), "x^2/2 + x + 1");
    }

    #[test]
    fn factor_quadratic() {
        assert_eq!(show(factor(&p("x^2 - 3*x + 2"))), "(x - 1)*(x - 2)");
        assert_eq!(show(factor(&p("x^3 - x"))), "x*(x + 1)*(x - 1)");
    }

    #[test]
    fn numeric_evaluation_requires_bindings() {
        let mut scope = HashMap::new();
        assert!(evaluate(&p("x + 1"), &scope).is_err());
        scope.insert("x".to_string(), 2.0);
        assert_eq!(evaluate(&p("x + 1"), &scope).unwrap(), 3.0);
    }
}
