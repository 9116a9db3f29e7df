//! Expression tree, plain-text and LaTeX rendering.

use std::collections::BTreeSet;
use std::fmt;

use super::number::Number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Abs,
}

impl Func {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "asin" => Func::Asin,
            "acos" => Func::Acos,
            "atan" => Func::Atan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "exp" => Func::Exp,
            "log" | "ln" => Func::Ln,
            "abs" | "Abs" => Func::Abs,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Asin => "asin",
            Func::Acos => "acos",
            Func::Atan => "atan",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
            Func::Tanh => "tanh",
            Func::Exp => "exp",
            Func::Ln => "log",
            Func::Abs => "Abs",
        }
    }

    pub fn apply(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Asin => x.asin(),
            Func::Acos => x.acos(),
            Func::Atan => x.atan(),
            Func::Sinh => x.sinh(),
            Func::Cosh => x.cosh(),
            Func::Tanh => x.tanh(),
            Func::Exp => x.exp(),
            Func::Ln => x.ln(),
            Func::Abs => x.abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    Pi,
    E,
}

impl Constant {
    pub fn value(self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(Number),
    Const(Constant),
    Sym(String),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Func(Func, Box<Expr>),
}

impl Expr {
    pub fn int(n: i64) -> Self {
        Expr::Num(Number::int(n))
    }

    pub fn num(n: Number) -> Self {
        Expr::Num(n)
    }

    pub fn sym(name: impl Into<String>) -> Self {
        Expr::Sym(name.into())
    }

    pub fn add(terms: Vec<Expr>) -> Self {
        Expr::Add(terms)
    }

    pub fn mul(factors: Vec<Expr>) -> Self {
        Expr::Mul(factors)
    }

    pub fn pow(base: Expr, exponent: Expr) -> Self {
        Expr::Pow(Box::new(base), Box::new(exponent))
    }

    pub fn func(func: Func, arg: Expr) -> Self {
        Expr::Func(func, Box::new(arg))
    }

    pub fn neg(expr: Expr) -> Self {
        Expr::Mul(vec![Expr::int(-1), expr])
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Self {
        Expr::Add(vec![lhs, Expr::neg(rhs)])
    }

    pub fn div(lhs: Expr, rhs: Expr) -> Self {
        Expr::Mul(vec![lhs, Expr::pow(rhs, Expr::int(-1))])
    }

    pub fn sqrt(expr: Expr) -> Self {
        Expr::pow(expr, Expr::Num(Number::Rational(1, 2)))
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Expr::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_number().is_some_and(Number::is_zero)
    }

    pub fn is_one(&self) -> bool {
        self.as_number().is_some_and(Number::is_one)
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            Expr::Sym(s) => s == name,
            Expr::Num(_) | Expr::Const(_) => false,
            Expr::Add(xs) | Expr::Mul(xs) => xs.iter().any(|x| x.contains(name)),
            Expr::Pow(b, e) => b.contains(name) || e.contains(name),
            Expr::Func(_, a) => a.contains(name),
        }
    }

    pub fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Sym(s) => {
                out.insert(s.clone());
            }
            Expr::Num(_) | Expr::Const(_) => {}
            Expr::Add(xs) | Expr::Mul(xs) => xs.iter().for_each(|x| x.collect_symbols(out)),
            Expr::Pow(b, e) => {
                b.collect_symbols(out);
                e.collect_symbols(out);
            }
            Expr::Func(_, a) => a.collect_symbols(out),
        }
    }

    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    /// Sum of integer powers of symbols in a product term; orders sums by degree.
    pub fn degree(&self) -> i64 {
        match self {
            Expr::Sym(_) => 1,
            Expr::Pow(b, e) if matches!(**b, Expr::Sym(_)) => {
                e.as_number().and_then(Number::as_integer).unwrap_or(0)
            }
            Expr::Mul(xs) => xs.iter().map(Expr::degree).sum(),
            _ => 0,
        }
    }

    /// Canonical ordering key used when sorting terms and factors.
    pub fn sort_key(&self) -> String {
        self.to_string()
    }

    /// Splits a product into its numeric coefficient and the remaining factors.
    pub fn split_coefficient(&self) -> (Number, Vec<Expr>) {
        match self {
            Expr::Num(n) => (*n, Vec::new()),
            Expr::Mul(xs) => {
                let mut coeff = Number::ONE;
                let mut rest = Vec::with_capacity(xs.len());
                for x in xs {
                    match x {
                        Expr::Num(n) => coeff = coeff.mul(*n),
                        other => rest.push(other.clone()),
                    }
                }
                (coeff, rest)
            }
            other => (Number::ONE, vec![other.clone()]),
        }
    }

    pub fn to_latex(&self) -> String {
        let mut out = String::new();
        write_latex(self, &mut out);
        out
    }
}

/// Either a bare expression or an equation `lhs = rhs`.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expr(Expr),
    Equation(Expr, Expr),
}

impl Statement {
    /// `lhs - rhs` for equations, the expression itself otherwise.
    pub fn into_zero_form(self) -> Expr {
        match self {
            Statement::Expr(e) => e,
            Statement::Equation(l, r) => Expr::sub(l, r),
        }
    }

    pub fn map(self, mut f: impl FnMut(Expr) -> Expr) -> Statement {
        match self {
            Statement::Expr(e) => Statement::Expr(f(e)),
            Statement::Equation(l, r) => Statement::Equation(f(l), f(r)),
        }
    }

    pub fn try_map<E>(self, mut f: impl FnMut(Expr) -> Result<Expr, E>) -> Result<Statement, E> {
        Ok(match self {
            Statement::Expr(e) => Statement::Expr(f(e)?),
            Statement::Equation(l, r) => Statement::Equation(f(l)?, f(r)?),
        })
    }

    pub fn free_symbols(&self) -> BTreeSet<String> {
        match self {
            Statement::Expr(e) => e.free_symbols(),
            Statement::Equation(l, r) => {
                let mut out = l.free_symbols();
                r.collect_symbols(&mut out);
                out
            }
        }
    }

    pub fn to_latex(&self) -> String {
        match self {
            Statement::Expr(e) => e.to_latex(),
            Statement::Equation(l, r) => format!("{} = {}", l.to_latex(), r.to_latex()),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Expr(e) => write!(f, "{}", e),
            Statement::Equation(l, r) => write!(f, "{} = {}", l, r),
        }
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Add(_) => 1,
        Expr::Mul(_) => 2,
        Expr::Num(n) if n.is_negative() || matches!(n, Number::Rational(_, d) if *d != 1) => 2,
        Expr::Pow(..) => 3,
        _ => 4,
    }
}

/// A product split for rendering: sign, numerator and denominator parts.
struct Fraction {
    negative: bool,
    coeff_num: Option<Number>,
    coeff_den: Option<Number>,
    numer: Vec<Expr>,
    denom: Vec<Expr>,
}

fn split_fraction(factors: &[Expr]) -> Fraction {
    let mut coeff = Number::ONE;
    let mut numer = Vec::new();
    let mut denom = Vec::new();
    for f in factors {
        match f {
            Expr::Num(n) => coeff = coeff.mul(*n),
            Expr::Pow(b, e) => match e.as_number() {
                Some(n) if n.is_negative() => {
                    let flipped = n.neg();
                    if flipped.is_one() {
                        denom.push((**b).clone());
                    } else {
                        denom.push(Expr::Pow(b.clone(), Box::new(Expr::Num(flipped))));
                    }
                }
                _ => numer.push(f.clone()),
            },
            other => numer.push(other.clone()),
        }
    }
    let negative = coeff.is_negative();
    let coeff = coeff.abs();
    let (coeff_num, coeff_den) = match coeff {
        Number::Rational(n, d) => (
            (n != 1).then_some(Number::int(n)),
            (d != 1).then_some(Number::int(d)),
        ),
        Number::Float(v) => ((v != 1.0).then_some(coeff), None),
    };
    Fraction { negative, coeff_num, coeff_den, numer, denom }
}

fn write_factor(f: &mut fmt::Formatter<'_>, expr: &Expr, min_prec: u8) -> fmt::Result {
    if precedence(expr) < min_prec {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

fn write_product(f: &mut fmt::Formatter<'_>, coeff: Option<Number>, parts: &[Expr]) -> fmt::Result {
    let mut first = true;
    if let Some(c) = coeff {
        write!(f, "{}", c)?;
        first = false;
    }
    for p in parts {
        if !first {
            f.write_str("*")?;
        }
        write_factor(f, p, 3)?;
        first = false;
    }
    if first {
        f.write_str("1")?;
    }
    Ok(())
}

fn write_mul(f: &mut fmt::Formatter<'_>, factors: &[Expr]) -> fmt::Result {
    let frac = split_fraction(factors);
    if frac.negative {
        f.write_str("-")?;
    }
    write_product(f, frac.coeff_num, &frac.numer)?;
    let den_count = frac.denom.len() + usize::from(frac.coeff_den.is_some());
    if den_count == 0 {
        return Ok(());
    }
    f.write_str("/")?;
    if den_count == 1 {
        match (frac.coeff_den, frac.denom.first()) {
            (Some(c), _) => write!(f, "{}", c),
            (None, Some(d)) => write_factor(f, d, 3),
            (None, None) => Ok(()),
        }
    } else {
        f.write_str("(")?;
        write_product(f, frac.coeff_den, &frac.denom)?;
        f.write_str(")")
    }
}

fn is_negative_term(expr: &Expr) -> bool {
    match expr {
        Expr::Num(n) => n.is_negative(),
        Expr::Mul(_) => expr.split_coefficient().0.is_negative(),
        _ => false,
    }
}

fn negate_for_display(expr: &Expr) -> Expr {
    match expr {
        Expr::Num(n) => Expr::Num(n.neg()),
        Expr::Mul(xs) => Expr::Mul(
            xs.iter()
                .map(|x| match x {
                    Expr::Num(n) => Expr::Num(n.neg()),
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(n) => write!(f, "{}", n),
            Expr::Const(Constant::Pi) => f.write_str("pi"),
            Expr::Const(Constant::E) => f.write_str("E"),
            Expr::Sym(s) => f.write_str(s),
            Expr::Add(terms) => {
                for (i, t) in terms.iter().enumerate() {
                    if i == 0 {
                        write!(f, "{}", t)?;
                    } else if is_negative_term(t) {
                        write!(f, " - {}", negate_for_display(t))?;
                    } else {
                        write!(f, " + {}", t)?;
                    }
                }
                Ok(())
            }
            Expr::Mul(factors) => write_mul(f, factors),
            Expr::Pow(b, e) => {
                if e.as_number() == Some(Number::Rational(1, 2)) {
                    return write!(f, "sqrt({})", b);
                }
                if e.as_number().is_some_and(Number::is_negative) {
                    return write_mul(f, std::slice::from_ref(self));
                }
                write_factor(f, b, 4)?;
                f.write_str("^")?;
                write_factor(f, e, 4)
            }
            Expr::Func(func, arg) => write!(f, "{}({})", func.name(), arg),
        }
    }
}

fn latex_symbol(name: &str) -> String {
    const GREEK: &[&str] = &[
        "alpha", "beta", "gamma", "delta", "epsilon", "theta", "lambda", "mu", "nu", "rho",
        "sigma", "tau", "phi", "omega",
    ];
    if GREEK.contains(&name) {
        format!("\\{}", name)
    } else {
        name.to_string()
    }
}

fn latex_number(n: Number, out: &mut String) {
    match n {
        Number::Rational(p, 1) => out.push_str(&p.to_string()),
        Number::Rational(p, q) => {
            if p < 0 {
                out.push('-');
            }
            out.push_str(&format!("\\frac{{{}}}{{{}}}", p.unsigned_abs(), q));
        }
        Number::Float(_) => out.push_str(&n.to_string()),
    }
}

fn latex_factor(expr: &Expr, min_prec: u8, out: &mut String) {
    if precedence(expr) < min_prec {
        out.push_str("\\left(");
        write_latex(expr, out);
        out.push_str("\\right)");
    } else {
        write_latex(expr, out);
    }
}

fn latex_product(coeff: Option<Number>, parts: &[Expr], out: &mut String) {
    let mut first = true;
    if let Some(c) = coeff {
        latex_number(c, out);
        first = false;
    }
    for p in parts {
        if !first {
            out.push_str(if matches!(p, Expr::Num(_)) { " \\cdot " } else { " " });
        }
        latex_factor(p, 3, out);
        first = false;
    }
    if first {
        out.push('1');
    }
}

fn write_latex(expr: &Expr, out: &mut String) {
    match expr {
        Expr::Num(n) => latex_number(*n, out),
        Expr::Const(Constant::Pi) => out.push_str("\\pi"),
        Expr::Const(Constant::E) => out.push('e'),
        Expr::Sym(s) => out.push_str(&latex_symbol(s)),
        Expr::Add(terms) => {
            for (i, t) in terms.iter().enumerate() {
                if i == 0 {
                    write_latex(t, out);
                } else if is_negative_term(t) {
                    out.push_str(" - ");
                    write_latex(&negate_for_display(t), out);
                } else {
                    out.push_str(" + ");
                    write_latex(t, out);
                }
            }
        }
        Expr::Mul(factors) => {
            let frac = split_fraction(factors);
            if frac.negative {
                out.push('-');
            }
            if frac.denom.is_empty() && frac.coeff_den.is_none() {
                latex_product(frac.coeff_num, &frac.numer, out);
            } else {
                out.push_str("\\frac{");
                latex_product(frac.coeff_num, &frac.numer, out);
                out.push_str("}{");
                latex_product(frac.coeff_den, &frac.denom, out);
                out.push('}');
            }
        }
        Expr::Pow(b, e) => {
            if e.as_number() == Some(Number::Rational(1, 2)) {
                out.push_str("\\sqrt{");
                write_latex(b, out);
                out.push('}');
            } else if e.as_number().is_some_and(Number::is_negative) {
                write_latex(&Expr::Mul(vec![expr.clone()]), out);
            } else if matches!(**b, Expr::Const(Constant::E)) {
                out.push_str("e^{");
                write_latex(e, out);
                out.push('}');
            } else {
                latex_factor(b, 4, out);
                out.push_str("^{");
                write_latex(e, out);
                out.push('}');
            }
        }
        Expr::Func(Func::Abs, arg) => {
            out.push_str("\\left|");
            write_latex(arg, out);
            out.push_str("\\right|");
        }
        Expr::Func(Func::Exp, arg) => {
            out.push_str("e^{");
            write_latex(arg, out);
            out.push('}');
        }
        Expr::Func(func, arg) => {
            let name = match func {
                Func::Asin => "operatorname{asin}",
                Func::Acos => "operatorname{acos}",
                Func::Atan => "operatorname{atan}",
                other => other.name(),
            };
            out.push_str(&format!("\\{}{{\\left(", name));
            write_latex(arg, out);
            out.push_str(" \\right)}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::sym("x")
    }

    #[test]
    fn display_sums_with_negative_terms() {
        let e = Expr::add(vec![
            Expr::pow(x(), Expr::int(2)),
            Expr::mul(vec![Expr::int(-3), x()]),
            Expr::int(1),
        ]);
        assert_eq!(e.to_string(), "x^2 - 3*x + 1");
    }

    #[test]
    fn display_fractions() {
        let e = Expr::mul(vec![Expr::Num(Number::Rational(1, 3)), Expr::pow(x(), Expr::int(3))]);
        assert_eq!(e.to_string(), "x^3/3");
        let inv = Expr::pow(x(), Expr::int(-1));
        assert_eq!(inv.to_string(), "1/x");
        assert_eq!(Expr::sqrt(Expr::int(5)).to_string(), "sqrt(5)");
    }

    #[test]
    fn latex_rendering() {
        let e = Expr::mul(vec![Expr::Num(Number::Rational(1, 2)), Expr::pow(x(), Expr::int(2))]);
        assert_eq!(e.to_latex(), "\\frac{x^{2}}{2}");
        assert_eq!(Expr::func(Func::Sin, x()).to_latex(), "\\sin{\\left(x \\right)}");
    }

    #[test]
    fn free_symbols_are_sorted() {
        let e = Expr::add(vec![Expr::sym("y"), x(), Expr::Const(Constant::Pi)]);
        let names: Vec<_> = e.free_symbols().into_iter().collect();
        assert_eq!(names, vec!["x", "y"]);
    }
}
