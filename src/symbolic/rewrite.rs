//! Rational-function and trigonometric rewrites: combining over a common
//! denominator, cancelling polynomial gcds, partial fractions and the
//! Pythagorean identities.

use super::expr::{Expr, Func};
use super::number::{gcd, Number};
use super::ops::{self, divisors, expand, simplify};
use super::SymbolicError;

/// Largest integer power split into numerator and denominator parts.
const MAX_FRACTION_POWER: i64 = 64;

// ---------------------------------------------------------------------------
// dense univariate polynomials
// ---------------------------------------------------------------------------

/// Coefficients by ascending degree with no trailing zeros; the zero
/// polynomial is empty.
#[derive(Debug, Clone, PartialEq)]
struct Poly(Vec<Number>);

impl Poly {
    fn new(mut coeffs: Vec<Number>) -> Self {
        while coeffs.last().is_some_and(|c| c.is_zero()) {
            coeffs.pop();
        }
        Poly(coeffs)
    }

    /// Exact coefficients of `expr` in `var`, `None` when it is not a
    /// polynomial or a coefficient is symbolic or inexact.
    fn from_expr(expr: &Expr, var: &str) -> Option<Self> {
        let coeffs = ops::polynomial_coefficients(expr, var)?;
        coeffs
            .iter()
            .map(|c| c.as_number().filter(|n| n.is_exact()))
            .collect::<Option<Vec<_>>>()
            .map(Poly::new)
    }

    fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    fn degree(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    fn lead(&self) -> Number {
        self.0.last().copied().unwrap_or(Number::ZERO)
    }

    fn coeff(&self, k: usize) -> Number {
        self.0.get(k).copied().unwrap_or(Number::ZERO)
    }

    fn add(&self, other: &Poly) -> Poly {
        let len = self.0.len().max(other.0.len());
        Poly::new((0..len).map(|k| self.coeff(k).add(other.coeff(k))).collect())
    }

    fn sub(&self, other: &Poly) -> Poly {
        let len = self.0.len().max(other.0.len());
        Poly::new((0..len).map(|k| self.coeff(k).sub(other.coeff(k))).collect())
    }

    fn mul(&self, other: &Poly) -> Poly {
        if self.is_zero() || other.is_zero() {
            return Poly(Vec::new());
        }
        let mut out = vec![Number::ZERO; self.0.len() + other.0.len() - 1];
        for (i, a) in self.0.iter().enumerate() {
            for (j, b) in other.0.iter().enumerate() {
                out[i + j] = out[i + j].add(a.mul(*b));
            }
        }
        Poly::new(out)
    }

    fn pow(&self, k: usize) -> Poly {
        (0..k).fold(Poly::new(vec![Number::ONE]), |acc, _| acc.mul(self))
    }

    fn scale(&self, k: Number) -> Poly {
        Poly::new(self.0.iter().map(|c| c.mul(k)).collect())
    }

    fn eval(&self, x: Number) -> Number {
        self.0.iter().rev().fold(Number::ZERO, |acc, c| acc.mul(x).add(*c))
    }

    /// Long division; `divisor` must be non-zero.
    fn div_rem(&self, divisor: &Poly) -> (Poly, Poly) {
        if divisor.is_zero() || self.0.len() < divisor.0.len() {
            return (Poly(Vec::new()), self.clone());
        }
        let top = divisor.degree();
        let lead = divisor.lead();
        let mut rem = self.0.clone();
        let mut quot = vec![Number::ZERO; self.0.len() - divisor.0.len() + 1];
        for k in (0..quot.len()).rev() {
            let c = rem[k + top].div(lead).unwrap_or(Number::ZERO);
            quot[k] = c;
            for (i, d) in divisor.0.iter().enumerate() {
                rem[k + i] = rem[k + i].sub(c.mul(*d));
            }
        }
        rem.truncate(top);
        (Poly::new(quot), Poly::new(rem))
    }

    fn monic(&self) -> Poly {
        match self.lead().recip() {
            Some(r) => self.scale(r),
            None => self.clone(),
        }
    }

    fn gcd(&self, other: &Poly) -> Poly {
        let (mut a, mut b) = (self.clone(), other.clone());
        while !b.is_zero() {
            let r = a.div_rem(&b).1;
            a = b;
            b = r;
        }
        a.monic()
    }

    /// Splits off the rational content so the remaining polynomial has
    /// coprime integer coefficients and a positive leading coefficient.
    fn primitive(&self) -> (Number, Poly) {
        if self.is_zero() {
            return (Number::ONE, self.clone());
        }
        let mut numer = 0i64;
        let mut denom = 1i64;
        let mut exact = true;
        for c in &self.0 {
            match *c {
                Number::Rational(n, d) => {
                    numer = i64::try_from(gcd(numer, n)).unwrap_or(1);
                    match ops::lcm(denom, d) {
                        Some(l) => denom = l,
                        None => exact = false,
                    }
                }
                Number::Float(_) => exact = false,
            }
        }
        let mut content = if exact {
            Number::rational(numer.max(1), denom).unwrap_or(Number::ONE)
        } else {
            self.lead().abs()
        };
        if self.lead().is_negative() {
            content = content.neg();
        }
        match content.recip() {
            Some(r) => (content, self.scale(r)),
            None => (Number::ONE, self.clone()),
        }
    }

    /// `p(r + t)` as a polynomial in `t`.
    fn shift(&self, r: Number) -> Poly {
        let step = Poly::new(vec![r, Number::ONE]);
        self.0
            .iter()
            .rev()
            .fold(Poly(Vec::new()), |acc, c| acc.mul(&step).add(&Poly::new(vec![*c])))
    }

    /// Distinct rational roots in ascending order.
    fn rational_roots(&self) -> Vec<Number> {
        let mut scale = 1i64;
        for c in &self.0 {
            match *c {
                Number::Rational(_, d) => match ops::lcm(scale, d) {
                    Some(l) => scale = l,
                    None => return Vec::new(),
                },
                Number::Float(_) => return Vec::new(),
            }
        }
        let Some(ints) = self
            .0
            .iter()
            .map(|c| c.mul(Number::int(scale)).as_integer())
            .collect::<Option<Vec<i64>>>()
        else {
            return Vec::new();
        };

        let mut roots = Vec::new();
        let zeros = ints.iter().take_while(|c| **c == 0).count();
        if zeros > 0 && zeros < ints.len() {
            roots.push(Number::ZERO);
        }
        let constant = ints.get(zeros).copied().unwrap_or(0);
        let leading = ints.last().copied().unwrap_or(0);
        if constant != 0 && leading != 0 {
            for p in divisors(constant) {
                for q in divisors(leading) {
                    for sign in [1, -1] {
                        let Some(r) = Number::rational(sign * p, q) else { continue };
                        if !roots.contains(&r) && self.eval(r).is_zero() {
                            roots.push(r);
                        }
                    }
                }
            }
        }
        roots.sort_by(|a, b| a.to_f64().partial_cmp(&b.to_f64()).unwrap_or(std::cmp::Ordering::Equal));
        roots
    }

    fn to_expr(&self, var: &str) -> Expr {
        let x = Expr::sym(var);
        let terms = self
            .0
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_zero())
            .map(|(k, c)| Expr::mul(vec![Expr::Num(*c), Expr::pow(x.clone(), Expr::int(k as i64))]))
            .collect();
        simplify(&Expr::Add(terms))
    }
}

/// First `terms` coefficients of the power series `p(t) / g(t)`; `g(0)` must
/// be non-zero.
fn series_quotient(p: &Poly, g: &Poly, terms: usize) -> Vec<Number> {
    let g0 = g.coeff(0);
    let mut out: Vec<Number> = Vec::with_capacity(terms);
    for k in 0..terms {
        let mut acc = p.coeff(k);
        for i in 1..=k {
            acc = acc.sub(g.coeff(i).mul(out[k - i]));
        }
        out.push(acc.div(g0).unwrap_or(Number::ZERO));
    }
    out
}

// ---------------------------------------------------------------------------
// numerator / denominator form
// ---------------------------------------------------------------------------

/// `num / (coeff * base_1^exp_1 * ...)` with an expanded numerator and a
/// positive integer `coeff`.
#[derive(Debug, Clone)]
struct Fraction {
    num: Expr,
    coeff: Number,
    den: Vec<(Expr, i64)>,
}

impl Fraction {
    fn whole(num: Expr) -> Self {
        Fraction { num, coeff: Number::ONE, den: Vec::new() }
    }

    fn of(expr: &Expr) -> Self {
        match expr {
            Expr::Num(Number::Rational(n, d)) => {
                Fraction { num: Expr::int(*n), coeff: Number::int(*d), den: Vec::new() }
            }
            Expr::Add(terms) => terms
                .iter()
                .map(Fraction::of)
                .reduce(Fraction::plus)
                .unwrap_or_else(|| Fraction::whole(Expr::int(0))),
            Expr::Mul(factors) => factors
                .iter()
                .map(Fraction::of)
                .fold(Fraction::whole(Expr::int(1)), Fraction::times),
            Expr::Pow(base, exponent) => {
                let Some(e) = exponent.as_number() else {
                    return Fraction::whole(expr.clone());
                };
                match e.as_integer() {
                    Some(k) if (1..=MAX_FRACTION_POWER).contains(&k) => Fraction::of(base).power(k),
                    Some(k) if (-MAX_FRACTION_POWER..0).contains(&k) => {
                        Fraction::of(base).invert().power(-k)
                    }
                    _ if e.is_negative() => Fraction {
                        num: Expr::int(1),
                        coeff: Number::ONE,
                        den: vec![(Expr::pow((**base).clone(), Expr::Num(e.neg())), 1)],
                    },
                    _ => Fraction::whole(expr.clone()),
                }
            }
            other => Fraction::whole(other.clone()),
        }
    }

    /// Keeps `coeff` a positive integer by moving sign and fractional parts
    /// into the numerator.
    fn normalized(mut self) -> Self {
        if let Number::Rational(n, d) = self.coeff {
            if d != 1 {
                self.num = expand(&Expr::mul(vec![Expr::int(d), self.num]));
                self.coeff = Number::int(n);
            }
        }
        if self.coeff.is_negative() {
            self.num = expand(&Expr::neg(self.num));
            self.coeff = self.coeff.neg();
        }
        self.den.retain(|(_, e)| *e != 0);
        self
    }

    fn den_exponent(&self, key: &str) -> i64 {
        self.den
            .iter()
            .find(|(b, _)| b.sort_key() == key)
            .map(|(_, e)| *e)
            .unwrap_or(0)
    }

    fn times(self, other: Fraction) -> Fraction {
        let num = expand(&Expr::mul(vec![self.num, other.num]));
        let coeff = self.coeff.mul(other.coeff);
        let mut den = self.den;
        for (base, e) in other.den {
            let key = base.sort_key();
            match den.iter_mut().find(|(b, _)| b.sort_key() == key) {
                Some((_, existing)) => *existing += e,
                None => den.push((base, e)),
            }
        }
        Fraction { num, coeff, den }.normalized()
    }

    fn plus(self, other: Fraction) -> Fraction {
        let coeff = match (self.coeff.as_integer(), other.coeff.as_integer()) {
            (Some(a), Some(b)) => ops::lcm(a, b).map(Number::int).unwrap_or(self.coeff.mul(other.coeff)),
            _ => self.coeff.mul(other.coeff),
        };
        let mut den: Vec<(Expr, i64)> = self.den.clone();
        for (base, e) in &other.den {
            let key = base.sort_key();
            match den.iter_mut().find(|(b, _)| b.sort_key() == key) {
                Some((_, existing)) => *existing = (*existing).max(*e),
                None => den.push((base.clone(), *e)),
            }
        }

        let lift = |part: &Fraction| {
            let mut factors = vec![Expr::Num(coeff.div(part.coeff).unwrap_or(Number::ONE)), part.num.clone()];
            for (base, e) in &den {
                let missing = e - part.den_exponent(&base.sort_key());
                if missing > 0 {
                    factors.push(Expr::pow(base.clone(), Expr::int(missing)));
                }
            }
            Expr::Mul(factors)
        };
        let num = expand(&Expr::Add(vec![lift(&self), lift(&other)]));
        Fraction { num, coeff, den }.normalized()
    }

    fn power(self, k: i64) -> Fraction {
        let num = expand(&Expr::pow(self.num, Expr::int(k)));
        let coeff = self.coeff.pow(Number::int(k)).unwrap_or(self.coeff);
        let den = self.den.into_iter().map(|(b, e)| (b, e.saturating_mul(k))).collect();
        Fraction { num, coeff, den }.normalized()
    }

    fn invert(self) -> Fraction {
        let (c, parts) = match &self.num {
            Expr::Add(_) => (Number::ONE, vec![self.num.clone()]),
            other => other.split_coefficient(),
        };
        if c.is_zero() {
            return Fraction::whole(Expr::pow(self.num, Expr::int(-1)));
        }
        let den = parts
            .into_iter()
            .map(|p| match p {
                Expr::Pow(b, e) => match e.as_number().and_then(Number::as_integer) {
                    Some(k) if k > 0 => (*b, k),
                    _ => (Expr::Pow(b, e), 1),
                },
                other => (other, 1),
            })
            .collect();
        let num = self.den_product_with(self.coeff);
        Fraction { num, coeff: c, den }.normalized()
    }

    fn den_product_with(&self, coeff: Number) -> Expr {
        let mut factors = vec![Expr::Num(coeff)];
        factors.extend(self.den.iter().map(|(b, e)| Expr::pow(b.clone(), Expr::int(*e))));
        expand(&Expr::Mul(factors))
    }

    fn den_product(&self) -> Expr {
        self.den_product_with(self.coeff)
    }

    fn into_expr(self) -> Expr {
        let scale = self.coeff.recip().unwrap_or(Number::ONE);
        if self.den.is_empty() {
            return simplify(&Expr::mul(vec![Expr::Num(scale), self.num]));
        }
        quotient(scale, self.num, self.den)
    }
}

/// `scale * numer / (base_1^exp_1 * ...)` kept unexpanded for display.
fn quotient(scale: Number, numer: Expr, den: Vec<(Expr, i64)>) -> Expr {
    let (c, parts) = if matches!(numer, Expr::Add(_)) {
        (Number::ONE, vec![numer])
    } else {
        numer.split_coefficient()
    };
    let c = c.mul(scale);
    if c.is_zero() {
        return Expr::int(0);
    }
    let mut factors = Vec::new();
    if !c.is_one() {
        factors.push(Expr::Num(c));
    }
    factors.extend(parts);
    factors.extend(den.into_iter().map(|(b, e)| Expr::pow(b, Expr::int(-e))));
    match factors.len() {
        0 => Expr::int(1),
        1 => factors.remove(0),
        _ => Expr::Mul(factors),
    }
}

fn sole_symbol(exprs: &[&Expr]) -> Option<String> {
    let mut symbols = std::collections::BTreeSet::new();
    for e in exprs {
        e.collect_symbols(&mut symbols);
    }
    if symbols.len() == 1 {
        symbols.into_iter().next()
    } else {
        None
    }
}

/// `n / d` with the polynomial gcd removed and integer content pulled into a
/// single numeric coefficient.
fn reduced(n: &Poly, d: &Poly, var: &str) -> Expr {
    let g = n.gcd(d);
    let n = n.div_rem(&g).0;
    let d = d.div_rem(&g).0;
    let (cn, n) = n.primitive();
    let (cd, d) = d.primitive();
    let scale = cn.div(cd).unwrap_or(cn);
    if d.degree() == 0 {
        let scale = scale.div(d.lead()).unwrap_or(scale);
        return simplify(&Expr::mul(vec![Expr::Num(scale), n.to_expr(var)]));
    }
    quotient(scale, n.to_expr(var), vec![(d.to_expr(var), 1)])
}

// ---------------------------------------------------------------------------
// public rewrites
// ---------------------------------------------------------------------------

/// Combines a sum of fractions over a common denominator.
pub fn together(expr: &Expr) -> Expr {
    Fraction::of(&simplify(expr)).into_expr()
}

/// Puts a rational function into `p/q` form with no common polynomial
/// factors. Multivariate input is only brought over a common denominator.
pub fn cancel(expr: &Expr) -> Expr {
    let frac = Fraction::of(&simplify(expr));
    if frac.den.is_empty() {
        return frac.into_expr();
    }
    let den = frac.den_product();
    let Some(var) = sole_symbol(&[&frac.num, &den]) else {
        return frac.into_expr();
    };
    match (Poly::from_expr(&frac.num, &var), Poly::from_expr(&den, &var)) {
        (Some(n), Some(d)) if !d.is_zero() => reduced(&n, &d, &var),
        _ => frac.into_expr(),
    }
}

/// Partial fraction decomposition in `var` over the rationals. Factors of
/// the denominator without rational roots are kept together in one term.
pub fn apart(expr: &Expr, var: &str) -> Result<Expr, SymbolicError> {
    let frac = Fraction::of(&simplify(expr));
    let not_rational = || {
        SymbolicError::InvalidArgument(format!(
            "apart needs a rational function of {} with rational coefficients",
            var
        ))
    };
    let n = Poly::from_expr(&frac.num, var).ok_or_else(not_rational)?;
    let d = Poly::from_expr(&frac.den_product(), var).ok_or_else(not_rational)?;
    if d.is_zero() {
        return Err(SymbolicError::InvalidArgument("division by zero".to_string()));
    }

    let (q, r) = n.div_rem(&d);
    let mut terms = Vec::new();
    match q.to_expr(var) {
        Expr::Add(ts) => terms.extend(ts),
        other if !other.is_zero() => terms.push(other),
        _ => {}
    }

    if !r.is_zero() {
        let x = Expr::sym(var);
        let mut rest = d.clone();
        let mut covered = Poly(Vec::new());
        for root in d.rational_roots() {
            let linear = Poly::new(vec![root.neg(), Number::ONE]);
            let mut multiplicity = 0usize;
            while rest.degree() > 0 && rest.eval(root).is_zero() {
                rest = rest.div_rem(&linear).0;
                multiplicity += 1;
            }
            if multiplicity == 0 {
                continue;
            }
            let cofactor = d.div_rem(&linear.pow(multiplicity)).0;
            let coeffs = series_quotient(&r.shift(root), &cofactor.shift(root), multiplicity);
            let base = simplify(&Expr::sub(x.clone(), Expr::Num(root)));
            for (k, c) in coeffs.into_iter().enumerate() {
                if c.is_zero() {
                    continue;
                }
                let power = multiplicity - k;
                terms.push(quotient(c, Expr::int(1), vec![(base.clone(), power as i64)]));
                covered = covered.add(&d.div_rem(&linear.pow(power)).0.scale(c));
            }
        }
        if rest.degree() > 0 {
            let linear_part = d.div_rem(&rest).0;
            let s = r.sub(&covered).div_rem(&linear_part).0;
            if !s.is_zero() {
                let (cs, s) = s.primitive();
                let (ce, e) = rest.primitive();
                terms.push(quotient(cs.div(ce).unwrap_or(cs), s.to_expr(var), vec![(e.to_expr(var), 1)]));
            }
        }
    }

    Ok(match terms.len() {
        0 => Expr::int(0),
        1 => terms.remove(0),
        _ => Expr::Add(terms),
    })
}

/// Applies `sin^2 + cos^2 = 1`, `cosh^2 - sinh^2 = 1` and `sin/cos = tan`.
pub fn trigsimp(expr: &Expr) -> Expr {
    simplify(&rewrite_trig(&simplify(expr)))
}

fn rewrite_trig(expr: &Expr) -> Expr {
    match expr {
        Expr::Add(terms) => Expr::Add(unit_circle(terms.iter().map(rewrite_trig).collect())),
        Expr::Mul(factors) => Expr::Mul(sin_over_cos(factors.iter().map(rewrite_trig).collect())),
        Expr::Pow(b, e) => Expr::pow(rewrite_trig(b), rewrite_trig(e)),
        Expr::Func(f, a) => Expr::func(*f, rewrite_trig(a)),
        other => other.clone(),
    }
}

/// Splits `c * f(u)^2 * rest` into `(c, u, rest)`.
fn squared(term: &Expr, func: Func) -> Option<(Number, Expr, Vec<Expr>)> {
    let (coeff, mut factors) = term.split_coefficient();
    let at = factors.iter().position(|f| match f {
        Expr::Pow(b, e) => e.as_number() == Some(Number::int(2)) && matches!(&**b, Expr::Func(g, _) if *g == func),
        _ => false,
    })?;
    match factors.remove(at) {
        Expr::Pow(b, _) => match *b {
            Expr::Func(_, arg) => Some((coeff, *arg, factors)),
            _ => None,
        },
        _ => None,
    }
}

fn rest_key(rest: &[Expr]) -> String {
    Expr::Mul(rest.to_vec()).sort_key()
}

fn scaled(coeff: Number, mut factors: Vec<Expr>) -> Expr {
    factors.insert(0, Expr::Num(coeff));
    Expr::Mul(factors)
}

fn square_of(func: Func, arg: &Expr) -> Expr {
    Expr::pow(Expr::func(func, arg.clone()), Expr::int(2))
}

/// Index of a term `c * f(u)^2 * rest` with matching `u` and `rest`.
fn partner_square(terms: &[Expr], func: Func, arg: &Expr, key: &str) -> Option<(usize, Number)> {
    terms.iter().enumerate().find_map(|(j, t)| match squared(t, func) {
        Some((c, v, r)) if v == *arg && rest_key(&r) == key => Some((j, c)),
        _ => None,
    })
}

/// Index of a term equal to `coeff * rest`.
fn partner_plain(terms: &[Expr], coeff: Number, key: &str) -> Option<usize> {
    terms.iter().position(|t| {
        let (c, r) = t.split_coefficient();
        c == coeff && rest_key(&r) == key
    })
}

fn replace_pair(terms: &mut Vec<Expr>, i: usize, j: usize, with: Vec<Expr>) {
    let (hi, lo) = if i > j { (i, j) } else { (j, i) };
    terms.remove(hi);
    terms.remove(lo);
    terms.extend(with);
}

fn unit_circle(mut terms: Vec<Expr>) -> Vec<Expr> {
    let mut i = 0;
    while i < terms.len() {
        if let Some((a, u, rest)) = squared(&terms[i], Func::Sin) {
            let key = rest_key(&rest);
            // a*sin^2 + b*cos^2 = a + (b - a)*cos^2
            if let Some((j, b)) = partner_square(&terms, Func::Cos, &u, &key) {
                let mut cos2 = vec![square_of(Func::Cos, &u)];
                cos2.extend(rest.iter().cloned());
                replace_pair(&mut terms, i, j, vec![scaled(a, rest), scaled(b.sub(a), cos2)]);
                continue;
            }
            // k - k*sin^2 = k*cos^2
            if let Some(j) = partner_plain(&terms, a.neg(), &key) {
                let mut cos2 = vec![square_of(Func::Cos, &u)];
                cos2.extend(rest);
                replace_pair(&mut terms, i, j, vec![scaled(a.neg(), cos2)]);
                continue;
            }
        }
        if let Some((a, u, rest)) = squared(&terms[i], Func::Cos) {
            // k - k*cos^2 = k*sin^2
            if let Some(j) = partner_plain(&terms, a.neg(), &rest_key(&rest)) {
                let mut sin2 = vec![square_of(Func::Sin, &u)];
                sin2.extend(rest);
                replace_pair(&mut terms, i, j, vec![scaled(a.neg(), sin2)]);
                continue;
            }
        }
        if let Some((a, u, rest)) = squared(&terms[i], Func::Cosh) {
            // k*cosh^2 - k*sinh^2 = k
            if let Some((j, b)) = partner_square(&terms, Func::Sinh, &u, &rest_key(&rest)) {
                if b == a.neg() {
                    replace_pair(&mut terms, i, j, vec![scaled(a, rest)]);
                    continue;
                }
            }
        }
        i += 1;
    }
    terms
}

fn power_parts(f: &Expr) -> Option<(&Expr, Number)> {
    match f {
        Expr::Pow(b, e) => Some((b, e.as_number()?)),
        other => Some((other, Number::ONE)),
    }
}

fn sin_over_cos(mut factors: Vec<Expr>) -> Vec<Expr> {
    loop {
        let found = factors.iter().enumerate().find_map(|(i, f)| {
            let (Expr::Func(Func::Sin, u), e) = power_parts(f)? else {
                return None;
            };
            let j = factors.iter().position(|g| {
                matches!(power_parts(g), Some((Expr::Func(Func::Cos, v), k)) if v == u && k == e.neg())
            })?;
            Some((i, j, (**u).clone(), e))
        });
        let Some((i, j, u, e)) = found else {
            return factors;
        };
        let tan = Expr::func(Func::Tan, u);
        let replacement = if e.is_one() { tan } else { Expr::pow(tan, Expr::Num(e)) };
        replace_pair(&mut factors, i, j, vec![replacement]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::parser::parse_expr;

    fn p(s: &str) -> Expr {
        parse_expr(s).unwrap()
    }

    #[test]
    fn together_uses_a_common_denominator() {
        assert_eq!(together(&p("1/x + 1/y")).to_string(), "(x + y)/(x*y)");
        assert_eq!(together(&p("1/2 + 1/x")).to_string(), "(x + 2)/(2*x)");
        assert_eq!(together(&p("x + 1")).to_string(), "x + 1");
    }

    #[test]
    fn cancel_removes_common_factors() {
        assert_eq!(cancel(&p("(x^2 - 1)/(x - 1)")).to_string(), "x + 1");
        assert_eq!(cancel(&p("(2*x + 2)/(4*x)")).to_string(), "(x + 1)/(2*x)");
        assert_eq!(cancel(&p("(x^2 + 2*x + 1)/(x^2 - 1)")).to_string(), "(x + 1)/(x - 1)");
    }

    #[test]
    fn apart_splits_over_rational_roots() {
        assert_eq!(apart(&p("1/(x^2 - 1)"), "x").unwrap().to_string(), "-1/(2*(x + 1)) + 1/(2*(x - 1))");
        assert_eq!(apart(&p("(x^2 + 1)/(x - 1)"), "x").unwrap().to_string(), "x + 1 + 2/(x - 1)");
        assert_eq!(apart(&p("1/(x*(x^2 + 1))"), "x").unwrap().to_string(), "1/x - x/(x^2 + 1)");
    }

    #[test]
    fn apart_handles_repeated_roots() {
        let e = apart(&p("1/(x^2*(x + 1))"), "x").unwrap();
        let mut scope = std::collections::HashMap::new();
        scope.insert("x".to_string(), 3.0);
        let got = ops::evaluate(&e, &scope).unwrap();
        assert!((got - 1.0 / 36.0).abs() < 1e-12);
        assert_eq!(e.to_string(), "1/(x + 1) + 1/x^2 - 1/x");
    }

    #[test]
    fn apart_rejects_non_rational_input() {
        assert!(apart(&p("sin(x)/x"), "x").is_err());
        assert!(apart(&p("1/(x + y)"), "x").is_err());
    }

    #[test]
    fn trigsimp_identities() {
        assert_eq!(trigsimp(&p("sin(x)^2 + cos(x)^2")).to_string(), "1");
        assert_eq!(trigsimp(&p("2*sin(x)^2 + 2*cos(x)^2 + x")).to_string(), "x + 2");
        assert_eq!(trigsimp(&p("1 - sin(x)^2")).to_string(), "cos(x)^2");
        assert_eq!(trigsimp(&p("cosh(x)^2 - sinh(x)^2")).to_string(), "1");
        assert_eq!(trigsimp(&p("sin(x)/cos(x)")).to_string(), "tan(x)");
    }
}
