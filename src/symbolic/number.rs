//! Exact rational numbers with a float fallback.
//!
//! Arithmetic stays exact while it fits in `i64`; overflow or any float
//! operand degrades the result to `Float`.

use std::fmt;

#[derive(Debug, Clone, Copy)]
pub enum Number {
    /// Reduced fraction, denominator always positive.
    Rational(i64, i64),
    Float(f64),
}

pub(super) fn gcd(a: i64, b: i64) -> u64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl Number {
    pub const ZERO: Number = Number::Rational(0, 1);
    pub const ONE: Number = Number::Rational(1, 1);
    pub const MINUS_ONE: Number = Number::Rational(-1, 1);

    /// `i64::MIN` has no exact negation, so it is held as a float.
    pub fn int(n: i64) -> Self {
        if n == i64::MIN {
            return Number::Float(n as f64);
        }
        Number::Rational(n, 1)
    }

    /// Reduced fraction; `None` for a zero denominator or when either part
    /// would be `i64::MIN`, so callers fall back to floats.
    pub fn rational(num: i64, den: i64) -> Option<Self> {
        if den == 0 || num == i64::MIN || den == i64::MIN {
            return None;
        }
        let g = i64::try_from(gcd(num, den).max(1)).ok()?;
        let (mut n, mut d) = (num / g, den / g);
        if d < 0 {
            n = n.checked_neg()?;
            d = d.checked_neg()?;
        }
        Some(Number::Rational(n, d))
    }

    /// Integral values become exact; everything else stays a float.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
            Number::Rational(value as i64, 1)
        } else {
            Number::Float(value)
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Number::Rational(n, d) => n as f64 / d as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_exact(self) -> bool {
        matches!(self, Number::Rational(..))
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Rational(n, _) => n == 0,
            Number::Float(f) => f == 0.0,
        }
    }

    pub fn is_one(self) -> bool {
        match self {
            Number::Rational(n, d) => n == 1 && d == 1,
            Number::Float(f) => f == 1.0,
        }
    }

    pub fn is_negative(self) -> bool {
        self.to_f64() < 0.0
    }

    pub fn as_integer(self) -> Option<i64> {
        match self {
            Number::Rational(n, 1) => Some(n),
            Number::Rational(..) => None,
            Number::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                Some(f as i64)
            }
            Number::Float(_) => None,
        }
    }

    pub fn neg(self) -> Self {
        match self {
            Number::Rational(n, d) => match n.checked_neg() {
                Some(n) => Number::Rational(n, d),
                None => Number::Float(-(n as f64) / d as f64),
            },
            Number::Float(f) => Number::Float(-f),
        }
    }

    pub fn abs(self) -> Self {
        if self.is_negative() {
            self.neg()
        } else {
            self
        }
    }

    pub fn add(self, other: Number) -> Self {
        if let (Number::Rational(a, b), Number::Rational(c, d)) = (self, other) {
            let exact = a
                .checked_mul(d)
                .zip(c.checked_mul(b))
                .and_then(|(x, y)| x.checked_add(y))
                .zip(b.checked_mul(d))
                .and_then(|(n, d)| Number::rational(n, d));
            if let Some(n) = exact {
                return n;
            }
        }
        Number::Float(self.to_f64() + other.to_f64())
    }

    pub fn sub(self, other: Number) -> Self {
        self.add(other.neg())
    }

    pub fn mul(self, other: Number) -> Self {
        if let (Number::Rational(a, b), Number::Rational(c, d)) = (self, other) {
            let exact = a
                .checked_mul(c)
                .zip(b.checked_mul(d))
                .and_then(|(n, d)| Number::rational(n, d));
            if let Some(n) = exact {
                return n;
            }
        }
        Number::Float(self.to_f64() * other.to_f64())
    }

    pub fn recip(self) -> Option<Self> {
        match self {
            Number::Rational(0, _) => None,
            Number::Rational(n, d) => Number::rational(d, n),
            Number::Float(f) => Some(Number::Float(1.0 / f)),
        }
    }

    pub fn div(self, other: Number) -> Option<Self> {
        Some(self.mul(other.recip()?))
    }

    /// Exact power when the result is representable, `None` when the result
    /// would be irrational (e.g. `2^(1/2)`) and should stay symbolic.
    pub fn pow(self, exponent: Number) -> Option<Self> {
        match (self, exponent) {
            (Number::Rational(n, d), Number::Rational(p, 1)) => {
                let k = u32::try_from(p.unsigned_abs()).ok()?;
                let exact = n.checked_pow(k).zip(d.checked_pow(k));
                let value = match exact.and_then(|(nn, dd)| Number::rational(nn, dd)) {
                    Some(value) => value,
                    None => Number::Float((n as f64 / d as f64).powf(k as f64)),
                };
                if p < 0 {
                    value.recip()
                } else {
                    Some(value)
                }
            }
            (Number::Rational(n, d), Number::Rational(p, q)) => {
                if n < 0 {
                    return None;
                }
                let rn = exact_root(n, q)?;
                let rd = exact_root(d, q)?;
                Number::Rational(rn, rd).pow(Number::int(p))
            }
            _ => {
                let value = self.to_f64().powf(exponent.to_f64());
                value.is_finite().then_some(Number::Float(value))
            }
        }
    }
}

fn exact_root(value: i64, degree: i64) -> Option<i64> {
    let degree = u32::try_from(degree).ok()?;
    let guess = (value as f64).powf(1.0 / degree as f64).round() as i64;
    (guess.checked_pow(degree)? == value).then_some(guess)
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Rational(a, b), Number::Rational(c, d)) => a == c && b == d,
            _ => self.to_f64() == other.to_f64(),
        }
    }
}

pub fn format_f64(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{}", value as i128)
    } else {
        format!("{}", value)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Rational(n, 1) => write!(f, "{}", n),
            Number::Rational(n, d) => write!(f, "{}/{}", n, d),
            Number::Float(v) => f.write_str(&format_f64(*v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rationals_reduce_and_normalise_sign() {
        assert_eq!(Number::rational(4, -6), Some(Number::Rational(-2, 3)));
        assert_eq!(Number::rational(1, 0), None);
    }

    #[test]
    fn exact_arithmetic() {
        let third = Number::Rational(1, 3);
        assert_eq!(third.add(third).add(third), Number::ONE);
        assert_eq!(third.mul(Number::int(6)), Number::int(2));
        assert_eq!(Number::int(2).div(Number::int(4)), Some(Number::Rational(1, 2)));
    }

    #[test]
    fn powers_stay_exact_or_refuse() {
        assert_eq!(Number::int(2).pow(Number::int(-2)), Some(Number::Rational(1, 4)));
        assert_eq!(Number::int(4).pow(Number::Rational(1, 2)), Some(Number::int(2)));
        assert_eq!(Number::int(2).pow(Number::Rational(1, 2)), None);
    }

    #[test]
    fn arithmetic_at_the_integer_edge_degrades_to_float() {
        let min = Number::int(-i64::MAX).sub(Number::ONE);
        assert!(!min.is_exact());
        assert_eq!(min.to_f64(), i64::MIN as f64);
        assert_eq!(Number::rational(i64::MIN, 2), None);
        assert_eq!(Number::int(i64::MIN).neg().to_f64(), -(i64::MIN as f64));
        assert_eq!(Number::int(-2).pow(Number::int(63)).map(Number::to_f64), Some(i64::MIN as f64));
        assert_eq!(Number::Rational(3, i64::MAX).add(Number::Rational(-3, i64::MAX)), Number::ZERO);
    }

    #[test]
    fn display() {
        assert_eq!(Number::Rational(-3, 4).to_string(), "-3/4");
        assert_eq!(Number::Float(2.5).to_string(), "2.5");
        assert_eq!(Number::from_f64(3.0).to_string(), "3");
    }
}
