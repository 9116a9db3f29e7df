//! Recursive-descent parser for math expressions.
//!
//! Accepts `^` and `**` for powers, implicit multiplication (`2x`, `3(x+1)`),
//! function calls, `pi`/`E` constants and top-level equations written as
//! `lhs = rhs` or `Eq(lhs, rhs)`.

use super::expr::{Constant, Expr, Func, Statement};
use super::number::Number;
use super::SymbolicError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Number),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
    Equals,
}

fn parse_error(position: usize, message: impl Into<String>) -> SymbolicError {
    SymbolicError::Parse { position, message: message.into() }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, SymbolicError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let start = i;
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '0'..='9' | '.' => {
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // exponent only when followed by digits, so `2e` stays `2*e`
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push((start, Token::Number(parse_number(&text, start)?)));
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push((start, Token::Ident(chars[start..i].iter().collect())));
                continue;
            }
            '+' => tokens.push((start, Token::Plus)),
            '-' => tokens.push((start, Token::Minus)),
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push((start, Token::Caret));
                i += 1;
            }
            '*' => tokens.push((start, Token::Star)),
            '/' => tokens.push((start, Token::Slash)),
            '^' => tokens.push((start, Token::Caret)),
            '(' | '[' => tokens.push((start, Token::LParen)),
            ')' | ']' => tokens.push((start, Token::RParen)),
            ',' => tokens.push((start, Token::Comma)),
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    i += 1;
                }
                tokens.push((start, Token::Equals));
            }
            other => return Err(parse_error(start, format!("unexpected character '{}'", other))),
        }
        i += 1;
    }
    Ok(tokens)
}

fn parse_number(text: &str, position: usize) -> Result<Number, SymbolicError> {
    if !text.contains(['.', 'e', 'E']) {
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Number::int(n));
        }
    }
    // finite decimals like 0.25 become exact fractions
    if let Some((whole, frac)) = text.split_once('.') {
        if !frac.contains(['e', 'E']) && frac.len() <= 12 && whole.len() <= 6 {
            let digits = format!("{}{}", whole, frac);
            if let Ok(n) = digits.parse::<i64>() {
                if let Some(r) = Number::rational(n, 10_i64.pow(frac.len() as u32)) {
                    return Ok(r);
                }
            }
        }
    }
    text.parse::<f64>()
        .map(Number::from_f64)
        .map_err(|_| parse_error(position, format!("invalid number '{}'", text)))
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(p, _)| *p).unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        t
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), SymbolicError> {
        let position = self.position();
        match self.next() {
            Some(t) if t == token => Ok(()),
            _ => Err(parse_error(position, format!("expected {}", what))),
        }
    }

    fn statement(&mut self) -> Result<Statement, SymbolicError> {
        let is_eq_call = matches!(self.tokens.first(), Some((_, Token::Ident(name))) if name == "Eq")
            && matches!(self.tokens.get(1), Some((_, Token::LParen)));
        if is_eq_call {
            self.pos = 2;
            let lhs = self.expr()?;
            self.expect(Token::Comma, "',' in Eq(lhs, rhs)")?;
            let rhs = self.expr()?;
            self.expect(Token::RParen, "')'")?;
            return Ok(Statement::Equation(lhs, rhs));
        }
        let lhs = self.expr()?;
        if self.peek() == Some(&Token::Equals) {
            self.next();
            let rhs = self.expr()?;
            return Ok(Statement::Equation(lhs, rhs));
        }
        Ok(Statement::Expr(lhs))
    }

    fn expr(&mut self) -> Result<Expr, SymbolicError> {
        let mut terms = vec![self.term()?];
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.next();
                    terms.push(self.term()?);
                }
                Some(Token::Minus) => {
                    self.next();
                    terms.push(Expr::neg(self.term()?));
                }
                _ => break,
            }
        }
        Ok(if terms.len() == 1 { terms.remove(0) } else { Expr::add(terms) })
    }

    fn term(&mut self) -> Result<Expr, SymbolicError> {
        let mut factors = vec![self.unary()?];
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.next();
                    factors.push(self.unary()?);
                }
                Some(Token::Slash) => {
                    self.next();
                    let rhs = self.unary()?;
                    factors.push(Expr::pow(rhs, Expr::int(-1)));
                }
                Some(Token::Number(_)) | Some(Token::Ident(_)) | Some(Token::LParen) => {
                    factors.push(self.power()?);
                }
                _ => break,
            }
        }
        Ok(if factors.len() == 1 { factors.remove(0) } else { Expr::mul(factors) })
    }

    fn unary(&mut self) -> Result<Expr, SymbolicError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.next();
                Ok(Expr::neg(self.unary()?))
            }
            Some(Token::Plus) => {
                self.next();
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, SymbolicError> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Caret) {
            self.next();
            let exponent = self.unary()?;
            return Ok(Expr::pow(base, exponent));
        }
        Ok(base)
    }

    fn args(&mut self) -> Result<Vec<Expr>, SymbolicError> {
        self.expect(Token::LParen, "'('")?;
        let mut args = vec![self.expr()?];
        while self.peek() == Some(&Token::Comma) {
            self.next();
            args.push(self.expr()?);
        }
        self.expect(Token::RParen, "')'")?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, SymbolicError> {
        let position = self.position();
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Num(n)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    return self.call(&name, position);
                }
                Ok(match name.as_str() {
                    "pi" | "PI" | "π" => Expr::Const(Constant::Pi),
                    "E" => Expr::Const(Constant::E),
                    _ => Expr::Sym(name),
                })
            }
            Some(_) => Err(parse_error(position, "unexpected token")),
            None => Err(parse_error(position, "unexpected end of input")),
        }
    }

    fn call(&mut self, name: &str, position: usize) -> Result<Expr, SymbolicError> {
        let mut args = self.args()?;
        let arity_error =
            |n: usize| parse_error(position, format!("{}() takes {} argument(s)", name, n));
        match name {
            "sqrt" => {
                if args.len() != 1 {
                    return Err(arity_error(1));
                }
                Ok(Expr::sqrt(args.remove(0)))
            }
            "log" if args.len() == 2 => {
                let base = args.remove(1);
                let value = args.remove(0);
                Ok(Expr::div(Expr::func(Func::Ln, value), Expr::func(Func::Ln, base)))
            }
            "Eq" => Err(parse_error(position, "Eq() is only allowed at the top level")),
            _ => match Func::from_name(name) {
                Some(func) => {
                    if args.len() != 1 {
                        return Err(arity_error(1));
                    }
                    Ok(Expr::func(func, args.remove(0)))
                }
                None => Err(parse_error(position, format!("unknown function '{}'", name))),
            },
        }
    }
}

/// Parses an expression or equation.
pub fn parse(input: &str) -> Result<Statement, SymbolicError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(parse_error(0, "empty expression"));
    }
    let mut parser = Parser { tokens, pos: 0, end: input.chars().count() };
    let statement = parser.statement()?;
    if parser.pos < parser.tokens.len() {
        return Err(parse_error(parser.position(), "unexpected trailing input"));
    }
    Ok(statement)
}

/// Parses a plain expression; equations are rejected.
pub fn parse_expr(input: &str) -> Result<Expr, SymbolicError> {
    match parse(input)? {
        Statement::Expr(e) => Ok(e),
        Statement::Equation(..) => Err(SymbolicError::InvalidArgument(format!(
            "expected an expression, got an equation: {}",
            input
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_unary_minus() {
        let e = parse_expr("-x^2 + 3*x").unwrap();
        assert_eq!(
            e,
            Expr::add(vec![
                Expr::neg(Expr::pow(Expr::sym("x"), Expr::int(2))),
                Expr::mul(vec![Expr::int(3), Expr::sym("x")]),
            ])
        );
    }

    #[test]
    fn double_star_and_implicit_multiplication() {
        assert_eq!(parse_expr("x**2").unwrap(), Expr::pow(Expr::sym("x"), Expr::int(2)));
        assert_eq!(
            parse_expr("2x").unwrap(),
            Expr::mul(vec![Expr::int(2), Expr::sym("x")])
        );
    }

    #[test]
    fn equations() {
        assert!(matches!(parse("x^2 = 4").unwrap(), Statement::Equation(..)));
        assert!(matches!(parse("Eq(x, 1)").unwrap(), Statement::Equation(..)));
        assert!(parse_expr("x = 1").is_err());
    }

    #[test]
    fn decimals_are_exact() {
        assert_eq!(parse_expr("0.25").unwrap(), Expr::Num(Number::Rational(1, 4)));
    }

    #[test]
    fn errors_carry_position() {
        match parse("x + (").unwrap_err() {
            SymbolicError::Parse { position, .. } => assert_eq!(position, 5),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(parse("foo(x)").is_err());
        assert!(parse("").is_err());
    }
}
