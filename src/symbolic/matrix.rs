//! Symbolic matrices written as `Matrix([[a, b], [c, d]])` or `[[a, b], [c, d]]`.

use std::collections::BTreeSet;
use std::fmt;

use super::expr::Expr;
use super::ops::{expand, simplify};
use super::parser::parse_expr;
use super::{rewrite, SymbolicError};

const MAX_DET_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    entries: Vec<Expr>,
}

fn malformed(message: &str) -> SymbolicError {
    SymbolicError::Parse { position: 0, message: message.to_string() }
}

/// Top-level comma separated items of a `[...]` list.
fn split_list(src: &str) -> Result<Vec<&str>, SymbolicError> {
    let inner = src
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| malformed("expected a bracketed list"))?;
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, ch) in inner.char_indices() {
        match ch {
            '[' | '(' => depth += 1,
            ']' | ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(malformed("unbalanced brackets in matrix"));
                }
            }
            ',' if depth == 0 => {
                items.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(malformed("unbalanced brackets in matrix"));
    }
    let last = inner[start..].trim();
    if !last.is_empty() || !items.is_empty() {
        items.push(last);
    }
    if items.iter().any(|item| item.is_empty()) {
        return Err(malformed("empty matrix entry"));
    }
    Ok(items)
}

impl Matrix {
    /// `Ok(None)` when `text` is not a matrix literal at all. A flat list is
    /// read as a column vector.
    pub fn parse(text: &str) -> Result<Option<Matrix>, SymbolicError> {
        let text = text.trim();
        let body = match text.strip_prefix("Matrix") {
            Some(rest) => rest
                .trim()
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .ok_or_else(|| malformed("expected Matrix([...])"))?
                .trim(),
            None => text,
        };
        if !body.starts_with('[') {
            return Ok(None);
        }

        let items = split_list(body)?;
        if items.is_empty() {
            return Err(SymbolicError::InvalidArgument("Matrix must not be empty.".to_string()));
        }
        let nested = items.iter().all(|item| item.starts_with('['));
        let rows: Vec<Vec<&str>> = if nested {
            items.into_iter().map(split_list).collect::<Result<_, _>>()?
        } else {
            items.into_iter().map(|item| vec![item]).collect()
        };

        let cols = rows[0].len();
        if cols == 0 || rows.iter().any(|r| r.len() != cols) {
            return Err(SymbolicError::InvalidArgument(
                "Matrix rows must all have the same non-zero length.".to_string(),
            ));
        }
        let entries = rows
            .iter()
            .flatten()
            .map(|src| parse_expr(src).map(|e| simplify(&e)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Matrix { rows: rows.len(), cols, entries }))
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> &Expr {
        &self.entries[row * self.cols + col]
    }

    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for e in &self.entries {
            e.collect_symbols(&mut out);
        }
        out
    }

    pub fn transpose(&self) -> Matrix {
        let entries = (0..self.cols)
            .flat_map(|c| (0..self.rows).map(move |r| (r, c)))
            .map(|(r, c)| self.get(r, c).clone())
            .collect();
        Matrix { rows: self.cols, cols: self.rows, entries }
    }

    fn minor(&self, skip_row: usize, skip_col: usize) -> Matrix {
        let entries = (0..self.rows)
            .filter(|r| *r != skip_row)
            .flat_map(|r| (0..self.cols).filter(move |c| *c != skip_col).map(move |c| (r, c)))
            .map(|(r, c)| self.get(r, c).clone())
            .collect();
        Matrix { rows: self.rows - 1, cols: self.cols - 1, entries }
    }

    /// Cofactor expansion along the first row.
    fn laplace(&self) -> Expr {
        match self.rows {
            0 => Expr::int(1),
            1 => self.get(0, 0).clone(),
            2 => Expr::sub(
                Expr::mul(vec![self.get(0, 0).clone(), self.get(1, 1).clone()]),
                Expr::mul(vec![self.get(0, 1).clone(), self.get(1, 0).clone()]),
            ),
            _ => {
                let terms = (0..self.cols)
                    .filter(|c| !self.get(0, *c).is_zero())
                    .map(|c| {
                        let sign = if c % 2 == 0 { 1 } else { -1 };
                        Expr::mul(vec![Expr::int(sign), self.get(0, c).clone(), self.minor(0, c).laplace()])
                    })
                    .collect();
                simplify(&Expr::Add(terms))
            }
        }
    }

    fn require_square(&self, what: &str) -> Result<(), SymbolicError> {
        if self.rows != self.cols {
            return Err(SymbolicError::InvalidArgument(format!("Matrix must be square to compute the {}.", what)));
        }
        if self.rows > MAX_DET_SIZE {
            return Err(SymbolicError::InvalidArgument(format!(
                "{} is limited to {}x{} matrices, got {}x{}",
                what, MAX_DET_SIZE, MAX_DET_SIZE, self.rows, self.cols
            )));
        }
        Ok(())
    }

    pub fn det(&self) -> Result<Expr, SymbolicError> {
        self.require_square("determinant")?;
        Ok(expand(&self.laplace()))
    }

    /// Adjugate over determinant, each entry reduced to lowest terms.
    pub fn inverse(&self) -> Result<Matrix, SymbolicError> {
        self.require_square("inverse")?;
        let det = self.det()?;
        if det.is_zero() {
            return Err(SymbolicError::InvalidArgument("Matrix det == 0; not invertible.".to_string()));
        }
        let n = self.rows;
        let mut entries = Vec::with_capacity(n * n);
        for r in 0..n {
            for c in 0..n {
                // adjugate is the transposed cofactor matrix
                let cofactor = if n == 1 {
                    Expr::int(1)
                } else {
                    let sign = if (r + c) % 2 == 0 { 1 } else { -1 };
                    Expr::mul(vec![Expr::int(sign), self.minor(c, r).laplace()])
                };
                entries.push(rewrite::cancel(&Expr::div(cofactor, det.clone())));
            }
        }
        Ok(Matrix { rows: n, cols: n, entries })
    }

    pub fn to_latex(&self) -> String {
        let rows: Vec<String> = (0..self.rows)
            .map(|r| {
                (0..self.cols)
                    .map(|c| self.get(r, c).to_latex())
                    .collect::<Vec<_>>()
                    .join(" & ")
            })
            .collect();
        format!("\\left[\\begin{{matrix}}{}\\end{{matrix}}\\right]", rows.join("\\\\"))
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Matrix([")?;
        for r in 0..self.rows {
            if r > 0 {
                f.write_str(", ")?;
            }
            f.write_str("[")?;
            for c in 0..self.cols {
                if c > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", self.get(r, c))?;
            }
            f.write_str("]")?;
        }
        f.write_str("])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Matrix {
        Matrix::parse(s).unwrap().unwrap()
    }

    #[test]
    fn parses_both_spellings() {
        assert_eq!(m("Matrix([[1, 2], [3, 4]])"), m("[[1, 2], [3, 4]]"));
        assert_eq!(m("[[1, 2], [3, 4]]").to_string(), "Matrix([[1, 2], [3, 4]])");
        let column = m("[1, x, 3]");
        assert_eq!((column.rows(), column.cols()), (3, 1));
        assert_eq!(Matrix::parse("x^2 + 1").unwrap(), None);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(matches!(Matrix::parse("[[1, 2], [3]]"), Err(SymbolicError::InvalidArgument(_))));
        assert!(Matrix::parse("[[1, 2], [3, 4]").is_err());
    }

    #[test]
    fn determinants() {
        assert_eq!(m("[[1, 2], [3, 4]]").det().unwrap().to_string(), "-2");
        assert_eq!(m("[[2, 0, 1], [1, 3, 2], [1, 1, 2]]").det().unwrap().to_string(), "6");
        assert_eq!(m("[[a, b], [c, d]]").det().unwrap().to_string(), "a*d - b*c");
        let err = m("[[1, 2, 3], [4, 5, 6]]").det().unwrap_err();
        assert_eq!(err.to_string(), "Matrix must be square to compute the determinant.");
    }

    #[test]
    fn inverse_and_singular() {
        assert_eq!(m("[[1, 2], [3, 4]]").inverse().unwrap().to_string(), "Matrix([[-2, 1], [3/2, -1/2]])");
        assert_eq!(m("[[x, 0], [0, 1]]").inverse().unwrap().to_string(), "Matrix([[1/x, 0], [0, 1]])");
        let err = m("[[1, 2], [2, 4]]").inverse().unwrap_err();
        assert_eq!(err.to_string(), "Matrix det == 0; not invertible.");
    }

    #[test]
    fn transpose_and_latex() {
        let t = m("[[1, 2, 3], [4, 5, 6]]").transpose();
        assert_eq!(t.to_string(), "Matrix([[1, 4], [2, 5], [3, 6]])");
        assert_eq!(m("[[1, 2], [3, 4]]").to_latex(), "\\left[\\begin{matrix}1 & 2\\\\3 & 4\\end{matrix}\\right]");
    }
}
