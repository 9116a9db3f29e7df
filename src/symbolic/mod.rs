//! Symbolic expression engine backing the `calculus` and `algebra` bindings.

use thiserror::Error;

pub mod compute;
pub mod expr;
pub mod matrix;
pub mod number;
pub mod ops;
pub mod parser;
pub mod rewrite;

pub use compute::{batch, compute, task_names, ComputeRequest, ComputeResponse};
pub use expr::{Expr, Statement};
pub use matrix::Matrix;
pub use number::Number;
pub use parser::{parse, parse_expr};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SymbolicError {
    #[error("parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("symbol '{0}' has no value")]
    UnboundSymbol(String),

    #[error("no closed form for {0}")]
    NoClosedForm(String),

    #[error("limit does not exist: {0}")]
    LimitDoesNotExist(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl SymbolicError {
    /// Short category name used in batch error strings.
    pub fn kind(&self) -> &'static str {
        match self {
            SymbolicError::Parse { .. } => "ParseError",
            SymbolicError::InvalidArgument(_) => "ValueError",
            SymbolicError::UnboundSymbol(_) => "UnboundSymbolError",
            SymbolicError::NoClosedForm(_) => "NoClosedFormError",
            SymbolicError::LimitDoesNotExist(_) => "LimitError",
            SymbolicError::Unsupported(_) => "UnsupportedError",
        }
    }
}
