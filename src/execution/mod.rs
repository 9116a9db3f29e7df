//! Execution core: modes, the structured result of one run, and the pieces
//! that produce it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod backend;
pub mod capture;
pub mod sandbox;
pub mod session;
pub mod value;

pub use backend::{BackendResolver, BindingLoader, BindingModule, BindingSet, LibraryLoadError};
pub use capture::{CaptureSurface, CapturedEvent};
pub use sandbox::{CompilationError, Invocable, RuntimeError, SandboxExecutor};
pub use session::{ExecutionSession, SessionError, SessionState};

/// Which family of bindings the generated code runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Symbolic,
    Numerical,
    Reasoning,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Symbolic, Mode::Numerical, Mode::Reasoning];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Symbolic => "symbolic",
            Mode::Numerical => "numerical",
            Mode::Reasoning => "reasoning",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "symbolic" | "sym" => Ok(Mode::Symbolic),
            "numerical" | "numeric" | "num" => Ok(Mode::Numerical),
            "reasoning" | "logic" => Ok(Mode::Reasoning),
            other => Err(format!(
                "unknown mode '{}' (expected symbolic, numerical or reasoning)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plot {
    pub series: serde_json::Value,
    pub layout: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    LibraryLoad,
    Compilation,
    Runtime,
    UserReported,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn library_load(err: &LibraryLoadError) -> Self {
        Self { kind: FailureKind::LibraryLoad, message: format!("Library Load Error: {}", err) }
    }

    pub fn compilation(err: &CompilationError) -> Self {
        Self { kind: FailureKind::Compilation, message: format!("Compilation Error: {}", err) }
    }

    pub fn runtime(err: &RuntimeError) -> Self {
        Self { kind: FailureKind::Runtime, message: format!("Runtime Error: {}", err) }
    }

    pub fn user_reported(text: impl Into<String>) -> Self {
        Self { kind: FailureKind::UserReported, message: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Succeeded,
    Failed,
}

/// Immutable snapshot of one execution.
///
/// Constructed only through [`ExecutionResult::succeeded`] and
/// [`ExecutionResult::failed`], so a returned value and a failure never
/// coexist.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    logs: Vec<String>,
    plot: Option<Plot>,
    returned_value: Option<String>,
    failure: Option<Failure>,
}

impl ExecutionResult {
    pub fn succeeded(logs: Vec<String>, plot: Option<Plot>, returned_value: Option<String>) -> Self {
        Self { logs, plot, returned_value, failure: None }
    }

    pub fn failed(logs: Vec<String>, plot: Option<Plot>, failure: Failure) -> Self {
        Self { logs, plot, returned_value: None, failure: Some(failure) }
    }

    /// A run that never reached user code.
    pub fn aborted(failure: Failure) -> Self {
        Self::failed(Vec::new(), None, failure)
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn plot(&self) -> Option<&Plot> {
        self.plot.as_ref()
    }

    pub fn returned_value(&self) -> Option<&str> {
        self.returned_value.as_deref()
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn status(&self) -> Status {
        if self.failure.is_some() {
            Status::Failed
        } else {
            Status::Succeeded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing() {
        assert_eq!("numerical".parse::<Mode>().unwrap(), Mode::Numerical);
        assert_eq!(" Symbolic ".parse::<Mode>().unwrap(), Mode::Symbolic);
        assert_eq!("num".parse::<Mode>().unwrap(), Mode::Numerical);
        assert!("quantum".parse::<Mode>().is_err());
        assert_eq!(Mode::Reasoning.to_string(), "reasoning");
    }

    #[test]
    fn failed_results_drop_nothing_but_the_value() {
        let r = ExecutionResult::failed(
            vec!["a".into()],
            None,
            Failure::user_reported("bad input"),
        );
        assert_eq!(r.status(), Status::Failed);
        assert_eq!(r.logs(), ["a".to_string()]);
        assert!(r.returned_value().is_none());
    }

    #[test]
    fn serializes_camel_case() {
        let r = ExecutionResult::succeeded(vec![], None, Some("4".into()));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["returnedValue"], "4");
        assert!(json["failure"].is_null());
    }
}
