//! One workbench's code, mode and latest result.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::backend::BackendResolver;
use super::capture::CaptureSurface;
use super::sandbox::{RuntimeError, SandboxExecutor};
use super::{ExecutionResult, Failure, Mode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Ready,
    Running,
    Settled,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Ready => "ready",
            SessionState::Running => "running",
            SessionState::Settled => "settled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no code to run")]
    NoCode,

    #[error("a run is already in progress")]
    AlreadyRunning,
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    code: String,
    result: Option<Arc<ExecutionResult>>,
}

/// State machine owning one code string and the most recent result.
///
/// Runs are serialized: a second [`ExecutionSession::run`] while one is in
/// flight is rejected with [`SessionError::AlreadyRunning`].
pub struct ExecutionSession {
    mode: Mode,
    resolver: Arc<BackendResolver>,
    executor: SandboxExecutor,
    inner: Mutex<Inner>,
}

impl fmt::Debug for ExecutionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionSession")
            .field("mode", &self.mode)
            .field("state", &self.state())
            .finish()
    }
}

impl ExecutionSession {
    pub fn new(mode: Mode, resolver: Arc<BackendResolver>) -> Self {
        Self {
            mode,
            resolver,
            executor: SandboxExecutor::new(),
            inner: Mutex::new(Inner { state: SessionState::Idle, code: String::new(), result: None }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn code(&self) -> String {
        self.lock().code.clone()
    }

    /// Latest settled result. Stays visible until a new run settles.
    pub fn result(&self) -> Option<Arc<ExecutionResult>> {
        self.lock().result.clone()
    }

    /// Replaces the code. A run in flight keeps the code it started with.
    pub fn set_code(&self, text: impl Into<String>) {
        let mut inner = self.lock();
        inner.code = text.into();
        if inner.state == SessionState::Running {
            return;
        }
        inner.state = if inner.code.trim().is_empty() {
            SessionState::Idle
        } else {
            SessionState::Ready
        };
    }

    /// Prepares bindings, executes the current code and settles with the
    /// result, whether it succeeded or failed.
    pub async fn run(&self) -> Result<Arc<ExecutionResult>, SessionError> {
        let code = {
            let mut inner = self.lock();
            if inner.state == SessionState::Running {
                return Err(SessionError::AlreadyRunning);
            }
            if inner.code.trim().is_empty() {
                return Err(SessionError::NoCode);
            }
            inner.state = SessionState::Running;
            inner.code.clone()
        };

        let mut guard = RunGuard { session: self, armed: true };
        let result = Arc::new(self.execute(&code).await);
        guard.armed = false;
        info!(mode = %self.mode, status = ?result.status(), logs = result.logs().len(), "run settled");

        let mut inner = self.lock();
        inner.state = SessionState::Settled;
        inner.result = Some(result.clone());
        Ok(result)
    }

    async fn execute(&self, code: &str) -> ExecutionResult {
        let bindings = match self.resolver.prepare(self.mode).await {
            Ok(bindings) => bindings,
            Err(e) => {
                warn!(error = %e, mode = %self.mode, "binding preparation failed");
                return ExecutionResult::aborted(Failure::library_load(&e));
            }
        };
        let executor = self.executor;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            executor.run(code, &bindings, CaptureSurface::new())
        }));
        outcome.unwrap_or_else(|payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(mode = %self.mode, %reason, "execution panicked");
            ExecutionResult::aborted(Failure::runtime(&RuntimeError(format!("internal error: {}", reason))))
        })
    }
}

/// Leaves `Running` if a run future is dropped or unwinds before settling.
struct RunGuard<'a> {
    session: &'a ExecutionSession,
    armed: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.session.lock();
        if inner.state == SessionState::Running {
            inner.state = if inner.code.trim().is_empty() {
                SessionState::Idle
            } else {
                SessionState::Ready
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use super::super::backend::{BindingLoader, BindingModule, LibraryLoadError};
    use super::*;

    fn session() -> ExecutionSession {
        ExecutionSession::new(Mode::Reasoning, Arc::new(BackendResolver::new()))
    }

    #[test]
    fn set_code_transitions() {
        let s = session();
        assert_eq!(s.state(), SessionState::Idle);
        s.set_code("   ");
        assert_eq!(s.state(), SessionState::Idle);
        s.set_code("return 1;");
        assert_eq!(s.state(), SessionState::Ready);
    }

    struct StalledLoader;

    #[async_trait::async_trait]
    impl BindingLoader for StalledLoader {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn load(&self) -> Result<Arc<dyn BindingModule>, LibraryLoadError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn dropped_run_returns_to_ready() {
        let mut resolver = BackendResolver::new();
        resolver.register(Mode::Reasoning, Arc::new(StalledLoader));
        let s = ExecutionSession::new(Mode::Reasoning, Arc::new(resolver));
        s.set_code("return 1;");

        let mut run = Box::pin(s.run());
        let waker = futures::task::noop_waker();
        let mut cx = std::task::Context::from_waker(&waker);
        assert!(run.as_mut().poll(&mut cx).is_pending());
        assert_eq!(s.state(), SessionState::Running);
        drop(run);

        assert_eq!(s.state(), SessionState::Ready);
        assert_eq!(s.code(), "return 1;");
    }

    #[tokio::test]
    async fn run_requires_code() {
        let s = session();
        assert_eq!(s.run().await.unwrap_err(), SessionError::NoCode);
    }

    #[tokio::test]
    async fn settles_and_keeps_result_until_next_run() {
        let s = session();
        s.set_code("return 'first';");
        let first = s.run().await.unwrap();
        assert_eq!(s.state(), SessionState::Settled);
        assert_eq!(first.returned_value(), Some("first"));

        s.set_code("throw new Error('second');");
        assert_eq!(s.state(), SessionState::Ready);
        assert_eq!(s.result().unwrap().returned_value(), Some("first"));

        let second = s.run().await.unwrap();
        assert_eq!(second.failure().unwrap().message, "Runtime Error: second");
        assert_eq!(s.state(), SessionState::Settled);
    }
}
