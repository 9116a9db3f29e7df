use std::sync::Arc;

use async_trait::async_trait;
use boa_engine::object::ObjectInitializer;
use boa_engine::{Context, JsObject, JsResult};
use tokio::sync::Notify;

use mathpad::backends::default_resolver;
use mathpad::execution::{
    BackendResolver, BindingLoader, BindingModule, ExecutionSession, FailureKind, LibraryLoadError, Mode,
    SessionError, SessionState, Status,
};

fn session(mode: Mode) -> ExecutionSession {
    ExecutionSession::new(mode, Arc::new(default_resolver()))
}

async fn run(mode: Mode, code: &str) -> Arc<mathpad::execution::ExecutionResult> {
    let s = session(mode);
    s.set_code(code);
    s.run().await.unwrap()
}

#[tokio::test]
async fn logs_and_return_value() {
    let result = run(Mode::Numerical, "console.log(\"sum\", 1+1); return 4;").await;
    assert_eq!(result.logs(), ["sum 2"]);
    assert_eq!(result.returned_value(), Some("4"));
    assert!(result.failure().is_none());
    assert_eq!(result.status(), Status::Succeeded);
}

#[tokio::test]
async fn logs_keep_call_order() {
    let result = run(Mode::Reasoning, "console.log('a'); await null; console.info('b');").await;
    assert_eq!(result.logs(), ["a", "b"]);
    assert_eq!(result.returned_value(), None);
}

#[tokio::test]
async fn last_plot_wins() {
    let code = "plot([{x: [1, 2], y: [3, 4]}], {title: 'first'}); plot([{x: [0], y: [1]}], {title: 'second'});";
    let result = run(Mode::Reasoning, code).await;
    let plot = result.plot().unwrap();
    assert_eq!(plot.layout["title"], "second");
    assert_eq!(plot.series[0]["y"][0], 1);
}

#[tokio::test]
async fn reported_error_suppresses_return_value() {
    let result = run(Mode::Reasoning, "console.log('before'); console.error('bad input'); return 5;").await;
    assert_eq!(result.returned_value(), None);
    let failure = result.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::UserReported);
    assert_eq!(failure.message, "bad input");
    assert_eq!(result.logs(), ["before"]);
}

#[tokio::test]
async fn compile_failure_runs_nothing() {
    let result = run(Mode::Reasoning, "console.log('never'); this is not valid (").await;
    let failure = result.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::Compilation);
    assert!(failure.message.starts_with("Compilation Error: "));
    assert!(result.logs().is_empty());
}

#[tokio::test]
async fn thrown_error_overrides_reported_error() {
    let result = run(Mode::Reasoning, "console.log('step'); console.error('x'); throw new Error('boom');").await;
    let failure = result.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::Runtime);
    assert_eq!(failure.message, "Runtime Error: boom");
    assert_eq!(result.logs(), ["step"]);
}

#[tokio::test]
async fn bindings_per_mode() {
    let resolver = default_resolver();
    assert_eq!(resolver.prepare(Mode::Reasoning).await.unwrap().len(), 0);
    assert_eq!(resolver.prepare(Mode::Numerical).await.unwrap().names(), ["math"]);
    assert_eq!(resolver.prepare(Mode::Symbolic).await.unwrap().names(), ["algebra", "calculus"]);

    let result = run(Mode::Reasoning, "return typeof math;").await;
    assert_eq!(result.returned_value(), Some("undefined"));
}

#[tokio::test]
async fn symbolic_bindings_are_usable() {
    let code = "const d = calculus.diff('x^3', 'x'); console.log(d); return algebra.simplify('x + x + 1 + 2');";
    let result = run(Mode::Symbolic, code).await;
    assert_eq!(result.failure(), None);
    assert_eq!(result.logs(), ["3*x^2"]);
    assert_eq!(result.returned_value(), Some("2*x + 3"));
}

#[tokio::test]
async fn numerical_bindings_are_usable() {
    let code = "const m = [[2, 0], [0, 4]]; console.log(math.inv(m)); return math.det(m);";
    let result = run(Mode::Numerical, code).await;
    assert_eq!(result.failure(), None);
    assert_eq!(result.logs(), ["[[0.5,0],[0,0.25]]"]);
    assert_eq!(result.returned_value(), Some("8"));
}

#[tokio::test]
async fn binding_errors_surface_as_runtime_failures() {
    let result = run(Mode::Numerical, "return math.inv([[1, 2], [2, 4]]);").await;
    assert_eq!(result.failure().unwrap().kind, FailureKind::Runtime);
}

struct EmptyModule(&'static str);

impl BindingModule for EmptyModule {
    fn name(&self) -> &str {
        self.0
    }

    fn install(&self, ctx: &mut Context) -> JsResult<JsObject> {
        Ok(ObjectInitializer::new(ctx).build())
    }
}

struct BrokenLoader;

#[async_trait]
impl BindingLoader for BrokenLoader {
    fn name(&self) -> &str {
        "broken"
    }

    async fn load(&self) -> Result<Arc<dyn BindingModule>, LibraryLoadError> {
        Err(LibraryLoadError::Failed { name: "broken".into(), reason: "offline".into() })
    }
}

#[tokio::test]
async fn load_failure_aborts_before_user_code() {
    let mut resolver = BackendResolver::new();
    resolver.register(Mode::Numerical, Arc::new(BrokenLoader));
    let s = ExecutionSession::new(Mode::Numerical, Arc::new(resolver));
    s.set_code("console.log('hi'); return 1;");
    let result = s.run().await.unwrap();

    let failure = result.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::LibraryLoad);
    assert_eq!(failure.message, "Library Load Error: failed to load 'broken': offline");
    assert!(result.logs().is_empty());
    assert_eq!(s.state(), SessionState::Settled);
}

struct GatedLoader(Arc<Notify>);

#[async_trait]
impl BindingLoader for GatedLoader {
    fn name(&self) -> &str {
        "gate"
    }

    async fn load(&self) -> Result<Arc<dyn BindingModule>, LibraryLoadError> {
        self.0.notified().await;
        Ok(Arc::new(EmptyModule("gate")))
    }
}

#[tokio::test]
async fn second_run_while_running_is_rejected() {
    let gate = Arc::new(Notify::new());
    let mut resolver = BackendResolver::new();
    resolver.register(Mode::Reasoning, Arc::new(GatedLoader(gate.clone())));
    let s = ExecutionSession::new(Mode::Reasoning, Arc::new(resolver));
    s.set_code("return typeof gate;");

    let (first, second) = tokio::join!(s.run(), async {
        let rejected = s.run().await;
        assert_eq!(s.state(), SessionState::Running);
        s.set_code("return 'edited';");
        assert_eq!(s.state(), SessionState::Running);
        gate.notify_one();
        rejected
    });

    assert_eq!(second.unwrap_err(), SessionError::AlreadyRunning);
    assert_eq!(first.unwrap().returned_value(), Some("object"));
    assert_eq!(s.state(), SessionState::Settled);
    assert_eq!(s.code(), "return 'edited';");
}

struct PanickingModule;

impl BindingModule for PanickingModule {
    fn name(&self) -> &str {
        "faulty"
    }

    fn install(&self, _ctx: &mut Context) -> JsResult<JsObject> {
        panic!("install blew up")
    }
}

struct PanickingLoader;

#[async_trait]
impl BindingLoader for PanickingLoader {
    fn name(&self) -> &str {
        "faulty"
    }

    async fn load(&self) -> Result<Arc<dyn BindingModule>, LibraryLoadError> {
        Ok(Arc::new(PanickingModule))
    }
}

#[tokio::test]
async fn panicking_binding_settles_as_runtime_failure() {
    let mut resolver = BackendResolver::new();
    resolver.register(Mode::Numerical, Arc::new(PanickingLoader));
    let s = ExecutionSession::new(Mode::Numerical, Arc::new(resolver));
    s.set_code("return 1;");

    let result = s.run().await.unwrap();
    let failure = result.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::Runtime);
    assert_eq!(failure.message, "Runtime Error: internal error: install blew up");
    assert_eq!(s.state(), SessionState::Settled);

    s.set_code("return 2;");
    assert_eq!(s.state(), SessionState::Ready);
    let again = s.run().await.unwrap();
    assert_eq!(again.failure().unwrap().kind, FailureKind::Runtime);
    assert_eq!(s.state(), SessionState::Settled);
}

#[tokio::test]
async fn integer_edge_does_not_wedge_the_session() {
    let s = session(Mode::Symbolic);
    s.set_code("return algebra.simplify('-9223372036854775807 - 1');");
    let result = s.run().await.unwrap();
    assert_eq!(result.failure(), None);
    assert!(result.returned_value().unwrap().starts_with("-92233720368547758"));
    assert_eq!(s.state(), SessionState::Settled);
}
