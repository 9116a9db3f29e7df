//! Mode-indexed registry of binding loaders.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use boa_engine::{Context, JsObject, JsResult};
use futures::future::try_join_all;
use thiserror::Error;
use tracing::debug;

use super::Mode;

/// Names the executed code already receives from the capture surface.
pub const RESERVED_NAMES: &[&str] = &["console", "plot"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryLoadError {
    #[error("failed to load '{name}': {reason}")]
    Failed { name: String, reason: String },

    #[error("binding name '{0}' is reserved")]
    Reserved(String),

    #[error("binding name '{0}' is not a valid identifier")]
    InvalidName(String),

    #[error("loader '{expected}' produced module '{actual}'")]
    NameMismatch { expected: String, actual: String },
}

/// A loaded library handle that knows how to expose itself to one engine
/// context.
pub trait BindingModule: Send + Sync {
    fn name(&self) -> &str;

    /// Creates the object the executed code sees under [`Self::name`].
    fn install(&self, ctx: &mut Context) -> JsResult<JsObject>;
}

#[async_trait]
pub trait BindingLoader: Send + Sync {
    /// Fixed name the module is exposed under.
    fn name(&self) -> &str;

    async fn load(&self) -> Result<Arc<dyn BindingModule>, LibraryLoadError>;
}

/// Loaded modules for one execution, keyed by binding name.
#[derive(Clone, Default)]
pub struct BindingSet {
    modules: BTreeMap<String, Arc<dyn BindingModule>>,
}

impl BindingSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Binding names in ascending order, matching the parameter order of the
    /// compiled function.
    pub fn names(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn BindingModule>> {
        self.modules.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn BindingModule>)> {
        self.modules.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl std::fmt::Debug for BindingSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.modules.keys()).finish()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[derive(Clone, Default)]
pub struct BackendResolver {
    loaders: HashMap<Mode, Vec<Arc<dyn BindingLoader>>>,
}

impl BackendResolver {
    /// A resolver with no loaders; every mode prepares an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a loader for `mode`, replacing any loader with the same name.
    pub fn register(&mut self, mode: Mode, loader: Arc<dyn BindingLoader>) -> &mut Self {
        let entry = self.loaders.entry(mode).or_default();
        entry.retain(|l| l.name() != loader.name());
        entry.push(loader);
        self
    }

    pub fn binding_names(&self, mode: Mode) -> Vec<String> {
        let mut names: Vec<String> = self
            .loaders
            .get(&mode)
            .map(|ls| ls.iter().map(|l| l.name().to_string()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Loads every binding registered for `mode`, concurrently and exactly
    /// once each. Nothing is cached between calls.
    pub async fn prepare(&self, mode: Mode) -> Result<BindingSet, LibraryLoadError> {
        let loaders = match self.loaders.get(&mode) {
            Some(loaders) if !loaders.is_empty() => loaders,
            _ => return Ok(BindingSet::empty()),
        };

        for loader in loaders {
            let name = loader.name();
            if RESERVED_NAMES.contains(&name) {
                return Err(LibraryLoadError::Reserved(name.to_string()));
            }
            if !is_identifier(name) {
                return Err(LibraryLoadError::InvalidName(name.to_string()));
            }
        }

        let loaded = try_join_all(loaders.iter().map(|loader| async move {
            debug!(binding = loader.name(), %mode, "loading binding");
            let module = loader.load().await?;
            if module.name() != loader.name() {
                return Err(LibraryLoadError::NameMismatch {
                    expected: loader.name().to_string(),
                    actual: module.name().to_string(),
                });
            }
            Ok(module)
        }))
        .await?;

        let modules = loaded
            .into_iter()
            .map(|m| (m.name().to_string(), m))
            .collect();
        Ok(BindingSet { modules })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::object::ObjectInitializer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Stub(&'static str);

    impl BindingModule for Stub {
        fn name(&self) -> &str {
            self.0
        }

        fn install(&self, ctx: &mut Context) -> JsResult<JsObject> {
            Ok(ObjectInitializer::new(ctx).build())
        }
    }

    struct CountingLoader {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl BindingLoader for CountingLoader {
        fn name(&self) -> &str {
            self.name
        }

        async fn load(&self) -> Result<Arc<dyn BindingModule>, LibraryLoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LibraryLoadError::Failed {
                    name: self.name.into(),
                    reason: "offline".into(),
                });
            }
            Ok(Arc::new(Stub(self.name)))
        }
    }

    fn loader(name: &'static str, calls: &Arc<AtomicUsize>, fail: bool) -> Arc<dyn BindingLoader> {
        Arc::new(CountingLoader { name, calls: calls.clone(), fail })
    }

    #[tokio::test]
    async fn each_loader_runs_once_per_prepare() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut resolver = BackendResolver::new();
        resolver
            .register(Mode::Symbolic, loader("b", &calls, false))
            .register(Mode::Symbolic, loader("a", &calls, false));

        let set = resolver.prepare(Mode::Symbolic).await.unwrap();
        assert_eq!(set.names(), vec!["a", "b"]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        resolver.prepare(Mode::Symbolic).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn same_name_replaces() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut resolver = BackendResolver::new();
        resolver
            .register(Mode::Numerical, loader("math", &calls, true))
            .register(Mode::Numerical, loader("math", &calls, false));
        let set = resolver.prepare(Mode::Numerical).await.unwrap();
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn unregistered_mode_is_empty() {
        let set = BackendResolver::new().prepare(Mode::Reasoning).await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn failures_and_bad_names() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut resolver = BackendResolver::new();
        resolver.register(Mode::Numerical, loader("math", &calls, true));
        assert!(matches!(
            resolver.prepare(Mode::Numerical).await,
            Err(LibraryLoadError::Failed { .. })
        ));

        let mut resolver = BackendResolver::new();
        resolver.register(Mode::Numerical, loader("console", &calls, false));
        assert_eq!(
            resolver.prepare(Mode::Numerical).await.unwrap_err(),
            LibraryLoadError::Reserved("console".into())
        );

        let mut resolver = BackendResolver::new();
        resolver.register(Mode::Numerical, loader("not valid", &calls, false));
        assert!(matches!(
            resolver.prepare(Mode::Numerical).await,
            Err(LibraryLoadError::InvalidName(_))
        ));
    }
}
