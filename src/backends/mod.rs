//! Built-in binding modules and the default mode registry.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::execution::{BackendResolver, BindingLoader, BindingModule, LibraryLoadError, Mode};

pub mod algebra;
pub mod calculus;
pub mod numeric;

/// Loader for a module compiled into the binary. Each load builds a fresh
/// module value.
pub struct BuiltinLoader {
    name: &'static str,
    build: fn() -> Arc<dyn BindingModule>,
}

impl BuiltinLoader {
    pub fn new(name: &'static str, build: fn() -> Arc<dyn BindingModule>) -> Self {
        Self { name, build }
    }
}

#[async_trait]
impl BindingLoader for BuiltinLoader {
    fn name(&self) -> &str {
        self.name
    }

    async fn load(&self) -> Result<Arc<dyn BindingModule>, LibraryLoadError> {
        tokio::task::yield_now().await;
        debug!(binding = self.name, "built-in binding loaded");
        Ok((self.build)())
    }
}

fn numeric() -> Arc<dyn BindingModule> {
    Arc::new(numeric::NumericModule)
}

fn calculus() -> Arc<dyn BindingModule> {
    Arc::new(calculus::CalculusModule)
}

fn algebra() -> Arc<dyn BindingModule> {
    Arc::new(algebra::AlgebraModule)
}

/// Registry with `math` for numerical mode, `calculus` and `algebra` for
/// symbolic mode, and nothing for reasoning.
pub fn default_resolver() -> BackendResolver {
    let mut resolver = BackendResolver::new();
    resolver
        .register(Mode::Numerical, Arc::new(BuiltinLoader::new(numeric::NAME, numeric)))
        .register(Mode::Symbolic, Arc::new(BuiltinLoader::new(calculus::NAME, calculus)))
        .register(Mode::Symbolic, Arc::new(BuiltinLoader::new(algebra::NAME, algebra)));
    resolver
}
