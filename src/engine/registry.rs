//! # Engine Registry
//!
//! Engines are registered on an explicit registry object built at startup
//! and handed to the components that open tables. There is no process-wide
//! registration.
//!
//! ```ignore
//! let mut engines = EngineRegistry::new();
//! engines.register(Arc::new(MemEngine::new()))?;
//!
//! let table = engines
//!     .get("memory")
//!     .ok_or_else(|| eyre!("no memory engine"))?
//!     .create_table(4096, columns)?;
//! ```

use std::sync::Arc;

use eyre::{ensure, eyre, Result};
use hashbrown::HashMap;

use super::{Engine, MemEngine};

#[derive(Default)]
pub struct EngineRegistry {
    engines: HashMap<String, Arc<dyn Engine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in engines.
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(MemEngine::new()))?;
        Ok(registry)
    }

    pub fn register(&mut self, engine: Arc<dyn Engine>) -> Result<()> {
        let name = engine.name().to_string();
        ensure!(!name.is_empty(), "engine name must not be empty");
        ensure!(
            !self.engines.contains_key(&name),
            "engine '{}' is already registered",
            name
        );

        tracing::info!(engine = %name, "registered storage engine");
        self.engines.insert(name, engine);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Engine>> {
        self.engines.get(name).cloned()
    }

    pub fn require(&self, name: &str) -> Result<Arc<dyn Engine>> {
        self.get(name)
            .ok_or_else(|| eyre!("unknown storage engine '{}'", name))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.engines.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
