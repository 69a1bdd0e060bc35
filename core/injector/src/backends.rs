//! Registry of backend factories supported by the process.
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use fleetcore_store::StoreFactory;

/// Error looking for a specific backend implementation.
#[derive(Debug, thiserror::Error)]
pub enum BackendNotFound {
    /// Principal Store backend not recognised.
    #[error("principal store backend '{0}' not recognised")]
    // (id,)
    Store(String),
}

impl BackendNotFound {
    /// Principal Store backend not recognised.
    pub fn store(id: &str) -> Self {
        Self::Store(id.to_string())
    }
}

/// Registers of backend factories for implementations supported by the process.
#[derive(Clone, Default)]
pub struct Backends {
    /// Supported Principal Store backends.
    stores: HashMap<String, Arc<dyn StoreFactory>>,
}

impl Backends {
    /// Registry with all backends built into the control plane.
    pub fn builtin() -> Backends {
        let mut backends = Backends::default();
        backends.register_store("sqlite", fleetcore_store_sqlite::SQLiteFactory);
        backends
    }

    /// Register a new factory for a Principal Store implementation.
    ///
    /// # Panics
    ///
    /// This method panics if the identifier of the new Principal Store backend is already in use.
    pub fn register_store<B, S>(&mut self, id: S, backend: B) -> &mut Self
    where
        B: StoreFactory + 'static,
        S: Into<String>,
    {
        match self.stores.entry(id.into()) {
            Entry::Occupied(entry) => {
                panic!(
                    "a StoreBackend with id '{}' is already registered",
                    entry.key()
                )
            }
            Entry::Vacant(entry) => entry.insert(Arc::new(backend)),
        };
        self
    }

    /// Lookup a [`StoreFactory`] by ID.
    pub fn store(&self, id: &str) -> Result<&dyn StoreFactory> {
        let factory = self
            .stores
            .get(id)
            .ok_or_else(|| BackendNotFound::store(id))?;
        Ok(factory.as_ref())
    }
}
