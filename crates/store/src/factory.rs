#[cfg(feature = "fjall-persistence")]
use std::path::Path;
use std::sync::Arc;

use crate::in_memory::InMemoryStore;
use crate::traits::{ConnectionStore, SessionStore};

/// A store that satisfies both halves of the section 4.2 contract.
pub trait Store: SessionStore + ConnectionStore {}
impl<T: SessionStore + ConnectionStore> Store for T {}

/// Mirrors `examples/rdaum-moor/crates/daemon/src/connections/registry.rs`'s
/// `ConnectionRegistryConfig`/`ConnectionRegistryFactory` split: callers
/// pick a backend by configuration rather than by type.
pub enum StoreConfig {
    InMemoryOnly,
    #[cfg(feature = "fjall-persistence")]
    WithFjallPersistence { path: Option<Box<Path>> },
}

pub struct StoreFactory;

impl StoreFactory {
    pub fn create(config: StoreConfig) -> Result<Arc<dyn Store + Send + Sync>, eyre::Error> {
        match config {
            StoreConfig::InMemoryOnly => Ok(Arc::new(InMemoryStore::new())),
            #[cfg(feature = "fjall-persistence")]
            StoreConfig::WithFjallPersistence { path } => {
                let store = crate::fjall_store::FjallStore::open(path.as_deref())?;
                Ok(Arc::new(store))
            }
        }
    }

    pub fn in_memory_only() -> Arc<dyn Store + Send + Sync> {
        Arc::new(InMemoryStore::new())
    }

    #[cfg(feature = "fjall-persistence")]
    pub fn with_fjall_persistence<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<Arc<dyn Store + Send + Sync>, eyre::Error> {
        let path = path.map(|p| p.as_ref().to_path_buf().into_boxed_path());
        Self::create(StoreConfig::WithFjallPersistence { path })
    }
}
