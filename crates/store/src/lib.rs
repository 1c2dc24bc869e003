//! The session/connection store contract of spec.md section 4.2: a
//! trait pair (`SessionStore`, `ConnectionStore`) implemented by an
//! always-available in-memory backend and an optional Fjall-backed
//! persistent one, selected at startup through `StoreFactory` the way
//! `moor-daemon` selects a `ConnectionRegistry` backend.

mod factory;
#[cfg(feature = "fjall-persistence")]
mod fjall_store;
mod in_memory;
mod models;
mod traits;

pub use factory::{Store, StoreConfig, StoreFactory};
#[cfg(feature = "fjall-persistence")]
pub use fjall_store::FjallStore;
pub use in_memory::InMemoryStore;
pub use models::{Connection, ConnectionStatus, Session, SessionStatus};
pub use traits::{ConnectionStore, SessionStore};
