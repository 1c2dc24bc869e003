//! Shared primitives used across the tick broadcaster workspace: opaque
//! ids, the error taxonomy of spec section 7, and tracing setup.

mod error;
mod ids;
mod tracing_init;

pub use error::CoreError;
pub use ids::{ConnectionId, SessionId};
pub use tracing_init::init_tracing;
