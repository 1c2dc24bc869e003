//! The wire schema shared by every crate that speaks the HTTP API
//! (spec.md section 6.1) or the duplex WebSocket channel (section
//! 6.2), plus the process-wide configuration defaults of section 6.3.

mod config;
mod http;
mod ws;

pub use config::Config;
pub use http::{CreateSessionRequest, CreateSessionResponse, ErrorBody, SessionSnapshot};
pub use ws::{ClientMessage, LatencyClass, ServerMessage};
