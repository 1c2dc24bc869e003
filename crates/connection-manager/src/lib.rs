//! The connection state machine, latency sampling and stale-connection
//! reaper of spec.md section 4.3.

mod latency;
mod manager;

pub use latency::{avg_and_jitter, classify, push_sample, LatencyThresholds};
pub use manager::{ConnectionManager, KickDecision, PingOutcome};
