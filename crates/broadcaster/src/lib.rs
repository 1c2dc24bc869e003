//! The tick broadcaster of spec.md section 4.4: session refresh,
//! per-session tick cycle, target-time scheduling and bounded fan-out.

mod dispatcher;
mod scheduler;
mod tick;
mod transport;

pub use dispatcher::{Clock, Dispatcher, SystemClock};
pub use scheduler::{dispatch_sleep_ms, ms_until_next_tick, should_emit, IDLE_POLL_MS};
pub use tick::{tick_session, SessionCache, SessionCursor};
pub use transport::{ConnectionSink, SendFailure};
