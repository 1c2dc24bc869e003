use broadcaster_engine::{current_tick_index, target_time};

/// How long the dispatcher should sleep before its next pass, given
/// the next session in line for a tick. spec.md section 4.4.3: "the
/// dispatcher sleeps for `min(max(10 ms, msUntilNextTick(anySession,
/// now)), 100 ms)`".
pub fn dispatch_sleep_ms(ms_until_next_tick: i64) -> u64 {
    ms_until_next_tick.clamp(10, 100) as u64
}

/// Milliseconds until the next unfired target time `T_k` for a
/// session, or `0` if one is already due.
pub fn ms_until_next_tick(start_at: i64, tick_ms: i64, now: i64) -> i64 {
    match current_tick_index(start_at, tick_ms, now) {
        None => start_at - now,
        Some(k) => {
            let next = target_time(start_at, tick_ms, k + 1);
            (next - now).max(0)
        }
    }
}

/// The broadcaster only emits once per session per observed tick
/// index (section 4.4.3: "emits only for the latest k"). Returns
/// `true` when `current_step` represents forward progress since
/// `last_emitted_step`.
pub fn should_emit(last_emitted_step: Option<i64>, current_step: i64) -> bool {
    match last_emitted_step {
        None => true,
        Some(last) => current_step > last,
    }
}

/// Brief idle yield when a node has no active sessions to tick
/// (section 4.4.1: "sleep >= 1 s before re-polling").
pub const IDLE_POLL_MS: u64 = 1_000;
