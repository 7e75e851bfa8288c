//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before retry number `attempt` (1-based):
/// `min(base * 2^attempt + random(0..=jitter), cap)`.
pub fn backoff_delay(base: Duration, attempt: u32, jitter: Duration, cap: Duration) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt));
    let jitter = if jitter.is_zero() {
        Duration::ZERO
    } else {
        let max_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    };
    exponential.saturating_add(jitter).min(cap)
}
