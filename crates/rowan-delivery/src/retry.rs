//! Retry policy for failed deliveries.
//!
//! A failed request with one attempt left is dropped; otherwise a successor
//! record is built with the TTL decremented, the retry counter incremented,
//! and a new delivery time pushed out from the current moment. Schedules
//! are deterministic per `(uid, retry)` so retry timing is reproducible
//! under an injected clock.

use std::time::Duration;

use rowan_core::StoredRequest;

/// How far into the future a failed attempt is pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffSchedule {
    /// The same delay after every failure.
    Fixed(Duration),

    /// Doubling delay, `min(cap, base * 2^retry)`.
    Exponential {
        /// Delay before the first retry.
        base: Duration,
        /// Upper bound on any single delay.
        cap: Duration,
    },
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::Fixed(Duration::from_secs(10))
    }
}

impl BackoffSchedule {
    /// Returns the delay before attempt `retry + 1`.
    pub fn delay(&self, retry: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { base, cap } => {
                // Cap the exponent so the shift cannot overflow.
                let exponent = retry.min(20);
                let delay = base.saturating_mul(2u32.saturating_pow(exponent));
                delay.min(*cap)
            },
        }
    }
}

/// Decides the fate of a failed delivery.
///
/// Returns `None` when the final permitted attempt has been made (the
/// caller deletes the record), or the successor record to commit via
/// `reschedule`. The successor keeps the uid and payload verbatim, is
/// unscheduled, and becomes due at `now + delay`. The delay is measured
/// from the current moment rather than the old delivery time, so a
/// long-unavailable upstream cannot pile up retries scheduled in the past.
pub fn next_attempt(
    request: &StoredRequest,
    now_nanos: i64,
    backoff: &BackoffSchedule,
) -> Option<StoredRequest> {
    if request.ttl <= 1 {
        return None;
    }

    let delay = backoff.delay(request.retry);
    let delay_nanos = i64::try_from(delay.as_nanos()).unwrap_or(i64::MAX);

    Some(StoredRequest {
        uid: request.uid,
        delivery_time: now_nanos.saturating_add(delay_nanos),
        method: request.method.clone(),
        path: request.path.clone(),
        headers: request.headers.clone(),
        body: request.body.clone(),
        ttl: request.ttl - 1,
        retry: request.retry + 1,
        scheduled: false,
    })
}
