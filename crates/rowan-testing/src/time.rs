//! Deterministic time control for testing.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use rowan_core::Clock;

/// Test clock with controllable virtual time.
///
/// Delivery times are epoch-nanoseconds, so the clock tracks system time at
/// nanosecond resolution. `sleep` advances virtual time immediately instead
/// of waiting, which lets dispatcher idle loops spin through simulated time
/// without real delays.
#[derive(Clone)]
pub struct TestClock {
    /// Virtual system time as nanoseconds since the Unix epoch.
    system_nanos: Arc<AtomicU64>,
    /// Base instant for monotonic time calculations.
    base_instant: Instant,
    /// Monotonic offset in nanoseconds since clock creation.
    monotonic_nanos: Arc<AtomicU64>,
}

impl TestClock {
    /// Creates a test clock starting at the current wall-clock time.
    pub fn new() -> Self {
        Self::with_start_time(SystemTime::now())
    }

    /// Creates a test clock starting at a specific system time.
    pub fn with_start_time(start: SystemTime) -> Self {
        let since_epoch = start.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            system_nanos: Arc::new(AtomicU64::new(
                u64::try_from(since_epoch.as_nanos()).unwrap_or(u64::MAX),
            )),
            base_instant: Instant::now(),
            monotonic_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advances both clocks by the specified duration.
    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.system_nanos.fetch_add(nanos, Ordering::AcqRel);
        self.monotonic_nanos.fetch_add(nanos, Ordering::AcqRel);
    }

    /// Jumps the system clock to a specific time. Monotonic time only moves
    /// forward.
    pub fn jump_to(&self, time: SystemTime) {
        let target = u64::try_from(
            time.duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos(),
        )
        .unwrap_or(u64::MAX);
        let current = self.system_nanos.load(Ordering::Acquire);
        if target > current {
            self.advance(Duration::from_nanos(target - current));
        } else {
            self.system_nanos.store(target, Ordering::Release);
        }
    }

    /// Returns elapsed virtual time since clock creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.monotonic_nanos.load(Ordering::Acquire))
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.base_instant + Duration::from_nanos(self.monotonic_nanos.load(Ordering::Acquire))
    }

    fn now_system(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_nanos(self.system_nanos.load(Ordering::Acquire))
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.advance(duration);
        // Yield so other tasks observe the advanced clock.
        Box::pin(tokio::task::yield_now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_both_clocks() {
        let start = UNIX_EPOCH + Duration::from_secs(1_000);
        let clock = TestClock::with_start_time(start);

        clock.advance(Duration::from_millis(1_500));

        assert_eq!(clock.now_system(), start + Duration::from_millis(1_500));
        assert_eq!(clock.elapsed(), Duration::from_millis(1_500));
    }

    #[test]
    fn unix_nanos_tracks_virtual_time() {
        let start = UNIX_EPOCH + Duration::from_secs(2_000);
        let clock = TestClock::with_start_time(start);
        assert_eq!(clock.now_unix_nanos(), 2_000_000_000_000);

        clock.advance(Duration::from_nanos(42));
        assert_eq!(clock.now_unix_nanos(), 2_000_000_000_042);
    }

    #[test]
    fn jump_backwards_only_moves_system_time() {
        let clock = TestClock::with_start_time(UNIX_EPOCH + Duration::from_secs(5_000));
        clock.advance(Duration::from_secs(10));

        clock.jump_to(UNIX_EPOCH + Duration::from_secs(1_000));

        assert_eq!(
            clock.now_system(),
            UNIX_EPOCH + Duration::from_secs(1_000)
        );
        assert_eq!(clock.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn sleep_advances_without_waiting() {
        let clock = TestClock::new();
        let wall_start = Instant::now();

        clock.sleep(Duration::from_secs(3_600)).await;

        assert_eq!(clock.elapsed(), Duration::from_secs(3_600));
        assert!(wall_start.elapsed() < Duration::from_secs(1));
    }
}
