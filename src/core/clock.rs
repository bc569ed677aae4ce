//! Time sources.
//!
//! Every metric receives its clock at construction, so tests can drive decay,
//! rescaling and rate windows deterministically with [`ManualClock`].

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of monotonic ticks and wall-clock time.
///
/// Implementations must be safe for concurrent reads.
pub trait Clock: Send + Sync {
    /// Monotonic tick in nanoseconds. Only differences between ticks are meaningful.
    fn tick(&self) -> u64;

    /// Wall-clock time in milliseconds since the Unix epoch.
    fn time(&self) -> u64;

    /// Wall-clock time in whole seconds since the Unix epoch.
    fn time_secs(&self) -> u64 {
        self.time() / 1_000
    }
}

/// Clock backed by `Instant` and `SystemTime`.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn tick(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn time(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

static DEFAULT_CLOCK: Lazy<Arc<SystemClock>> = Lazy::new(|| Arc::new(SystemClock::new()));

/// The process-wide system clock.
pub fn default_clock() -> Arc<dyn Clock> {
    let clock: Arc<SystemClock> = Arc::clone(&DEFAULT_CLOCK);
    clock
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    tick_nanos: AtomicU64,
    time_millis: AtomicU64,
}

impl ManualClock {
    /// Start at tick 0 and the given wall time.
    pub fn new(start_millis: u64) -> Self {
        Self {
            tick_nanos: AtomicU64::new(0),
            time_millis: AtomicU64::new(start_millis),
        }
    }

    /// Move both the tick and the wall time forward.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.tick_nanos.fetch_add(nanos, Ordering::SeqCst);
        self.time_millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for ManualClock {
    fn tick(&self) -> u64 {
        self.tick_nanos.load(Ordering::SeqCst)
    }

    fn time(&self) -> u64 {
        self.time_millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.tick(), 0);
        assert_eq!(clock.time_secs(), 1);

        clock.advance(Duration::from_millis(2_500));
        assert_eq!(clock.tick(), 2_500_000_000);
        assert_eq!(clock.time(), 3_500);
        assert_eq!(clock.time_secs(), 3);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.tick();
        let second = clock.tick();
        assert!(second >= first);
        assert!(clock.time() > 0);
    }

    #[test]
    fn test_default_clock_is_shared() {
        let a = default_clock();
        let b = default_clock();
        assert_eq!(Arc::as_ptr(&a) as *const (), Arc::as_ptr(&b) as *const ());

        let first = a.tick();
        let second = b.tick();
        assert!(second >= first);
    }
}
