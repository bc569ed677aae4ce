//! Duration units with saturating conversions.
//!
//! Every conversion clamps to `i64::MAX` / `i64::MIN` instead of wrapping, so a
//! pathological duration can never turn into a small or negative one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const NANOS_PER_MICRO: i64 = 1_000;
const NANOS_PER_MILLI: i64 = 1_000_000;
const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: i64 = 24 * NANOS_PER_HOUR;

/// Granularity of a duration or of the denominator of a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Nanoseconds in one unit.
    #[inline]
    pub const fn nanos_per_unit(self) -> i64 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => NANOS_PER_MICRO,
            TimeUnit::Milliseconds => NANOS_PER_MILLI,
            TimeUnit::Seconds => NANOS_PER_SECOND,
            TimeUnit::Minutes => NANOS_PER_MINUTE,
            TimeUnit::Hours => NANOS_PER_HOUR,
            TimeUnit::Days => NANOS_PER_DAY,
        }
    }

    /// Convert `duration`, expressed in `source`, into this unit.
    pub fn convert(self, duration: i64, source: TimeUnit) -> i64 {
        let from = source.nanos_per_unit();
        let to = self.nanos_per_unit();
        if from == to {
            duration
        } else if from > to {
            duration.saturating_mul(from / to)
        } else {
            duration / (to / from)
        }
    }

    pub fn to_nanos(self, duration: i64) -> i64 {
        TimeUnit::Nanoseconds.convert(duration, self)
    }

    pub fn to_micros(self, duration: i64) -> i64 {
        TimeUnit::Microseconds.convert(duration, self)
    }

    pub fn to_millis(self, duration: i64) -> i64 {
        TimeUnit::Milliseconds.convert(duration, self)
    }

    pub fn to_seconds(self, duration: i64) -> i64 {
        TimeUnit::Seconds.convert(duration, self)
    }

    pub fn to_minutes(self, duration: i64) -> i64 {
        TimeUnit::Minutes.convert(duration, self)
    }

    pub fn to_hours(self, duration: i64) -> i64 {
        TimeUnit::Hours.convert(duration, self)
    }

    pub fn to_days(self, duration: i64) -> i64 {
        TimeUnit::Days.convert(duration, self)
    }

    /// Express a nanosecond quantity as a fractional count of this unit.
    #[inline]
    pub fn scale_nanos(self, nanos: f64) -> f64 {
        nanos / self.nanos_per_unit() as f64
    }

    /// Nanoseconds in a `Duration`, saturating at `i64::MAX`.
    pub fn duration_nanos(duration: Duration) -> i64 {
        i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
    }

    /// Short label used by reporters.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_round_trip_through_nanos() {
        for x in [0_i64, 1, 999, 1_234_567, -42, i64::MAX / NANOS_PER_MILLI] {
            let nanos = TimeUnit::Milliseconds.to_nanos(x);
            assert_eq!(TimeUnit::Nanoseconds.to_millis(nanos), x);
            assert_eq!(TimeUnit::Milliseconds.to_millis(x), x);
        }
    }

    #[test]
    fn test_overflow_saturates() {
        assert_eq!(TimeUnit::Days.to_nanos(i64::MAX / 2), i64::MAX);
        assert_eq!(TimeUnit::Days.to_nanos(i64::MIN / 2), i64::MIN);
        assert_eq!(TimeUnit::Seconds.to_micros(i64::MAX), i64::MAX);
        assert_eq!(TimeUnit::Hours.to_millis(-(i64::MAX / 1000)), i64::MIN);
    }

    #[test]
    fn test_downscaling_truncates() {
        assert_eq!(TimeUnit::Milliseconds.to_seconds(1_999), 1);
        assert_eq!(TimeUnit::Minutes.to_hours(119), 1);
        assert_eq!(TimeUnit::Hours.to_days(48), 2);
        assert_eq!(TimeUnit::Nanoseconds.to_micros(1_500), 1);
    }

    #[test]
    fn test_upscaling() {
        assert_eq!(TimeUnit::Days.to_hours(1), 24);
        assert_eq!(TimeUnit::Minutes.to_seconds(3), 180);
        assert_eq!(TimeUnit::Seconds.to_nanos(2), 2_000_000_000);
    }

    #[test]
    fn test_duration_nanos_saturates() {
        assert_eq!(TimeUnit::duration_nanos(Duration::from_millis(5)), 5_000_000);
        assert_eq!(TimeUnit::duration_nanos(Duration::MAX), i64::MAX);
    }

    #[test]
    fn test_scale_nanos() {
        assert_eq!(TimeUnit::Milliseconds.scale_nanos(2_500_000.0), 2.5);
        assert_eq!(TimeUnit::Seconds.scale_nanos(500_000_000.0), 0.5);
    }
}
