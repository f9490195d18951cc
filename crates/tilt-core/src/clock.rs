//! Second-of-minute time source.
//!
//! Producer samples are stamped with the second within the current minute
//! rather than a full timestamp. Ages are computed modulo 60, so a sample
//! recorded at second 58 is 5 seconds old at second 3. Two samples taken a
//! whole number of minutes apart carry the same stamp and cannot be told
//! apart.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of distinct second-of-minute values.
pub const SECONDS_PER_MINUTE: u8 = 60;

/// A second within a minute, always in `0..60`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SecondOfMinute(u8);

impl SecondOfMinute {
    /// Create a second-of-minute, returning `None` if `second >= 60`.
    #[must_use]
    pub fn new(second: u8) -> Option<Self> {
        (second < SECONDS_PER_MINUTE).then_some(Self(second))
    }

    /// Second-of-minute for a count of seconds since the Unix epoch.
    #[must_use]
    pub fn from_unix_secs(secs: u64) -> Self {
        Self((secs % u64::from(SECONDS_PER_MINUTE)) as u8)
    }

    /// Get the raw value.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Seconds elapsed since `earlier`, wrapping at the minute boundary.
    ///
    /// The result is always in `0..60`.
    #[must_use]
    pub fn since(self, earlier: SecondOfMinute) -> u8 {
        (self.0 + SECONDS_PER_MINUTE - earlier.0) % SECONDS_PER_MINUTE
    }

    /// This second advanced by `secs`, wrapping at the minute boundary.
    #[must_use]
    pub fn wrapping_add(self, secs: u8) -> Self {
        Self(((u16::from(self.0) + u16::from(secs)) % u16::from(SECONDS_PER_MINUTE)) as u8)
    }
}

impl fmt::Display for SecondOfMinute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SecondOfMinute> for u8 {
    fn from(second: SecondOfMinute) -> Self {
        second.0
    }
}

/// A source of the current second-of-minute.
pub trait Clock: Send + Sync {
    /// The current second within the minute.
    fn second_of_minute(&self) -> SecondOfMinute;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn second_of_minute(&self) -> SecondOfMinute {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        SecondOfMinute::from_unix_secs(secs)
    }
}

/// A clock that only moves when told to. Useful for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    second: AtomicU8,
}

impl ManualClock {
    /// Create a manual clock reading `second`.
    #[must_use]
    pub fn new(second: SecondOfMinute) -> Self {
        Self {
            second: AtomicU8::new(second.get()),
        }
    }

    /// Set the current second.
    pub fn set(&self, second: SecondOfMinute) {
        self.second.store(second.get(), Ordering::SeqCst);
    }

    /// Move the clock forward by `secs`, wrapping at the minute boundary.
    pub fn advance(&self, secs: u8) {
        let next = self.second_of_minute().wrapping_add(secs);
        self.set(next);
    }
}

impl Clock for ManualClock {
    fn second_of_minute(&self) -> SecondOfMinute {
        SecondOfMinute(self.second.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sec(s: u8) -> SecondOfMinute {
        SecondOfMinute::new(s).unwrap()
    }

    #[test]
    fn test_second_of_minute_range() {
        assert!(SecondOfMinute::new(0).is_some());
        assert!(SecondOfMinute::new(59).is_some());
        assert!(SecondOfMinute::new(60).is_none());
        assert_eq!(SecondOfMinute::from_unix_secs(125).get(), 5);
    }

    #[test]
    fn test_since_wraps_at_minute() {
        assert_eq!(sec(3).since(sec(58)), 5);
        assert_eq!(sec(59).since(sec(5)), 54);
        assert_eq!(sec(10).since(sec(10)), 0);
        assert_eq!(sec(0).since(sec(59)), 1);
        assert_eq!(sec(59).since(sec(0)), 59);
    }

    #[test]
    fn test_system_clock_in_range() {
        assert!(SystemClock.second_of_minute().get() < SECONDS_PER_MINUTE);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(sec(55));
        assert_eq!(clock.second_of_minute(), sec(55));

        clock.advance(10);
        assert_eq!(clock.second_of_minute(), sec(5));

        clock.set(sec(30));
        assert_eq!(clock.second_of_minute(), sec(30));
    }
}
