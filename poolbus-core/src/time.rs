//! Millisecond time on a wrapping 32-bit counter
//!
//! The tick source rolls over after about 49.7 days. Only differences
//! between two instants are meaningful, so `Instant` has no ordering and
//! every subtraction wraps.

use core::ops::{Add, AddAssign};

/// A point on the millisecond counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Instant(u32);

impl Instant {
    /// Counter value zero
    pub const ZERO: Instant = Instant(0);

    pub const fn from_millis(ms: u32) -> Self {
        Self(ms)
    }

    pub const fn as_millis(self) -> u32 {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, correct across one wrap
    pub const fn duration_since(self, earlier: Instant) -> Duration {
        Duration(self.0.wrapping_sub(earlier.0))
    }

    /// The instant `duration` before this one
    pub const fn wrapping_sub(self, duration: Duration) -> Instant {
        Instant(self.0.wrapping_sub(duration.0))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

/// A span of milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Duration(u32);

impl Duration {
    pub const ZERO: Duration = Duration(0);

    pub const fn from_millis(ms: u32) -> Self {
        Self(ms)
    }

    pub const fn from_secs(secs: u32) -> Self {
        Self(secs.saturating_mul(1000))
    }

    pub const fn as_millis(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_since() {
        let a = Instant::from_millis(1_000);
        let b = Instant::from_millis(1_250);
        assert_eq!(b.duration_since(a), Duration::from_millis(250));
    }

    #[test]
    fn test_duration_since_across_wrap() {
        let before = Instant::from_millis(u32::MAX - 49);
        let after = before + Duration::from_millis(100);
        assert_eq!(after.as_millis(), 50);
        assert_eq!(after.duration_since(before), Duration::from_millis(100));
    }

    #[test]
    fn test_wrapping_sub() {
        let t = Instant::from_millis(10);
        assert_eq!(
            t.wrapping_sub(Duration::from_millis(20)).as_millis(),
            u32::MAX - 9
        );
    }

    #[test]
    fn test_from_secs() {
        assert_eq!(Duration::from_secs(25).as_millis(), 25_000);
        assert_eq!(Duration::from_secs(u32::MAX).as_millis(), u32::MAX);
    }
}
