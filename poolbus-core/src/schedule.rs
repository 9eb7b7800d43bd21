//! Polling schedule
//!
//! Chlorinator refreshes are rate limited, and each periodic update arms a
//! pump poll that fires a fixed delay later so pump frames are not queued
//! back-to-back with the chlorinator burst.

use crate::config::BusConfig;
use crate::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PollSchedule {
    refresh_interval: Duration,
    poll_delay: Duration,
    /// `None` until the first refresh, which is always due
    last_refresh: Option<Instant>,
    pump_poll_at: Option<Instant>,
}

impl PollSchedule {
    pub fn new(config: &BusConfig) -> Self {
        Self {
            refresh_interval: Duration::from_millis(config.chlorinator.refresh_interval_ms),
            poll_delay: Duration::from_millis(config.pump.poll_delay_ms),
            last_refresh: None,
            pump_poll_at: None,
        }
    }

    /// True if more than the refresh interval has passed since the last
    /// refresh
    pub fn refresh_due(&self, now: Instant) -> bool {
        match self.last_refresh {
            None => true,
            Some(last) => now.duration_since(last) > self.refresh_interval,
        }
    }

    /// Restart the interval once a refresh is queued
    pub fn mark_refreshed(&mut self, now: Instant) {
        self.last_refresh = Some(now);
    }

    /// Schedule the pump poll one delay after `now`
    ///
    /// A poll still pending is pushed back rather than doubled.
    pub fn arm_pump_poll(&mut self, now: Instant) {
        self.pump_poll_at = Some(now + self.poll_delay);
    }

    /// Take the pump poll if its time has come
    pub fn take_pump_poll(&mut self, now: Instant) -> bool {
        // A deadline in the future wraps to more than half the counter range
        match self.pump_poll_at {
            Some(at) if now.duration_since(at) < Duration::from_millis(u32::MAX / 2) => {
                self.pump_poll_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn pump_poll_pending(&self) -> bool {
        self.pump_poll_at.is_some()
    }

    pub fn last_refresh(&self) -> Option<Instant> {
        self.last_refresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u32) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn test_first_refresh_always_due() {
        let mut schedule = PollSchedule::new(&BusConfig::default());
        assert!(schedule.refresh_due(at(0)));
        schedule.mark_refreshed(at(0));
        assert_eq!(schedule.last_refresh(), Some(at(0)));
    }

    #[test]
    fn test_refresh_rate_limited() {
        let mut schedule = PollSchedule::new(&BusConfig::default());
        schedule.mark_refreshed(at(1_000));
        assert!(!schedule.refresh_due(at(26_000)));
        assert!(schedule.refresh_due(at(26_001)));
        schedule.mark_refreshed(at(26_001));
        assert!(!schedule.refresh_due(at(30_000)));
    }

    #[test]
    fn test_due_check_does_not_claim() {
        let mut schedule = PollSchedule::new(&BusConfig::default());
        assert!(schedule.refresh_due(at(0)));
        assert!(schedule.refresh_due(at(10)));
        assert_eq!(schedule.last_refresh(), None);
        schedule.mark_refreshed(at(20_000));
        assert!(!schedule.refresh_due(at(30_000)));
        assert!(schedule.refresh_due(at(45_001)));
    }

    #[test]
    fn test_pump_poll_fires_once_after_delay() {
        let mut schedule = PollSchedule::new(&BusConfig::default());
        schedule.arm_pump_poll(at(1_000));
        assert!(!schedule.take_pump_poll(at(1_499)));
        assert!(schedule.take_pump_poll(at(1_500)));
        assert!(!schedule.take_pump_poll(at(1_600)));
        assert!(!schedule.pump_poll_pending());
    }

    #[test]
    fn test_pump_poll_across_counter_wrap() {
        let mut schedule = PollSchedule::new(&BusConfig::default());
        schedule.arm_pump_poll(at(u32::MAX - 100));
        assert!(!schedule.take_pump_poll(at(u32::MAX)));
        assert!(schedule.take_pump_poll(at(399)));
    }
}
