//! Controller configuration
//!
//! Polling discipline is configuration, not an implementation detail: an
//! AXI-Lite slave handles few transactions per microsecond, so status reads
//! are rate-limited by a floor that callers cannot go below by accident.

use std::time::Duration;

/// Lowest poll interval used unless the configuration lowers the floor
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default interval between status reads
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default bound on a wait for DONE
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Interval and bound for a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between status reads
    pub interval: Duration,
    /// Give up once this much time has passed
    pub timeout: Duration,
}

impl PollPolicy {
    /// Policy with the given interval and timeout
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT)
    }
}

/// Controller behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Follow the START write with a write of the configuration word alone.
    ///
    /// Harmless when the hardware already treats START as an edge, required
    /// when it latches the level.
    pub deassert_start: bool,

    /// Floor applied to every poll interval
    pub min_poll_interval: Duration,

    /// Policy used by `AcceleratorController::wait`
    pub default_wait: PollPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            deassert_start: true,
            min_poll_interval: MIN_POLL_INTERVAL,
            default_wait: PollPolicy::default(),
        }
    }
}

impl ControllerConfig {
    /// Configuration for simulated devices: no sleep floor
    #[must_use]
    pub fn unthrottled() -> Self {
        Self {
            min_poll_interval: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Apply the floor to a requested interval
    #[must_use]
    pub fn effective_interval(&self, requested: Duration) -> Duration {
        requested.max(self.min_poll_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_raises_short_intervals() {
        let cfg = ControllerConfig::default();
        assert_eq!(cfg.effective_interval(Duration::ZERO), MIN_POLL_INTERVAL);
        assert_eq!(
            cfg.effective_interval(Duration::from_millis(5)),
            Duration::from_millis(5)
        );
    }

    #[test]
    fn unthrottled_keeps_requested_interval() {
        let cfg = ControllerConfig::unthrottled();
        assert_eq!(cfg.effective_interval(Duration::ZERO), Duration::ZERO);
        assert!(cfg.deassert_start);
    }

    #[test]
    fn defaults() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_millis(1));
        assert_eq!(policy.timeout, Duration::from_secs(1));
    }
}
