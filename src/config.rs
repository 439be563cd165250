//! # Configuration Module
//!
//! Compile-time timing constants and thresholds.
//!
//! Padsleep has no configuration file: every interval is fixed at build time.
//! The values are bundled into [`Timings`] so the supervisor and discovery loop
//! can be driven with shorter durations under test.

use std::time::Duration;

use crate::error::{PadsleepError, Result};

/// Time without detected input after which a controller is disconnected.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Interval between input polls of a supervised controller.
pub const POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Interval between discovery passes.
pub const DISCOVERY_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Size of the normalised axis value range, values lie in `[0, AXIS_RANGE)`.
pub const AXIS_RANGE: u32 = 65_536;

/// Fraction of [`AXIS_RANGE`] an axis must move to count as activity.
pub const AXIS_THRESHOLD_FRACTION: f64 = 0.25;

/// Directory holding raw input device nodes.
pub const INPUT_DIR: &str = "/dev/input";

/// File name prefix of joystick device nodes (`js0`, `js1`, ...).
pub const JOYSTICK_PREFIX: &str = "js";

/// sysfs directory describing input class devices.
pub const SYSFS_INPUT_CLASS_DIR: &str = "/sys/class/input";

/// External utility used to query hardware attributes of a device node.
pub const ATTRIBUTE_QUERY_PROGRAM: &str = "udevadm";

/// Axis hysteresis threshold in raw normalised units.
#[must_use]
pub fn axis_threshold() -> i64 {
    (f64::from(AXIS_RANGE) * AXIS_THRESHOLD_FRACTION) as i64
}

/// Timing parameters for supervisors and the discovery loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Idle timeout before a controller is disconnected
    pub idle_timeout: Duration,
    /// Input poll interval for each supervisor
    pub poll_interval: Duration,
    /// Interval between discovery passes
    pub discovery_interval: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            idle_timeout: IDLE_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            discovery_interval: DISCOVERY_INTERVAL,
        }
    }
}

impl Timings {
    /// Validate timing values
    ///
    /// # Errors
    ///
    /// Returns error if any duration is zero or the poll interval is not
    /// shorter than the idle timeout (polling would never reset the timer).
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout.is_zero() {
            return Err(PadsleepError::Config("idle_timeout must be greater than 0".to_string()));
        }

        if self.poll_interval.is_zero() {
            return Err(PadsleepError::Config("poll_interval must be greater than 0".to_string()));
        }

        if self.discovery_interval.is_zero() {
            return Err(PadsleepError::Config(
                "discovery_interval must be greater than 0".to_string(),
            ));
        }

        if self.poll_interval >= self.idle_timeout {
            return Err(PadsleepError::Config(
                "poll_interval must be shorter than idle_timeout".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let timings = Timings::default();
        assert_eq!(timings.idle_timeout, Duration::from_secs(300));
        assert_eq!(timings.poll_interval, Duration::from_secs(15));
        assert_eq!(timings.discovery_interval, Duration::from_secs(120));
        assert!(timings.validate().is_ok());
    }

    #[test]
    fn test_axis_threshold_is_quarter_range() {
        assert_eq!(axis_threshold(), 16_384);
    }

    #[test]
    fn test_zero_durations_rejected() {
        let timings = Timings {
            idle_timeout: Duration::ZERO,
            ..Timings::default()
        };
        assert!(timings.validate().is_err());

        let timings = Timings {
            poll_interval: Duration::ZERO,
            ..Timings::default()
        };
        assert!(timings.validate().is_err());

        let timings = Timings {
            discovery_interval: Duration::ZERO,
            ..Timings::default()
        };
        assert!(timings.validate().is_err());
    }

    #[test]
    fn test_poll_interval_must_be_shorter_than_timeout() {
        let timings = Timings {
            idle_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(10),
            discovery_interval: Duration::from_secs(60),
        };
        let err = timings.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval"));
    }
}
