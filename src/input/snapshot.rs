//! # Input Snapshot
//!
//! Recorded axis and button state of one controller, and the activity rule
//! used to decide whether the idle timer should be reset.
//!
//! ## Axis Hysteresis
//!
//! Analog sticks jitter around their resting position. An axis only counts as
//! moved when its new value is at least a quarter of the full range
//! ([`axis_threshold`]) away from the recorded reference. The reference value
//! is only replaced when the axis is classified as moved, so slow drift is
//! measured against the last deliberate position.
//!
//! A recorded axis value is therefore *not* necessarily the last observed
//! reading: after sub-threshold jitter it still holds the earlier reference.
//! Buttons, by contrast, always hold the last observed state.
//!
//! ## Buttons
//!
//! Buttons use exact equality: any flip counts as activity.
//!
//! ```
//! use padsleep::input::snapshot::{axis_changed, InputSnapshot};
//!
//! assert!(!axis_changed(32_768, 40_000));
//! assert!(axis_changed(32_768, 49_152));
//!
//! let mut last = InputSnapshot::new(vec![32_768], vec![false]);
//! assert!(!last.update(&InputSnapshot::new(vec![33_000], vec![false])));
//! assert!(last.update(&InputSnapshot::new(vec![33_000], vec![true])));
//! ```

use crate::config::axis_threshold;

/// Axis and button state of a controller.
///
/// Axis values are normalised into `[0, 65536)`. A fresh reading holds raw
/// values; once folded in with [`InputSnapshot::update`] each axis holds its
/// hysteresis reference rather than the most recent reading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    axes: Vec<u32>,
    buttons: Vec<bool>,
}

impl InputSnapshot {
    /// Create a snapshot from axis values and button states, indexed by position.
    #[must_use]
    pub fn new(axes: Vec<u32>, buttons: Vec<bool>) -> Self {
        Self { axes, buttons }
    }

    /// Axis values by index.
    #[must_use]
    pub fn axes(&self) -> &[u32] {
        &self.axes
    }

    /// Button states by index.
    #[must_use]
    pub fn buttons(&self) -> &[bool] {
        &self.buttons
    }

    /// Returns `true` if the snapshot holds neither axes nor buttons.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty() && self.buttons.is_empty()
    }

    /// Fold a fresh reading into this snapshot.
    ///
    /// Returns `true` if any axis or button changed. Moved axes and flipped
    /// buttons take the new value; axes within the threshold keep their old
    /// reference. A reading with a different number of axes or buttons
    /// replaces the snapshot and counts as activity.
    pub fn update(&mut self, current: &InputSnapshot) -> bool {
        if self.axes.len() != current.axes.len() || self.buttons.len() != current.buttons.len() {
            *self = current.clone();
            return true;
        }

        let mut active = false;

        for (last, &next) in self.axes.iter_mut().zip(&current.axes) {
            if axis_changed(*last, next) {
                *last = next;
                active = true;
            }
        }

        for (last, &next) in self.buttons.iter_mut().zip(&current.buttons) {
            if button_changed(*last, next) {
                *last = next;
                active = true;
            }
        }

        active
    }
}

/// Returns `true` if `next` is at least the hysteresis threshold away from `last`.
#[must_use]
pub fn axis_changed(last: u32, next: u32) -> bool {
    (i64::from(next) - i64::from(last)).abs() >= axis_threshold()
}

/// Returns `true` if the button state flipped.
#[must_use]
pub fn button_changed(last: bool, next: bool) -> bool {
    last != next
}
