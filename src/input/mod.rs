//! # Input Module
//!
//! Raw joystick input handling.
//!
//! This module handles:
//! - Enumerating joystick device nodes under `/dev/input`
//! - Opening the evdev node behind a joystick and reading current axis/button state
//! - Snapshotting input state and detecting activity with axis hysteresis

pub mod enumerate;
pub mod evdev_source;
pub mod snapshot;

use std::path::Path;

use crate::error::Result;

pub use snapshot::InputSnapshot;

/// A handle to one controller's raw input state.
///
/// The handle is released when dropped.
pub trait InputSource: Send {
    /// Read the current axis and button state.
    fn read(&mut self) -> Result<InputSnapshot>;

    /// Joystick device path this source was opened from.
    fn path(&self) -> &Path;
}

/// Opens input sources for joystick device paths.
pub trait InputOpener: Send + Sync {
    /// Open the input source behind `joystick_path`.
    fn open(&self, joystick_path: &Path) -> Result<Box<dyn InputSource>>;
}

/// Opens joystick nodes through their evdev siblings.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvdevOpener;

impl InputOpener for EvdevOpener {
    fn open(&self, joystick_path: &Path) -> Result<Box<dyn InputSource>> {
        Ok(Box::new(evdev_source::EvdevInputSource::open(joystick_path)?))
    }
}
