//! # evdev Input Source
//!
//! Reads the current state of a joystick through its evdev node.
//!
//! A joystick node (`/dev/input/jsN`) and an event node (`/dev/input/eventM`)
//! are two handlers of the same kernel input device. The event node exposes
//! the current absolute axis values and key states through ioctls, so the
//! supervisor can poll state without consuming the event stream.
//!
//! Axis values are normalised from each axis's `[minimum, maximum]` into
//! `[0, 65536)`, independent of the controller's native resolution.

use std::path::{Path, PathBuf};

use evdev::{AbsoluteAxisType, Device, Key};
use tracing::{debug, info};

use super::enumerate::event_node_for;
use super::{InputSnapshot, InputSource};
use crate::config::{AXIS_RANGE, INPUT_DIR, SYSFS_INPUT_CLASS_DIR};
use crate::error::{PadsleepError, Result};

/// Controller input handle backed by an evdev device.
pub struct EvdevInputSource {
    device: Device,
    joystick_path: PathBuf,
    event_path: PathBuf,
    axes: Vec<AbsoluteAxisType>,
    keys: Vec<Key>,
}

impl std::fmt::Debug for EvdevInputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevInputSource")
            .field("joystick_path", &self.joystick_path)
            .field("event_path", &self.event_path)
            .field("axes", &self.axes.len())
            .field("keys", &self.keys.len())
            .finish_non_exhaustive()
    }
}

impl EvdevInputSource {
    /// Open the evdev node behind a joystick device node
    ///
    /// # Errors
    ///
    /// - `Input`: the joystick has no event handler, or the device cannot be opened
    ///   (permission denied, device gone)
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use padsleep::input::evdev_source::EvdevInputSource;
    /// use padsleep::input::InputSource;
    /// use std::path::Path;
    ///
    /// let mut source = EvdevInputSource::open(Path::new("/dev/input/js0"))?;
    /// let snapshot = source.read()?;
    /// println!("{} axes, {} buttons", snapshot.axes().len(), snapshot.buttons().len());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(joystick_path: &Path) -> Result<Self> {
        let event_path = event_node_for(
            joystick_path,
            Path::new(SYSFS_INPUT_CLASS_DIR),
            Path::new(INPUT_DIR),
        )?;

        let device = Device::open(&event_path).map_err(|e| {
            PadsleepError::Input(format!("Failed to open {}: {}", event_path.display(), e))
        })?;

        let axes: Vec<AbsoluteAxisType> = device
            .supported_absolute_axes()
            .map(|set| set.iter().collect())
            .unwrap_or_default();
        let keys: Vec<Key> = device
            .supported_keys()
            .map(|set| set.iter().collect())
            .unwrap_or_default();

        info!(
            "Opened input {} via {} ({}, {} axes, {} buttons)",
            joystick_path.display(),
            event_path.display(),
            device.name().unwrap_or("unnamed"),
            axes.len(),
            keys.len()
        );

        Ok(Self {
            device,
            joystick_path: joystick_path.to_path_buf(),
            event_path,
            axes,
            keys,
        })
    }

    /// Human-readable device name, e.g. "Wireless Controller"
    pub fn name(&self) -> Option<&str> {
        self.device.name()
    }
}

impl InputSource for EvdevInputSource {
    fn read(&mut self) -> Result<InputSnapshot> {
        let abs_state = self.device.get_abs_state().map_err(|e| {
            PadsleepError::Input(format!(
                "Failed to read axes of {}: {}",
                self.event_path.display(),
                e
            ))
        })?;
        let key_state = self.device.get_key_state().map_err(|e| {
            PadsleepError::Input(format!(
                "Failed to read buttons of {}: {}",
                self.event_path.display(),
                e
            ))
        })?;

        let axes = self
            .axes
            .iter()
            .map(|axis| {
                abs_state
                    .get(axis.0 as usize)
                    .map(|info| normalize_axis(info.value, info.minimum, info.maximum))
                    .unwrap_or(0)
            })
            .collect();
        let buttons = self.keys.iter().map(|key| key_state.contains(*key)).collect();

        Ok(InputSnapshot::new(axes, buttons))
    }

    fn path(&self) -> &Path {
        &self.joystick_path
    }
}

impl Drop for EvdevInputSource {
    fn drop(&mut self) {
        debug!("Released input {}", self.joystick_path.display());
    }
}

/// Map a raw axis value from `[minimum, maximum]` into `[0, AXIS_RANGE)`.
///
/// Degenerate ranges map to 0; out-of-range values are clamped.
#[must_use]
pub fn normalize_axis(value: i32, minimum: i32, maximum: i32) -> u32 {
    if maximum <= minimum {
        return 0;
    }

    let value = i64::from(value.clamp(minimum, maximum));
    let span = i64::from(maximum) - i64::from(minimum) + 1;
    let scaled = (value - i64::from(minimum)) * i64::from(AXIS_RANGE) / span;
    scaled.clamp(0, i64::from(AXIS_RANGE) - 1) as u32
}
