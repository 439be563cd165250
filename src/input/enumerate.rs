//! # Device File Enumeration
//!
//! Lists joystick device nodes and maps them to their evdev siblings.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::JOYSTICK_PREFIX;
use crate::error::{PadsleepError, Result};

/// Returns `true` if `name` follows the joystick naming convention (`js<N>`).
#[must_use]
pub fn is_joystick_name(name: &str) -> bool {
    name.strip_prefix(JOYSTICK_PREFIX)
        .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

/// List joystick device nodes in `input_dir`, sorted by path.
///
/// Sorting keeps "first path wins" deduplication deterministic.
///
/// # Errors
///
/// Returns error if the directory cannot be read.
pub fn list_joysticks(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(input_dir)
        .map_err(|e| {
            PadsleepError::Input(format!("Failed to read {}: {}", input_dir.display(), e))
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .map(|name| is_joystick_name(&name.to_string_lossy()))
                .unwrap_or(false)
        })
        .collect();

    paths.sort();
    debug!("Found {} joystick node(s) in {}", paths.len(), input_dir.display());
    Ok(paths)
}

/// Find the evdev node (`eventN`) that belongs to the same input device as a joystick node.
///
/// The kernel exposes both handlers under `<sysfs_dir>/<jsN>/device/`.
///
/// # Errors
///
/// Returns error if the joystick has no sysfs entry or no event handler.
pub fn event_node_for(joystick_path: &Path, sysfs_dir: &Path, input_dir: &Path) -> Result<PathBuf> {
    let name = joystick_path
        .file_name()
        .ok_or_else(|| {
            PadsleepError::Input(format!("Invalid joystick path: {}", joystick_path.display()))
        })?;

    let device_dir = sysfs_dir.join(name).join("device");
    let mut events: Vec<String> = std::fs::read_dir(&device_dir)
        .map_err(|e| {
            PadsleepError::Input(format!("Failed to read {}: {}", device_dir.display(), e))
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with("event"))
        .collect();

    events.sort();
    events
        .into_iter()
        .next()
        .map(|event| input_dir.join(event))
        .ok_or_else(|| {
            PadsleepError::Input(format!(
                "No event device found for {}",
                joystick_path.display()
            ))
        })
}
