//! # Attribute Resolver
//!
//! Resolves a joystick device node to the link-layer address of the physical
//! controller behind it.
//!
//! This module handles:
//! - Querying hardware attributes of a device node with `udevadm info -a`
//! - Extracting a `XX:XX:XX:XX:XX:XX` address from the attribute dump
//! - Rejecting motion sensor devices that carry the controller's address
//!
//! Resolution is best-effort: every failure is logged and reported as "not found".

pub mod udevadm;

use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::identity::HardwareIdentity;

pub use udevadm::UdevadmQuery;

/// Text marking a motion/orientation sensor in the attribute dump
const MOTION_SENSOR_MARKER: &str = "motion sensors";

/// Attribute key carrying the device's own address; `phys` carries the host adapter's
const UNIQ_ATTRIBUTE: &str = "{uniq}";

/// Produces descriptive text about a device's hardware chain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttributeQuery: Send + Sync {
    /// Query attributes of the device at `path`.
    ///
    /// Returns `None` if the query fails or produces no output.
    async fn query(&self, path: &Path) -> Option<String>;
}

/// Resolves device paths to hardware identities.
pub struct AttributeResolver {
    query: Box<dyn AttributeQuery>,
}

impl AttributeResolver {
    /// Create a resolver on top of an attribute query.
    pub fn new(query: impl AttributeQuery + 'static) -> Self {
        Self {
            query: Box::new(query),
        }
    }

    /// Resolve the hardware identity of the device at `path`.
    ///
    /// Returns `None` when the query fails, no address is present, or the
    /// device is a motion sensor.
    pub async fn resolve(&self, path: &Path) -> Option<HardwareIdentity> {
        let Some(output) = self.query.query(path).await else {
            warn!("No attributes for {}, skipping", path.display());
            return None;
        };

        match parse_identity(&output) {
            Some(identity) => {
                debug!("Resolved {} to {}", path.display(), identity);
                Some(identity)
            }
            None => {
                warn!("Could not resolve a controller address for {}", path.display());
                None
            }
        }
    }
}

fn address_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b(?:[0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}\b").ok())
        .as_ref()
}

/// Is this attribute dump describing a motion sensor rather than a controller?
#[must_use]
pub fn is_motion_sensor(output: &str) -> bool {
    output.to_ascii_lowercase().contains(MOTION_SENSOR_MARKER)
}

/// Extract a hardware identity from an attribute dump.
///
/// A `uniq` attribute holding an address wins; otherwise the first address in
/// the output is used. Motion sensors are rejected.
///
/// # Examples
///
/// ```
/// use padsleep::resolver::parse_identity;
///
/// let dump = r#"
///     ATTRS{name}=="Wireless Controller"
///     ATTRS{phys}=="00:1a:7d:da:71:13"
///     ATTRS{uniq}=="a4:ae:12:34:56:78"
/// "#;
/// assert_eq!(parse_identity(dump).unwrap().as_str(), "A4:AE:12:34:56:78");
/// ```
#[must_use]
pub fn parse_identity(output: &str) -> Option<HardwareIdentity> {
    if is_motion_sensor(output) {
        debug!("Attribute dump describes a motion sensor, rejecting");
        return None;
    }

    let pattern = address_pattern()?;

    let from_uniq = output
        .lines()
        .filter(|line| line.contains(UNIQ_ATTRIBUTE))
        .find_map(|line| pattern.find(line));

    from_uniq
        .or_else(|| pattern.find(output))
        .map(|m| HardwareIdentity::new(m.as_str()))
}
