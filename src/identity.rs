//! # Hardware Identity
//!
//! The link-layer address that ties a raw input stream to a wireless link.

use std::fmt;

/// Stable hardware identity of one physical wireless controller.
///
/// Stored in uppercase so that equality and hashing are case-insensitive:
/// `aa:bb:cc:dd:ee:ff` and `AA:BB:CC:DD:EE:FF` are the same controller.
///
/// # Examples
///
/// ```
/// use padsleep::identity::HardwareIdentity;
///
/// let a = HardwareIdentity::new("aa:bb:cc:dd:ee:ff");
/// let b = HardwareIdentity::new("AA:BB:CC:DD:EE:FF");
/// assert_eq!(a, b);
/// assert!(a.matches_address("Aa:bB:cc:DD:ee:FF"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HardwareIdentity(String);

impl HardwareIdentity {
    /// Create an identity from an address string, normalising case and whitespace.
    #[must_use]
    pub fn new(address: &str) -> Self {
        Self(address.trim().to_ascii_uppercase())
    }

    /// Normalised address string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against an address reported by another layer.
    #[must_use]
    pub fn matches_address(&self, address: &str) -> bool {
        self.0.eq_ignore_ascii_case(address.trim())
    }
}

impl fmt::Display for HardwareIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_is_case_insensitive() {
        let lower = HardwareIdentity::new("aa:bb:cc:dd:ee:ff");
        let upper = HardwareIdentity::new("AA:BB:CC:DD:EE:FF");
        assert_eq!(lower, upper);

        let mut set = HashSet::new();
        set.insert(lower);
        assert!(set.contains(&upper));
    }

    #[test]
    fn test_matches_wireless_address() {
        let id = HardwareIdentity::new("AA:BB:CC:DD:EE:FF");
        assert!(id.matches_address("aa:bb:cc:dd:ee:ff"));
        assert!(!id.matches_address("aa:bb:cc:dd:ee:00"));
    }

    #[test]
    fn test_display_is_normalised() {
        let id = HardwareIdentity::new(" 0a:1b:2c:3d:4e:5f\n");
        assert_eq!(id.to_string(), "0A:1B:2C:3D:4E:5F");
    }
}
