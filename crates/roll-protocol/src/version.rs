//! Protocol versioning for the client-daemon handshake.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version carried on every client message and checked at handshake.
///
/// Major.minor semantics: a major bump is a breaking wire change, a
/// minor bump is additive. The daemon rejects clients whose major
/// version differs from its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
}

impl ProtocolVersion {
    /// The version this crate speaks.
    pub const CURRENT: ProtocolVersion = ProtocolVersion { major: 1, minor: 0 };

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Compatibility requires matching major versions; any minor
    /// difference is tolerated.
    pub fn is_compatible_with(&self, other: &ProtocolVersion) -> bool {
        self.major == other.major
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_difference_is_compatible() {
        let v1_0 = ProtocolVersion::new(1, 0);
        let v1_1 = ProtocolVersion::new(1, 1);
        assert!(v1_0.is_compatible_with(&v1_1));
        assert!(v1_1.is_compatible_with(&v1_0));
    }

    #[test]
    fn test_major_difference_is_rejected() {
        let v1_0 = ProtocolVersion::new(1, 0);
        let v2_0 = ProtocolVersion::new(2, 0);
        assert!(!v1_0.is_compatible_with(&v2_0));
    }

    #[test]
    fn test_display_and_wire_form_agree() {
        let v = ProtocolVersion::new(1, 2);
        assert_eq!(format!("{v}"), "1.2");

        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"major":1,"minor":2}"#);
    }

    #[test]
    fn test_default_is_current() {
        assert_eq!(ProtocolVersion::default(), ProtocolVersion::CURRENT);
    }
}
