//! Protocol version definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Protocol version triple.
///
/// Encoded on the wire as three big-endian `u16` values (major, minor, patch).
/// Versions order lexicographically, so `1.2.0 < 1.10.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtocolVersion {
    /// Major version. Peers with different majors never interoperate.
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Patch version
    pub patch: u16,
}

impl ProtocolVersion {
    /// Size of an encoded version in bytes.
    pub const ENCODED_LEN: usize = 6;

    /// 1.0.0
    pub const V1_0_0: ProtocolVersion = ProtocolVersion::new(1, 0, 0);
    /// 1.1.0 - Added the client type byte to the request
    pub const V1_1_0: ProtocolVersion = ProtocolVersion::new(1, 1, 0);
    /// 1.2.0 - Credentials in the request
    pub const V1_2_0: ProtocolVersion = ProtocolVersion::new(1, 2, 0);

    /// Version this crate speaks by default.
    pub const CURRENT: ProtocolVersion = ProtocolVersion::V1_2_0;

    /// Create a version from its components.
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self { major, minor, patch }
    }

    /// Convert to big-endian bytes.
    pub fn to_bytes(self) -> [u8; Self::ENCODED_LEN] {
        let [a, b] = self.major.to_be_bytes();
        let [c, d] = self.minor.to_be_bytes();
        let [e, f] = self.patch.to_be_bytes();
        [a, b, c, d, e, f]
    }

    /// Parse from big-endian bytes.
    pub fn from_bytes(bytes: [u8; Self::ENCODED_LEN]) -> Self {
        Self {
            major: u16::from_be_bytes([bytes[0], bytes[1]]),
            minor: u16::from_be_bytes([bytes[2], bytes[3]]),
            patch: u16::from_be_bytes([bytes[4], bytes[5]]),
        }
    }

    /// Check whether a peer speaking `self` can serve a client speaking `other`.
    ///
    /// Same major, and the client is not newer than the server.
    pub fn is_compatible_with(self, other: ProtocolVersion) -> bool {
        self.major == other.major && other <= self
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_bytes() {
        let v = ProtocolVersion::new(1, 2, 3);
        let bytes = v.to_bytes();
        assert_eq!(bytes, [0x00, 0x01, 0x00, 0x02, 0x00, 0x03]);
        assert_eq!(ProtocolVersion::from_bytes(bytes), v);
    }

    #[test]
    fn test_version_ordering() {
        assert!(ProtocolVersion::new(1, 10, 0) > ProtocolVersion::new(1, 2, 0));
        assert!(ProtocolVersion::new(2, 0, 0) > ProtocolVersion::new(1, 99, 99));
        assert!(ProtocolVersion::V1_2_0 > ProtocolVersion::V1_1_0);
        assert!(ProtocolVersion::V1_1_0 > ProtocolVersion::V1_0_0);
    }

    #[test]
    fn test_version_display() {
        assert_eq!(ProtocolVersion::V1_0_0.to_string(), "1.0.0");
        assert_eq!(ProtocolVersion::new(3, 14, 15).to_string(), "3.14.15");
    }

    #[test]
    fn test_compatibility() {
        let server = ProtocolVersion::V1_2_0;
        assert!(server.is_compatible_with(ProtocolVersion::V1_0_0));
        assert!(server.is_compatible_with(ProtocolVersion::V1_2_0));
        assert!(!server.is_compatible_with(ProtocolVersion::new(1, 3, 0)));
        assert!(!server.is_compatible_with(ProtocolVersion::new(2, 0, 0)));
        assert!(!ProtocolVersion::new(2, 0, 0).is_compatible_with(ProtocolVersion::V1_0_0));
    }
}
