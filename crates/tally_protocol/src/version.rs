//! Ledger version markers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic marker of the ledger's schema state.
///
/// Versions are only ever read from the ledger. The agent uses them to ask
/// the hub for the next updates and to stamp query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub i64);

impl Version {
    /// Creates a version from its raw value.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for Version {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<i32> for Version {
    fn from(raw: i32) -> Self {
        Self(i64::from(raw))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering() {
        assert!(Version::new(1) < Version::new(2));
        assert_eq!(Version::from(7).get(), 7);
    }

    #[test]
    fn version_is_plain_number_on_the_wire() {
        let json = serde_json::to_string(&Version::new(42)).unwrap();
        assert_eq!(json, "42");

        let parsed: Version = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, Version::new(42));
    }

    #[test]
    fn version_display() {
        assert_eq!(Version::new(3).to_string(), "v3");
    }
}
