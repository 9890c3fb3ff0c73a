//! Schema updates.

use crate::version::Version;
use serde::{Deserialize, Serialize};

/// One mutation of the ledger schema, issued by the hub.
///
/// Updates are applied exactly in the order the hub returns them and are
/// never retried by the agent.
///
/// Hubs may name the version `change_id`, `version`, or send both; when both
/// are present `change_id` is the one passed to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UpdateWire")]
pub struct Update {
    /// Version this update moves the ledger to.
    pub version: Version,
    /// Statement executed by the ledger's change function.
    pub statement: String,
    /// Hub signature over the statement, verified by the ledger.
    pub signature: String,
}

impl Update {
    /// Creates a new update.
    pub fn new(
        version: impl Into<Version>,
        statement: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            statement: statement.into(),
            signature: signature.into(),
        }
    }
}

#[derive(Deserialize)]
struct UpdateWire {
    change_id: Option<Version>,
    version: Option<Version>,
    statement: String,
    #[serde(default)]
    signature: String,
}

impl TryFrom<UpdateWire> for Update {
    type Error = String;

    fn try_from(wire: UpdateWire) -> Result<Self, Self::Error> {
        let version = wire
            .change_id
            .or(wire.version)
            .ok_or("update carries neither `change_id` nor `version`")?;
        Ok(Self {
            version,
            statement: wire.statement,
            signature: wire.signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_legacy_change_id() {
        let update: Update =
            serde_json::from_str(r#"{"change_id": 4, "statement": "A", "signature": "s"}"#)
                .unwrap();
        assert_eq!(update.version, Version::new(4));
        assert_eq!(update.statement, "A");
    }

    #[test]
    fn change_id_wins_over_version() {
        let update: Update = serde_json::from_str(
            r#"{"change_id": 5, "version": 4, "statement": "A", "signature": "s"}"#,
        )
        .unwrap();
        assert_eq!(update.version, Version::new(5));
        assert_eq!(update.signature, "s");
    }

    #[test]
    fn update_without_version_rejected() {
        let err = serde_json::from_str::<Update>(r#"{"statement": "A"}"#).unwrap_err();
        assert!(err.to_string().contains("change_id"));
    }

    #[test]
    fn encodes_version_field() {
        let update = Update::new(2, "B", "sig");
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["version"], 2);
        assert_eq!(value["signature"], "sig");
    }
}
