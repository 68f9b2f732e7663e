//! On-disk snapshot envelope.
//!
//! The snapshot is the serializable projection of relay state: every
//! channel's turn history. Live AI sessions are never part of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chat::Turn;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The JSON document written to the snapshot file.
///
/// Decoding is strict: a channel whose value is not a list of turn records
/// fails the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotFile {
    pub version: u32,
    pub channels: BTreeMap<String, Vec<Turn>>,
}

impl SnapshotFile {
    pub fn new(channels: BTreeMap<String, Vec<Turn>>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_rejects_non_list_channel() {
        let json = r#"{"version":1,"channels":{"123":"oops"}}"#;
        assert!(serde_json::from_str::<SnapshotFile>(json).is_err());
    }

    #[test]
    fn test_snapshot_accepts_empty_channels() {
        let json = r#"{"version":1,"channels":{}}"#;
        let parsed: SnapshotFile = serde_json::from_str(json).unwrap();
        assert!(parsed.channels.is_empty());
    }
}
