//! Snapshot encoding and shape validation.
//!
//! The snapshot is a versioned JSON document mapping channel keys to turn
//! lists. Decoding rejects anything that does not have exactly that shape.

use std::collections::BTreeMap;

use chatrelay_types::chat::Turn;
use chatrelay_types::error::PersistError;
use chatrelay_types::snapshot::{SnapshotFile, SNAPSHOT_VERSION};

/// Serialize channel histories into snapshot bytes.
pub fn encode(channels: BTreeMap<String, Vec<Turn>>) -> Result<Vec<u8>, PersistError> {
    serde_json::to_vec_pretty(&SnapshotFile::new(channels))
        .map_err(|e| PersistError::Encode(e.to_string()))
}

/// Parse snapshot bytes back into channel histories.
///
/// An empty (or whitespace-only) file decodes to no channels. Clamping to
/// the history bound is left to the caller.
pub fn decode(bytes: &[u8]) -> Result<BTreeMap<String, Vec<Turn>>, PersistError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(BTreeMap::new());
    }

    let file: SnapshotFile =
        serde_json::from_slice(bytes).map_err(|e| PersistError::Decode(e.to_string()))?;

    if file.version != SNAPSHOT_VERSION {
        return Err(PersistError::UnsupportedVersion {
            found: file.version,
            expected: SNAPSHOT_VERSION,
        });
    }

    Ok(file.channels)
}
