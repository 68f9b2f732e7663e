//! Snapshot persistence: the storage port, the snapshot codec, and the
//! debounced save scheduler.

pub mod codec;
pub mod scheduler;

use chatrelay_types::error::PersistError;

/// Durable home of the state snapshot.
///
/// The only owner of the snapshot file is the state manager, which goes
/// through this trait. Implementations live in chatrelay-infra
/// (`AtomicFileStore`); `write` must replace the previous contents
/// atomically or not at all.
pub trait SnapshotStore: Send + Sync + 'static {
    /// Where the snapshot lives, for log messages.
    fn location(&self) -> String;

    /// Read the stored snapshot. `Ok(None)` when nothing was saved yet.
    fn read(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, PersistError>> + Send;

    /// Replace the stored snapshot with `bytes`.
    fn write(
        &self,
        bytes: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<(), PersistError>> + Send;
}
