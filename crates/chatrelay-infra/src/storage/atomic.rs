//! Crash-safe snapshot file.
//!
//! The payload is staged in a temporary file beside the target, flushed to
//! stable storage, then renamed over the target. A crash at any point leaves
//! either the old file or the new one at the target path, never a partial
//! write.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chatrelay_core::persist::SnapshotStore;
use chatrelay_types::error::PersistError;
use tempfile::NamedTempFile;

/// Atomically replace `path` with `bytes`, creating parent directories.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let staged = stage(path, bytes)?;
    staged.persist(path).map_err(|e| e.error)?;
    sync_parent(path);
    Ok(())
}

/// Write `bytes` to a synced temporary file in `path`'s directory.
fn stage(path: &Path, bytes: &[u8]) -> io::Result<NamedTempFile> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir)?;

    let prefix = format!(
        ".{}.",
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string())
    );
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Flush the rename itself. Not every platform can open a directory, so
/// failure here only gets a debug line.
fn sync_parent(path: &Path) {
    if let Err(e) = File::open(parent_dir(path)).and_then(|dir| dir.sync_all()) {
        tracing::debug!(path = %path.display(), error = %e, "directory sync skipped");
    }
}

/// [`SnapshotStore`] backed by a single file on local disk.
#[derive(Debug, Clone)]
pub struct AtomicFileStore {
    path: PathBuf,
}

impl AtomicFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for AtomicFileStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn read(&self) -> Result<Option<Vec<u8>>, PersistError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, bytes: Vec<u8>) -> Result<(), PersistError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || atomic_write(&path, &bytes))
            .await
            .map_err(|e| PersistError::Join(e.to_string()))??;
        Ok(())
    }
}
