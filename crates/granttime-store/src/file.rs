//! JSON file implementation of the DurableStore trait.
//!
//! This is the primary storage backend. Each `(user, slot)` record is one
//! JSON file. Writes go to a temp file in the same directory, are fsynced,
//! and are then renamed over the record, so a crash mid-write leaves either
//! the old record or the new one, never a torn file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use granttime_core::{GrantTimeState, UserId};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::traits::{DurableStore, Slot};

/// File-backed store.
#[derive(Debug, Clone)]
pub struct FileStore {
    config: StoreConfig,
}

impl FileStore {
    /// Create a store using the given layout. Directories are created lazily
    /// on first write.
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// Create a store with default file names under `root`.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self::new(StoreConfig::new(root))
    }

    /// The layout this store uses.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl DurableStore for FileStore {
    fn read(&self, user: UserId, slot: Slot) -> Result<Option<GrantTimeState>> {
        let path = self.config.record_path(user, slot);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state: GrantTimeState = serde_json::from_slice(&bytes)?;
        Ok(Some(state))
    }

    fn write(&self, user: UserId, slot: Slot, state: &GrantTimeState) -> Result<()> {
        let path = self.config.record_path(user, slot);
        let dir = self.config.user_dir(user);
        fs::create_dir_all(&dir)?;

        let bytes = serde_json::to_vec_pretty(state)?;
        replace_atomically(&dir, &path, &bytes)?;

        debug!(%user, %slot, entries = state.len(), path = %path.display(), "grant time record written");
        Ok(())
    }

    fn delete(&self, user: UserId, slot: Slot) -> Result<()> {
        match fs::remove_file(self.config.record_path(user, slot)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn locate(&self, user: UserId, slot: Slot) -> PathBuf {
        self.config.record_path(user, slot)
    }
}

/// Write `bytes` to a temp file in `dir`, fsync it, then rename it over `path`.
fn replace_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| StoreError::Replace {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    Ok(())
}
