//! File layout configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use granttime_core::UserId;

use crate::traits::Slot;

/// Default file name of the current slot.
pub const DEFAULT_CURRENT_FILE: &str = "first-grant-times.json";

/// Default file name of the staged slot.
pub const DEFAULT_STAGED_FILE: &str = "first-grant-times-staged.json";

/// Where a [`FileStore`](crate::FileStore) keeps its records.
///
/// Records live at `<root>/<user>/<file name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one subdirectory per user.
    pub root: PathBuf,

    /// File name of the current slot.
    #[serde(default = "default_current_file")]
    pub current_file_name: String,

    /// File name of the staged slot.
    #[serde(default = "default_staged_file")]
    pub staged_file_name: String,
}

impl StoreConfig {
    /// Configuration with default file names under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            current_file_name: default_current_file(),
            staged_file_name: default_staged_file(),
        }
    }

    /// Directory holding `user`'s records.
    pub fn user_dir(&self, user: UserId) -> PathBuf {
        self.root.join(user.to_string())
    }

    /// Full path of the record for `(user, slot)`.
    pub fn record_path(&self, user: UserId, slot: Slot) -> PathBuf {
        self.user_dir(user).join(self.file_name(slot))
    }

    /// The configured file name for `slot`.
    pub fn file_name(&self, slot: Slot) -> &str {
        match slot {
            Slot::Current => &self.current_file_name,
            Slot::Staged => &self.staged_file_name,
        }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn default_current_file() -> String {
    DEFAULT_CURRENT_FILE.to_owned()
}

fn default_staged_file() -> String {
    DEFAULT_STAGED_FILE.to_owned()
}
