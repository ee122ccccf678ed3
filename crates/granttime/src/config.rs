//! Configuration for the grant time manager.

use serde::{Deserialize, Serialize};

/// Configuration for the [`FirstGrantTimeManager`](crate::FirstGrantTimeManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Whether to dispatch priority list follow-ups after permission changes.
    pub sync_priority_list: bool,

    /// Whether a newly granted uid looks for a staged backup time before
    /// falling back to now.
    pub adopt_staged_on_grant: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            sync_priority_list: true,
            adopt_staged_on_grant: true,
        }
    }
}
