//! Grant time state: the unit of persistence and backup transfer.
//!
//! A [`GrantTimeState`] holds one user's grant times in two maps. An identity
//! that is currently shared is keyed by its group name; every other identity
//! is keyed by its app name. A given identity lives in exactly one of the two
//! maps; keeping it that way is the caller's job, since only the caller can
//! resolve the current grouping.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::record::{GrantEntry, GrantTimeRecord};
use crate::types::{AppName, GrantTime, SharedGroupName};

/// Current schema version written by this crate.
pub const CURRENT_VERSION: u32 = 1;

/// Versioned snapshot of one user's grant times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GrantTimeRecord", into = "GrantTimeRecord")]
pub struct GrantTimeState {
    /// Schema version; `None` if the source carried no version.
    version: Option<u32>,

    /// Individually-owned identities.
    package_grant_times: BTreeMap<AppName, GrantTime>,

    /// Shared identity groups.
    shared_group_grant_times: BTreeMap<SharedGroupName, GrantTime>,
}

impl GrantTimeState {
    /// Create an empty state at the current schema version.
    pub fn new() -> Self {
        Self::with_version(Some(CURRENT_VERSION))
    }

    /// Create an empty state with an explicit (possibly absent) version.
    pub fn with_version(version: Option<u32>) -> Self {
        Self {
            version,
            package_grant_times: BTreeMap::new(),
            shared_group_grant_times: BTreeMap::new(),
        }
    }

    /// The schema version, or `None` if the state carried none.
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    /// Stamp the state with `version`.
    pub fn set_version(&mut self, version: Option<u32>) {
        self.version = version;
    }

    /// Record the grant time of an individually-owned app.
    pub fn set_package_grant_time(&mut self, app: AppName, time: GrantTime) {
        self.package_grant_times.insert(app, time);
    }

    /// Record the grant time of a shared identity group.
    pub fn set_shared_group_grant_time(&mut self, group: SharedGroupName, time: GrantTime) {
        self.shared_group_grant_times.insert(group, time);
    }

    /// Grant time recorded for an app, if any.
    pub fn package_grant_time(&self, app: &AppName) -> Option<GrantTime> {
        self.package_grant_times.get(app).copied()
    }

    /// Grant time recorded for a shared group, if any.
    pub fn shared_group_grant_time(&self, group: &SharedGroupName) -> Option<GrantTime> {
        self.shared_group_grant_times.get(group).copied()
    }

    /// Remove an app's entry, returning its time.
    pub fn remove_package(&mut self, app: &AppName) -> Option<GrantTime> {
        self.package_grant_times.remove(app)
    }

    /// Remove a shared group's entry, returning its time.
    pub fn remove_shared_group(&mut self, group: &SharedGroupName) -> Option<GrantTime> {
        self.shared_group_grant_times.remove(group)
    }

    /// Iterate app entries in name order.
    pub fn package_grant_times(&self) -> impl Iterator<Item = (&AppName, &GrantTime)> {
        self.package_grant_times.iter()
    }

    /// Iterate shared group entries in name order.
    pub fn shared_group_grant_times(
        &self,
    ) -> impl Iterator<Item = (&SharedGroupName, &GrantTime)> {
        self.shared_group_grant_times.iter()
    }

    /// Keep only the app entries for which `keep` returns true.
    pub fn retain_packages(&mut self, mut keep: impl FnMut(&AppName, &GrantTime) -> bool) {
        self.package_grant_times.retain(|app, time| keep(app, time));
    }

    /// Keep only the shared group entries for which `keep` returns true.
    pub fn retain_shared_groups(
        &mut self,
        mut keep: impl FnMut(&SharedGroupName, &GrantTime) -> bool,
    ) {
        self.shared_group_grant_times
            .retain(|group, time| keep(group, time));
    }

    /// Union with `other`, keeping the earlier time where both have a key.
    ///
    /// Returns the number of entries that were added or moved earlier.
    pub fn merge_earliest(&mut self, other: &GrantTimeState) -> usize {
        let mut changed = 0;

        for (app, time) in &other.package_grant_times {
            if keep_earliest(self.package_grant_times.entry(app.clone()), *time) {
                changed += 1;
            }
        }
        for (group, time) in &other.shared_group_grant_times {
            if keep_earliest(self.shared_group_grant_times.entry(group.clone()), *time) {
                changed += 1;
            }
        }

        changed
    }

    /// Total number of entries across both maps.
    pub fn len(&self) -> usize {
        self.package_grant_times.len() + self.shared_group_grant_times.len()
    }

    /// Whether both maps are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize to CBOR bytes for backup transfer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}

impl Default for GrantTimeState {
    fn default() -> Self {
        Self::new()
    }
}

fn keep_earliest<K: Ord>(entry: Entry<'_, K, GrantTime>, time: GrantTime) -> bool {
    match entry {
        Entry::Vacant(slot) => {
            slot.insert(time);
            true
        }
        Entry::Occupied(mut slot) if time < *slot.get() => {
            slot.insert(time);
            true
        }
        Entry::Occupied(_) => false,
    }
}

impl From<GrantTimeState> for GrantTimeRecord {
    fn from(state: GrantTimeState) -> Self {
        GrantTimeRecord {
            version: state.version,
            packages: state
                .package_grant_times
                .into_iter()
                .map(|(app, time)| GrantEntry {
                    name: app.as_str().to_owned(),
                    first_grant_time: time,
                })
                .collect(),
            shared_groups: state
                .shared_group_grant_times
                .into_iter()
                .map(|(group, time)| GrantEntry {
                    name: group.as_str().to_owned(),
                    first_grant_time: time,
                })
                .collect(),
        }
    }
}

impl TryFrom<GrantTimeRecord> for GrantTimeState {
    type Error = CoreError;

    fn try_from(record: GrantTimeRecord) -> Result<Self> {
        let mut state = GrantTimeState::with_version(record.version);

        for entry in record.packages {
            let app = AppName::new(entry.name);
            if state.package_grant_times.contains_key(&app) {
                return Err(CoreError::DuplicateEntry {
                    kind: "package",
                    name: app.as_str().to_owned(),
                });
            }
            state.package_grant_times.insert(app, entry.first_grant_time);
        }

        for entry in record.shared_groups {
            let group = SharedGroupName::new(entry.name);
            if state.shared_group_grant_times.contains_key(&group) {
                return Err(CoreError::DuplicateEntry {
                    kind: "shared group",
                    name: group.as_str().to_owned(),
                });
            }
            state
                .shared_group_grant_times
                .insert(group, entry.first_grant_time);
        }

        Ok(state)
    }
}
