//! Backup snapshots and staged restore.
//!
//! A backup carries one package entry per app name. On restore the incoming
//! state is written to the staged slot and merged into every uid the user
//! already tracks; entries for apps that are not installed yet stay staged
//! until the app is granted the permission.

use tracing::{debug, info, warn};

use granttime_core::{GrantTime, GrantTimeState, Uid, UserId};
use granttime_store::Slot;

use crate::error::Result;
use crate::manager::{FirstGrantTimeManager, Inner};

/// Result of consulting the staged state for one uid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MergeOutcome {
    /// Nothing staged under the uid's names or group.
    NoStagedTime,

    /// A staged time exists but is later than the cached one.
    Rejected,

    /// The staged time was adopted and consumed.
    Adopted(GrantTime),
}

impl FirstGrantTimeManager {
    /// Snapshot `user`'s grant times for an outbound backup.
    pub fn create_backup_snapshot(&self, user: UserId) -> GrantTimeState {
        let snapshot = self.with_ready_user(user, |inner| {
            inner
                .cache
                .extract_backup_state(user, self.resolver.as_ref())
        });

        debug!(%user, entries = snapshot.len(), "backup snapshot created");
        snapshot
    }

    /// Snapshot `user`'s grant times as backup bytes.
    pub fn create_backup_bytes(&self, user: UserId) -> Result<Vec<u8>> {
        Ok(self.create_backup_snapshot(user).to_bytes()?)
    }

    /// Stage a restored backup for `user` and merge it into tracked uids.
    ///
    /// Returns how many uids adopted a staged time.
    pub fn apply_and_stage_backup(&self, user: UserId, incoming: GrantTimeState) -> usize {
        let mut inner = self.write_inner();
        self.ensure_reconciled(&mut inner, user);

        info!(%user, entries = incoming.len(), "staging restored grant times");
        self.write_slot(user, Slot::Staged, &incoming);

        let mut staged = incoming;
        let mut adopted = 0;
        let mut rejected = 0;
        for uid in inner.cache.uids_for_user(user) {
            match self.take_staged_time(&mut inner, uid, &mut staged) {
                MergeOutcome::Adopted(_) => adopted += 1,
                MergeOutcome::Rejected => rejected += 1,
                MergeOutcome::NoStagedTime => {}
            }
        }

        if adopted > 0 {
            self.write_slot(user, Slot::Staged, &staged);
            self.persist_current(&inner, user);
        }

        info!(%user, adopted, rejected, still_staged = staged.len(), "restored grant times merged");
        adopted
    }

    /// Decode backup bytes and stage them for `user`.
    pub fn apply_and_stage_backup_bytes(&self, user: UserId, bytes: &[u8]) -> Result<usize> {
        let incoming = GrantTimeState::from_bytes(bytes)?;
        Ok(self.apply_and_stage_backup(user, incoming))
    }

    /// Adopt a staged time for a newly granted `uid`, consuming it from the
    /// staged slot.
    pub(crate) fn merge_staged_for_uid(
        &self,
        inner: &mut Inner,
        uid: Uid,
        user: UserId,
    ) -> Option<GrantTime> {
        let mut staged = self.read_slot(user, Slot::Staged)?;

        match self.take_staged_time(inner, uid, &mut staged) {
            MergeOutcome::Adopted(time) => {
                self.write_slot(user, Slot::Staged, &staged);
                Some(time)
            }
            MergeOutcome::Rejected | MergeOutcome::NoStagedTime => None,
        }
    }

    /// Look up `uid` in `staged`: package names first, then its shared group.
    fn take_staged_time(
        &self,
        inner: &mut Inner,
        uid: Uid,
        staged: &mut GrantTimeState,
    ) -> MergeOutcome {
        let apps = self.resolver.app_names_for_uid(uid);
        let group = self.resolver.shared_group_for_uid(uid);

        let staged_time = apps
            .iter()
            .find_map(|app| staged.package_grant_time(app))
            .or_else(|| {
                group
                    .as_ref()
                    .and_then(|group| staged.shared_group_grant_time(group))
            });
        let Some(staged_time) = staged_time else {
            return MergeOutcome::NoStagedTime;
        };

        if let Some(cached) = inner.cache.get(uid) {
            if cached < staged_time {
                warn!(
                    %uid,
                    cached = %cached,
                    staged = %staged_time,
                    "staged grant time is later than the live one; ignoring"
                );
                return MergeOutcome::Rejected;
            }
        }

        inner.cache.put(uid, staged_time);
        for app in &apps {
            staged.remove_package(app);
        }
        if let Some(group) = &group {
            staged.remove_shared_group(group);
        }

        debug!(%uid, time = %staged_time, "adopted staged grant time");
        MergeOutcome::Adopted(staged_time)
    }
}
