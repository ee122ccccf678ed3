//! In-memory grant time cache.
//!
//! The cache maps each uid to its grant time and is authoritative while the
//! process runs. Entries of different users never collide because a uid
//! encodes its user. The cache does no I/O and no locking; the manager owns
//! both.

use std::collections::HashMap;

use tracing::debug;

use granttime_core::{GrantTime, GrantTimeState, IdentityResolver, Uid, UserId};

/// Map from uid to first grant time.
#[derive(Debug, Clone, Default)]
pub struct GrantTimeCache {
    times: HashMap<Uid, GrantTime>,
}

impl GrantTimeCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant time of `uid`, if recorded.
    pub fn get(&self, uid: Uid) -> Option<GrantTime> {
        self.times.get(&uid).copied()
    }

    /// Record `time` for `uid`, returning the previous time.
    pub fn put(&mut self, uid: Uid, time: GrantTime) -> Option<GrantTime> {
        self.times.insert(uid, time)
    }

    /// Forget `uid`, returning its time.
    pub fn remove(&mut self, uid: Uid) -> Option<GrantTime> {
        self.times.remove(&uid)
    }

    /// Whether `uid` has a recorded time.
    pub fn contains(&self, uid: Uid) -> bool {
        self.times.contains_key(&uid)
    }

    /// Uids of `user` that have a recorded time, in ascending order.
    pub fn uids_for_user(&self, user: UserId) -> Vec<Uid> {
        let mut uids: Vec<Uid> = self
            .times
            .keys()
            .filter(|uid| uid.user() == user)
            .copied()
            .collect();
        uids.sort_unstable();
        uids
    }

    /// Forget every entry of `user`, returning how many were dropped.
    pub fn clear_user(&mut self, user: UserId) -> usize {
        let before = self.times.len();
        self.times.retain(|uid, _| uid.user() != user);
        before - self.times.len()
    }

    /// Materialize `user`'s entries in persisted form.
    ///
    /// A shared uid is keyed by its group; any other uid by its first app
    /// name. Uids whose apps no longer resolve are skipped.
    pub fn extract_state(&self, user: UserId, resolver: &dyn IdentityResolver) -> GrantTimeState {
        let mut state = GrantTimeState::new();

        for uid in self.uids_for_user(user) {
            let time = self.times[&uid];

            if let Some(group) = resolver.shared_group_for_uid(uid) {
                state.set_shared_group_grant_time(group, time);
                continue;
            }

            match resolver.app_names_for_uid(uid).into_iter().next() {
                Some(app) => state.set_package_grant_time(app, time),
                None => debug!(%uid, %user, "skipping cached uid with no installed apps"),
            }
        }

        state
    }

    /// Materialize `user`'s entries for outbound backup.
    ///
    /// Every uid is expanded into one package entry per app name, so the
    /// backup survives the target device grouping apps differently.
    pub fn extract_backup_state(
        &self,
        user: UserId,
        resolver: &dyn IdentityResolver,
    ) -> GrantTimeState {
        let mut state = GrantTimeState::new();

        for uid in self.uids_for_user(user) {
            let time = self.times[&uid];
            for app in resolver.app_names_for_uid(uid) {
                state.set_package_grant_time(app, time);
            }
        }

        state
    }
}
