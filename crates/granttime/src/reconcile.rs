//! Per-user reconciliation of persisted grant times with installed apps.
//!
//! The first access to a user loads the current slot, adds entries for
//! eligible apps that lack one, drops entries for apps that are no longer
//! eligible, and fills the cache. It runs at most once per user until the
//! user is invalidated.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use granttime_core::{AppName, GrantTime, GrantTimeState, SharedGroupName, Uid, UserId, CURRENT_VERSION};
use granttime_store::Slot;

use crate::manager::{FirstGrantTimeManager, Inner};

/// Apps of one user that hold a tracked permission and support disclosure.
#[derive(Debug, Default)]
pub(crate) struct EligibleSet {
    /// Apps running under their own uid.
    pub(crate) packages: BTreeMap<AppName, Uid>,

    /// Shared groups, with the member apps and uids currently in them.
    pub(crate) groups: BTreeMap<SharedGroupName, GroupMembers>,
}

#[derive(Debug, Default)]
pub(crate) struct GroupMembers {
    pub(crate) apps: BTreeSet<AppName>,
    pub(crate) uids: BTreeSet<Uid>,
}

impl EligibleSet {
    /// Whether `uid` is covered by an eligible package or group.
    pub(crate) fn contains_uid(&self, uid: Uid) -> bool {
        self.packages.values().any(|u| *u == uid)
            || self.groups.values().any(|members| members.uids.contains(&uid))
    }
}

/// What a reconciliation pass changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ReconcileSummary {
    added: usize,
    adopted_from_members: usize,
    removed: usize,
    version_upgraded: bool,
}

impl ReconcileSummary {
    fn changed(&self) -> bool {
        self.added > 0 || self.adopted_from_members > 0 || self.removed > 0 || self.version_upgraded
    }
}

impl FirstGrantTimeManager {
    /// Reconcile `user` once, populating the cache.
    ///
    /// Must be called with the write lock held.
    pub(crate) fn ensure_reconciled(&self, inner: &mut Inner, user: UserId) {
        if inner.visited.contains(&user) {
            return;
        }

        let now = self.clock.now();
        let mut state = self
            .read_slot(user, Slot::Current)
            .unwrap_or_default();
        let eligible = self.eligible_set(user);

        let summary = reconcile_state(&mut state, &eligible, now);
        if summary.changed() {
            info!(
                %user,
                added = summary.added,
                adopted_from_members = summary.adopted_from_members,
                removed = summary.removed,
                version_upgraded = summary.version_upgraded,
                "reconciled grant times"
            );
            self.write_slot(user, Slot::Current, &state);
        } else {
            debug!(%user, entries = state.len(), "grant times already consistent");
        }

        inner.cache.clear_user(user);
        for (app, uid) in &eligible.packages {
            if let Some(time) = state.package_grant_time(app) {
                inner.cache.put(*uid, time);
            }
        }
        for (group, members) in &eligible.groups {
            if let Some(time) = state.shared_group_grant_time(group) {
                for uid in &members.uids {
                    inner.cache.put(*uid, time);
                }
            }
        }

        inner.visited.insert(user);
    }

    /// Forget everything cached for `user` so the next access reconciles again.
    pub fn invalidate_user(&self, user: UserId) {
        let mut inner = self.write_inner();
        inner.visited.remove(&user);
        let dropped = inner.cache.clear_user(user);
        debug!(%user, dropped, "user invalidated");
    }

    /// Whether `uid` currently belongs to an eligible app of `user`.
    pub(crate) fn is_eligible(&self, uid: Uid, user: UserId) -> bool {
        self.eligible_set(user).contains_uid(uid)
    }

    pub(crate) fn eligible_set(&self, user: UserId) -> EligibleSet {
        let mut eligible = EligibleSet::default();

        for app in self.resolver.apps_holding_tracked_permission(user) {
            if app.uid.user() != user {
                warn!(app = %app.name, uid = %app.uid, %user, "resolver returned an app of another user");
                continue;
            }
            if !self.resolver.supports_usage_disclosure(&app.name, user) {
                continue;
            }

            match app.shared_group {
                Some(group) => {
                    let members = eligible.groups.entry(group).or_default();
                    members.apps.insert(app.name);
                    members.uids.insert(app.uid);
                }
                None => {
                    eligible.packages.insert(app.name, app.uid);
                }
            }
        }

        eligible
    }
}

/// Bring `state` in line with `eligible`.
fn reconcile_state(state: &mut GrantTimeState, eligible: &EligibleSet, now: GrantTime) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();

    // Groups first: a new group may inherit from its members' package entries,
    // which the retain pass below then drops.
    for (group, members) in &eligible.groups {
        if state.shared_group_grant_time(group).is_some() {
            continue;
        }
        let earliest_member = members
            .apps
            .iter()
            .filter_map(|app| state.package_grant_time(app))
            .min();

        match earliest_member {
            Some(time) if time <= now => {
                state.set_shared_group_grant_time(group.clone(), time);
                summary.adopted_from_members += 1;
            }
            _ => {
                state.set_shared_group_grant_time(group.clone(), now);
                summary.added += 1;
            }
        }
    }

    for app in eligible.packages.keys() {
        if state.package_grant_time(app).is_none() {
            state.set_package_grant_time(app.clone(), now);
            summary.added += 1;
        }
    }

    let before = state.len();
    state.retain_packages(|app, _| eligible.packages.contains_key(app));
    state.retain_shared_groups(|group, _| eligible.groups.contains_key(group));
    summary.removed = before - state.len();

    match state.version() {
        Some(CURRENT_VERSION) => {}
        Some(newer) if newer > CURRENT_VERSION => {
            warn!(version = newer, current = CURRENT_VERSION, "grant time record is newer than supported; rewriting");
            state.set_version(Some(CURRENT_VERSION));
            summary.version_upgraded = true;
        }
        _ => {
            state.set_version(Some(CURRENT_VERSION));
            summary.version_upgraded = true;
        }
    }

    summary
}
