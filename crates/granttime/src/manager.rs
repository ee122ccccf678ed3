//! The FirstGrantTimeManager: owner of the cache, the lock, and collaborators.
//!
//! One manager serves every user of the process. All cache and store
//! mutations happen under the write half of a single `RwLock`, so a reader
//! never sees the cache disagree with what was last persisted. Follow-up
//! notifications are dispatched only after the lock is released.
//!
//! The behaviour is spread over several modules that each add an `impl`
//! block: reconciliation in [`crate::reconcile`], change events in
//! [`crate::events`], and backup staging in [`crate::backup`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use granttime_core::{
    AppName, Clock, GrantTime, GrantTimeState, IdentityResolver, SystemClock, Uid, UserId,
};
use granttime_store::{DurableStore, Slot};

use crate::cache::GrantTimeCache;
use crate::config::ManagerConfig;
use crate::error::{GrantTimeError, Result};
use crate::notifier::{FollowUp, FollowUpExecutor, NoopNotifier, PriorityNotifier, ThreadExecutor};

/// State guarded by the manager's lock.
#[derive(Debug, Default)]
pub(crate) struct Inner {
    /// Grant times of every reconciled user.
    pub(crate) cache: GrantTimeCache,

    /// Users reconciled during this process lifetime.
    pub(crate) visited: HashSet<UserId>,
}

/// Tracks when each app first obtained a tracked permission.
///
/// Provides:
/// - Queries and explicit overrides of grant times
/// - Reactions to permission and package change notifications
/// - Backup snapshots and staged restore
pub struct FirstGrantTimeManager {
    pub(crate) inner: RwLock<Inner>,
    pub(crate) resolver: Arc<dyn IdentityResolver>,
    pub(crate) store: Arc<dyn DurableStore>,
    pub(crate) notifier: Arc<dyn PriorityNotifier>,
    pub(crate) executor: Arc<dyn FollowUpExecutor>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: ManagerConfig,
    migration_in_progress: AtomicBool,
}

impl FirstGrantTimeManager {
    /// Create a manager over `resolver` and `store`.
    ///
    /// Uses the wall clock, no priority list, and a thread executor; replace
    /// them with the `with_*` methods.
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        store: Arc<dyn DurableStore>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            resolver,
            store,
            notifier: Arc::new(NoopNotifier),
            executor: Arc::new(ThreadExecutor::default()),
            clock: Arc::new(SystemClock),
            config,
            migration_in_progress: AtomicBool::new(false),
        }
    }

    /// Use `notifier` for priority list follow-ups.
    pub fn with_notifier(mut self, notifier: Arc<dyn PriorityNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Run follow-ups on `executor`.
    pub fn with_executor(mut self, executor: Arc<dyn FollowUpExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Take "now" from `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// When `app` first obtained a tracked permission for `user`.
    ///
    /// Returns `Ok(None)` if the app is installed but has no grant time, and
    /// `IdentityNotFound` if it is not installed.
    pub fn first_grant_time(&self, app: &AppName, user: UserId) -> Result<Option<GrantTime>> {
        let uid = self.resolve_uid(app, user)?;
        Ok(self.with_ready_user(user, |inner| inner.cache.get(uid)))
    }

    /// Override the grant time of `app` for `user`.
    ///
    /// The cache is updated even if persisting fails; the next successful
    /// write brings the store back in line.
    pub fn set_first_grant_time(&self, app: &AppName, time: GrantTime, user: UserId) -> Result<()> {
        let uid = self.resolve_uid(app, user)?;

        let mut inner = self.write_inner();
        self.ensure_reconciled(&mut inner, user);
        inner.cache.put(uid, time);
        self.persist_current(&inner, user);

        debug!(%app, %uid, %user, %time, "first grant time set");
        Ok(())
    }

    /// The current grant times of `user` in persisted form.
    pub fn current_state(&self, user: UserId) -> GrantTimeState {
        self.with_ready_user(user, |inner| {
            inner.cache.extract_state(user, self.resolver.as_ref())
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Migration gate
    // ─────────────────────────────────────────────────────────────────────────

    /// Suppress (or re-enable) priority list follow-ups during a data migration.
    pub fn set_migration_in_progress(&self, in_progress: bool) {
        self.migration_in_progress
            .store(in_progress, Ordering::SeqCst);
    }

    /// Whether a data migration is in progress.
    pub fn is_migration_in_progress(&self) -> bool {
        self.migration_in_progress.load(Ordering::SeqCst)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals shared by the other modules
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn read_inner(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_inner(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve_uid(&self, app: &AppName, user: UserId) -> Result<Uid> {
        self.resolver
            .uid_for_app(app, user)
            .ok_or_else(|| GrantTimeError::IdentityNotFound {
                app: app.clone(),
                user,
            })
    }

    /// Run `query` against `user`'s reconciled state.
    ///
    /// `query` runs under the same guard that observed the user as
    /// reconciled, so a concurrent invalidation cannot slip in between.
    pub(crate) fn with_ready_user<T>(&self, user: UserId, query: impl FnOnce(&Inner) -> T) -> T {
        {
            let inner = self.read_inner();
            if inner.visited.contains(&user) {
                return query(&inner);
            }
        }
        let mut inner = self.write_inner();
        self.ensure_reconciled(&mut inner, user);
        query(&inner)
    }

    /// Persist `user`'s cached entries to the current slot.
    pub(crate) fn persist_current(&self, inner: &Inner, user: UserId) -> bool {
        let state = inner.cache.extract_state(user, self.resolver.as_ref());
        self.write_slot(user, Slot::Current, &state)
    }

    /// Write a slot, logging instead of failing.
    pub(crate) fn write_slot(&self, user: UserId, slot: Slot, state: &GrantTimeState) -> bool {
        match self.store.write(user, slot, state) {
            Ok(()) => true,
            Err(e) => {
                let path = self.store.locate(user, slot);
                warn!(
                    %user,
                    %slot,
                    path = %path.display(),
                    error = %e,
                    "failed to write grant time record; cache stays authoritative"
                );
                false
            }
        }
    }

    /// Read a slot, treating an unreadable record as absent.
    pub(crate) fn read_slot(&self, user: UserId, slot: Slot) -> Option<GrantTimeState> {
        match self.store.read(user, slot) {
            Ok(state) => state,
            Err(e) => {
                let path = self.store.locate(user, slot);
                warn!(
                    %user,
                    %slot,
                    path = %path.display(),
                    error = %e,
                    "grant time record unreadable; treating as empty"
                );
                None
            }
        }
    }

    /// Hand a follow-up to the executor unless follow-ups are suppressed.
    ///
    /// Must be called without holding the lock.
    pub(crate) fn dispatch(&self, follow_up: FollowUp) {
        if !self.config.sync_priority_list {
            return;
        }
        if self.is_migration_in_progress() {
            debug!(?follow_up, "migration in progress; follow-up skipped");
            return;
        }

        let notifier = Arc::clone(&self.notifier);
        self.executor
            .execute(Box::new(move || follow_up.deliver(notifier.as_ref())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use granttime_store::MemoryStore;
    use granttime_testkit::{FakeApp, FakeResolver, FlakyStore, ManualClock};

    fn at(secs: i64) -> GrantTime {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn manager(resolver: &Arc<FakeResolver>, store: Arc<dyn DurableStore>) -> FirstGrantTimeManager {
        FirstGrantTimeManager::new(resolver.clone(), store, ManagerConfig::default())
            .with_clock(Arc::new(ManualClock::starting_at(at(1_000))))
    }

    #[test]
    fn test_unknown_app_is_identity_not_found() {
        let resolver = Arc::new(FakeResolver::new());
        let manager = manager(&resolver, Arc::new(MemoryStore::new()));

        let err = manager
            .first_grant_time(&"com.missing".into(), UserId(0))
            .unwrap_err();
        assert!(matches!(err, GrantTimeError::IdentityNotFound { .. }));

        let err = manager
            .set_first_grant_time(&"com.missing".into(), at(5), UserId(0))
            .unwrap_err();
        assert!(matches!(err, GrantTimeError::IdentityNotFound { .. }));
    }

    #[test]
    fn test_installed_app_without_grant_has_no_time() {
        let resolver = Arc::new(FakeResolver::new());
        resolver.install(FakeApp::new("com.a", Uid(500)).without_permission());
        let manager = manager(&resolver, Arc::new(MemoryStore::new()));

        assert_eq!(manager.first_grant_time(&"com.a".into(), UserId(0)).unwrap(), None);
    }

    #[test]
    fn test_set_first_grant_time_persists() {
        let resolver = Arc::new(FakeResolver::new());
        resolver.install(FakeApp::new("com.a", Uid(500)));
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&resolver, store.clone());

        manager
            .set_first_grant_time(&"com.a".into(), at(42), UserId(0))
            .unwrap();

        assert_eq!(
            manager.first_grant_time(&"com.a".into(), UserId(0)).unwrap(),
            Some(at(42))
        );
        let stored = store.read(UserId(0), Slot::Current).unwrap().unwrap();
        assert_eq!(stored.package_grant_time(&"com.a".into()), Some(at(42)));
    }

    #[test]
    fn test_unwritable_store_keeps_cache_authoritative() {
        let resolver = Arc::new(FakeResolver::new());
        resolver.install(FakeApp::new("com.a", Uid(500)));
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let manager = manager(&resolver, store.clone());

        store.fail_writes(true);
        manager
            .set_first_grant_time(&"com.a".into(), at(42), UserId(0))
            .unwrap();
        assert_eq!(
            manager.first_grant_time(&"com.a".into(), UserId(0)).unwrap(),
            Some(at(42))
        );
        assert!(store.read(UserId(0), Slot::Current).unwrap().is_none());

        // The next successful write catches the store up.
        store.fail_writes(false);
        manager
            .set_first_grant_time(&"com.a".into(), at(41), UserId(0))
            .unwrap();
        let stored = store.read(UserId(0), Slot::Current).unwrap().unwrap();
        assert_eq!(stored.package_grant_time(&"com.a".into()), Some(at(41)));
    }

    #[test]
    fn test_current_state_reflects_cache() {
        let resolver = Arc::new(FakeResolver::new());
        resolver.install(FakeApp::new("com.a", Uid(500)));
        resolver.install(FakeApp::new("com.b", Uid(600)).in_group("shared.x"));
        let manager = manager(&resolver, Arc::new(MemoryStore::new()));

        let state = manager.current_state(UserId(0));
        assert_eq!(state.package_grant_time(&"com.a".into()), Some(at(1_000)));
        assert_eq!(state.shared_group_grant_time(&"shared.x".into()), Some(at(1_000)));
    }

    #[test]
    fn test_queries_survive_concurrent_invalidation() {
        let resolver = Arc::new(FakeResolver::new());
        resolver.install(FakeApp::new("com.a", Uid(500)));
        let manager = Arc::new(manager(&resolver, Arc::new(MemoryStore::new())));
        let done = Arc::new(AtomicBool::new(false));

        let invalidator = {
            let manager = Arc::clone(&manager);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    manager.invalidate_user(UserId(0));
                }
            })
        };

        for _ in 0..2_000 {
            assert_eq!(
                manager.first_grant_time(&"com.a".into(), UserId(0)).unwrap(),
                Some(at(1_000))
            );
            assert_eq!(manager.current_state(UserId(0)).len(), 1);
        }
        done.store(true, Ordering::SeqCst);
        invalidator.join().unwrap();
    }

    #[test]
    fn test_migration_flag() {
        let resolver = Arc::new(FakeResolver::new());
        let manager = manager(&resolver, Arc::new(MemoryStore::new()));

        assert!(!manager.is_migration_in_progress());
        manager.set_migration_in_progress(true);
        assert!(manager.is_migration_in_progress());
    }
}
