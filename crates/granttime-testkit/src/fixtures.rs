//! Test fixtures and fakes.
//!
//! In-memory stand-ins for the collaborators a manager is built from.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, Once, RwLock};

use chrono::{Duration, TimeZone, Utc};

use granttime::PriorityNotifier;
use granttime_core::{
    AppDescriptor, AppName, Clock, GrantTime, GrantTimeState, IdentityResolver, SharedGroupName,
    Uid, UserId,
};
use granttime_store::{DurableStore, Slot, StoreError};

/// An installed app as seen by the [`FakeResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeApp {
    pub name: AppName,
    pub uid: Uid,
    pub shared_group: Option<SharedGroupName>,
    pub holds_permission: bool,
    pub supports_disclosure: bool,
}

impl FakeApp {
    /// An app that holds the tracked permission and supports disclosure.
    pub fn new(name: impl Into<AppName>, uid: Uid) -> Self {
        Self {
            name: name.into(),
            uid,
            shared_group: None,
            holds_permission: true,
            supports_disclosure: true,
        }
    }

    /// Place the app in a shared identity group.
    pub fn in_group(mut self, group: impl Into<SharedGroupName>) -> Self {
        self.shared_group = Some(group.into());
        self
    }

    /// Install the app without the tracked permission.
    pub fn without_permission(mut self) -> Self {
        self.holds_permission = false;
        self
    }

    /// Install the app without usage disclosure support.
    pub fn without_disclosure(mut self) -> Self {
        self.supports_disclosure = false;
        self
    }

    /// The user the app is installed for.
    pub fn user(&self) -> UserId {
        self.uid.user()
    }
}

/// A mutable, in-memory [`IdentityResolver`].
#[derive(Debug, Default)]
pub struct FakeResolver {
    apps: RwLock<BTreeMap<(UserId, AppName), FakeApp>>,
}

impl FakeResolver {
    /// Resolver with nothing installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or reinstall) `app` for the user its uid encodes.
    pub fn install(&self, app: FakeApp) {
        self.apps
            .write()
            .unwrap()
            .insert((app.user(), app.name.clone()), app);
    }

    /// Uninstall `app` for `user`, returning what was installed.
    pub fn uninstall(&self, app: &AppName, user: UserId) -> Option<FakeApp> {
        self.apps.write().unwrap().remove(&(user, app.clone()))
    }

    /// Give `app` the tracked permission.
    pub fn grant(&self, app: &AppName, user: UserId) {
        self.update(app, user, |app| app.holds_permission = true);
    }

    /// Take the tracked permission away from `app`.
    pub fn revoke(&self, app: &AppName, user: UserId) {
        self.update(app, user, |app| app.holds_permission = false);
    }

    /// Toggle usage disclosure support of `app`.
    pub fn set_disclosure(&self, app: &AppName, user: UserId, supported: bool) {
        self.update(app, user, |app| app.supports_disclosure = supported);
    }

    /// Snapshot of everything installed for `user`.
    pub fn installed(&self, user: UserId) -> Vec<FakeApp> {
        self.apps
            .read()
            .unwrap()
            .values()
            .filter(|app| app.user() == user)
            .cloned()
            .collect()
    }

    fn update(&self, app: &AppName, user: UserId, f: impl FnOnce(&mut FakeApp)) {
        let mut apps = self.apps.write().unwrap();
        let installed = apps
            .get_mut(&(user, app.clone()))
            .unwrap_or_else(|| panic!("{app} is not installed for user {user}"));
        f(installed);
    }
}

impl IdentityResolver for FakeResolver {
    fn uid_for_app(&self, app: &AppName, user: UserId) -> Option<Uid> {
        self.apps
            .read()
            .unwrap()
            .get(&(user, app.clone()))
            .map(|app| app.uid)
    }

    fn app_names_for_uid(&self, uid: Uid) -> Vec<AppName> {
        self.apps
            .read()
            .unwrap()
            .values()
            .filter(|app| app.uid == uid)
            .map(|app| app.name.clone())
            .collect()
    }

    fn shared_group_for_uid(&self, uid: Uid) -> Option<SharedGroupName> {
        self.apps
            .read()
            .unwrap()
            .values()
            .filter(|app| app.uid == uid)
            .find_map(|app| app.shared_group.clone())
    }

    fn apps_holding_tracked_permission(&self, user: UserId) -> Vec<AppDescriptor> {
        self.apps
            .read()
            .unwrap()
            .values()
            .filter(|app| app.user() == user && app.holds_permission)
            .map(|app| AppDescriptor {
                name: app.name.clone(),
                uid: app.uid,
                shared_group: app.shared_group.clone(),
            })
            .collect()
    }

    fn supports_usage_disclosure(&self, app: &AppName, user: UserId) -> bool {
        self.apps
            .read()
            .unwrap()
            .get(&(user, app.clone()))
            .is_some_and(|app| app.supports_disclosure)
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<GrantTime>,
}

impl ManualClock {
    /// Clock reading `now`.
    pub fn starting_at(now: GrantTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: GrantTime) {
        *self.now.lock().unwrap() = now;
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(at(1_700_000_000))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> GrantTime {
        *self.now.lock().unwrap()
    }
}

/// A priority list call seen by the [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    Removed { app: AppName, user: UserId },
    Resynced { apps: Vec<AppName>, user: UserId },
}

/// A [`PriorityNotifier`] that records every call.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<NotifierCall>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail after recording it.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<NotifierCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: NotifierCall) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("priority list unavailable");
        }
        Ok(())
    }
}

impl PriorityNotifier for RecordingNotifier {
    fn remove_app_from_priority_list(&self, app: &AppName, user: UserId) -> anyhow::Result<()> {
        self.record(NotifierCall::Removed {
            app: app.clone(),
            user,
        })
    }

    fn resync_priority_list(&self, apps: &[AppName], user: UserId) -> anyhow::Result<()> {
        self.record(NotifierCall::Resynced {
            apps: apps.to_vec(),
            user,
        })
    }
}

/// A [`DurableStore`] wrapper whose reads and writes can be made to fail.
#[derive(Debug)]
pub struct FlakyStore<S> {
    inner: S,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl<S: DurableStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make reads report a corrupt record.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make writes and deletes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The wrapped store, bypassing injected failures.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check_writable(&self) -> granttime_store::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "injected write failure",
            )));
        }
        Ok(())
    }
}

impl<S: DurableStore> DurableStore for FlakyStore<S> {
    fn read(&self, user: UserId, slot: Slot) -> granttime_store::Result<Option<GrantTimeState>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Serialization("injected read failure".into()));
        }
        self.inner.read(user, slot)
    }

    fn write(&self, user: UserId, slot: Slot, state: &GrantTimeState) -> granttime_store::Result<()> {
        self.check_writable()?;
        self.inner.write(user, slot, state)
    }

    fn delete(&self, user: UserId, slot: Slot) -> granttime_store::Result<()> {
        self.check_writable()?;
        self.inner.delete(user, slot)
    }

    fn locate(&self, user: UserId, slot: Slot) -> PathBuf {
        self.inner.locate(user, slot)
    }
}

/// The instant `secs` seconds after the Unix epoch.
pub fn at(secs: i64) -> GrantTime {
    Utc.timestamp_opt(secs, 0)
        .single()
        .expect("timestamp in range")
}

/// Route `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .try_init();
    });
}
