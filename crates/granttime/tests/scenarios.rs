//! End-to-end scenarios against the public manager API.

use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::Duration;
use serde_json::json;

use granttime::store::{DurableStore, FileStore, MemoryStore, Slot, SqliteStore};
use granttime::{
    FirstGrantTimeManager, GrantTimeState, InlineExecutor, ManagerConfig, ThreadExecutor, Uid,
    UserId,
};
use granttime_testkit::{
    at, init_tracing, FakeApp, FakeResolver, FlakyStore, ManualClock, NotifierCall,
    RecordingNotifier,
};

const USER: UserId = UserId::SYSTEM;

struct Device {
    resolver: Arc<FakeResolver>,
    clock: Arc<ManualClock>,
    notifier: Arc<RecordingNotifier>,
    manager: FirstGrantTimeManager,
}

fn device(store: Arc<dyn DurableStore>) -> Device {
    init_tracing();
    let resolver = Arc::new(FakeResolver::new());
    let clock = Arc::new(ManualClock::starting_at(at(1_000)));
    let notifier = Arc::new(RecordingNotifier::new());
    let manager = FirstGrantTimeManager::new(resolver.clone(), store, ManagerConfig::default())
        .with_clock(clock.clone())
        .with_notifier(notifier.clone())
        .with_executor(Arc::new(InlineExecutor));
    Device {
        resolver,
        clock,
        notifier,
        manager,
    }
}

#[test]
fn fresh_user_reads_now_then_the_same_value() {
    let d = device(Arc::new(MemoryStore::new()));
    d.resolver.install(FakeApp::new("com.p", Uid(500)));

    let first = d.manager.first_grant_time(&"com.p".into(), USER).unwrap();
    d.clock.advance(Duration::hours(1));
    let second = d.manager.first_grant_time(&"com.p".into(), USER).unwrap();

    assert_eq!(first, Some(at(1_000)));
    assert_eq!(second, first);
}

#[test]
fn removing_the_only_package_drops_the_uid() {
    let store = Arc::new(MemoryStore::new());
    let d = device(store.clone());
    d.resolver.install(FakeApp::new("com.p", Uid(500)));
    d.manager.current_state(USER);

    d.resolver.uninstall(&"com.p".into(), USER);
    d.manager.on_package_removed(&"com.p".into(), Uid(500), USER);

    assert!(d.manager.current_state(USER).is_empty());
    assert!(store.read(USER, Slot::Current).unwrap().unwrap().is_empty());

    // Reinstalling under the same uid starts over.
    d.clock.advance(Duration::seconds(30));
    d.resolver.install(FakeApp::new("com.p", Uid(500)));
    d.manager.on_permissions_changed(Uid(500));
    assert_eq!(
        d.manager.first_grant_time(&"com.p".into(), USER).unwrap(),
        Some(at(1_030))
    );
}

#[test]
fn backup_without_overlap_leaves_live_times_and_stages_everything() {
    let source = device(Arc::new(MemoryStore::new()));
    source.resolver.install(FakeApp::new("com.a", Uid(500)));
    source.resolver.install(FakeApp::new("com.b", Uid(501)));
    let snapshot = source.manager.create_backup_snapshot(USER);

    let target_store = Arc::new(MemoryStore::new());
    let target = device(target_store.clone());
    target.clock.set(at(9_000));
    target.resolver.install(FakeApp::new("com.c", Uid(500)));
    target.resolver.install(FakeApp::new("com.d", Uid(502)));
    let before = target.manager.current_state(USER);

    let bytes = snapshot.to_bytes().unwrap();
    let adopted = target
        .manager
        .apply_and_stage_backup_bytes(USER, &bytes)
        .unwrap();

    assert_eq!(adopted, 0);
    assert_eq!(target.manager.current_state(USER), before);
    assert_eq!(target_store.read(USER, Slot::Staged).unwrap(), Some(snapshot));
}

#[test]
fn staged_time_is_adopted_on_grant_and_others_get_now() {
    let d = device(Arc::new(MemoryStore::new()));
    d.resolver.install(FakeApp::new("com.a", Uid(500)).without_permission());
    d.resolver.install(FakeApp::new("com.b", Uid(501)).without_permission());

    let mut backup = GrantTimeState::new();
    backup.set_package_grant_time("com.a".into(), at(42));
    d.manager.apply_and_stage_backup(USER, backup);

    d.clock.advance(Duration::minutes(5));
    for (app, uid) in [("com.a", Uid(500)), ("com.b", Uid(501))] {
        d.resolver.grant(&app.into(), USER);
        d.manager.on_permissions_changed(uid);
    }

    assert_eq!(d.manager.first_grant_time(&"com.a".into(), USER).unwrap(), Some(at(42)));
    assert_eq!(d.manager.first_grant_time(&"com.b".into(), USER).unwrap(), Some(at(1_300)));
}

#[test]
fn staged_group_time_reaches_apps_that_join_later() {
    let d = device(Arc::new(MemoryStore::new()));

    let mut backup = GrantTimeState::new();
    backup.set_shared_group_grant_time("shared.fit".into(), at(77));
    d.manager.apply_and_stage_backup(USER, backup);

    d.resolver.install(FakeApp::new("com.one", Uid(600)).in_group("shared.fit"));
    d.resolver.install(FakeApp::new("com.two", Uid(600)).in_group("shared.fit"));
    d.manager.on_permissions_changed(Uid(600));

    assert_eq!(d.manager.first_grant_time(&"com.one".into(), USER).unwrap(), Some(at(77)));
    assert_eq!(d.manager.first_grant_time(&"com.two".into(), USER).unwrap(), Some(at(77)));
}

#[test]
fn follow_ups_reach_the_priority_list() {
    let d = device(Arc::new(MemoryStore::new()));
    d.resolver.install(FakeApp::new("com.a", Uid(500)));

    d.manager.on_permissions_changed(Uid(500));
    d.resolver.revoke(&"com.a".into(), USER);
    d.manager.on_permissions_changed(Uid(500));

    assert_eq!(
        d.notifier.calls(),
        vec![
            NotifierCall::Resynced {
                apps: vec!["com.a".into()],
                user: USER
            },
            NotifierCall::Removed {
                app: "com.a".into(),
                user: USER
            },
        ]
    );
}

#[test]
fn failing_priority_list_does_not_roll_back() {
    let d = device(Arc::new(MemoryStore::new()));
    d.resolver.install(FakeApp::new("com.a", Uid(500)));
    d.manager.current_state(USER);
    d.notifier.set_failing(true);

    d.resolver.revoke(&"com.a".into(), USER);
    d.manager.on_permissions_changed(Uid(500));

    assert_eq!(d.notifier.calls().len(), 1);
    assert_eq!(d.manager.first_grant_time(&"com.a".into(), USER).unwrap(), None);
}

#[test]
fn thread_executor_delivers_follow_ups() {
    init_tracing();
    let resolver = Arc::new(FakeResolver::new());
    resolver.install(FakeApp::new("com.a", Uid(500)));
    let notifier = Arc::new(RecordingNotifier::new());
    let manager = FirstGrantTimeManager::new(
        resolver.clone(),
        Arc::new(MemoryStore::new()),
        ManagerConfig::default(),
    )
    .with_notifier(notifier.clone())
    .with_executor(Arc::new(ThreadExecutor::new("scenario-follow-up")));

    resolver.revoke(&"com.a".into(), USER);
    manager.current_state(USER);
    resolver.grant(&"com.a".into(), USER);
    manager.on_permissions_changed(Uid(500));
    resolver.revoke(&"com.a".into(), USER);
    manager.on_permissions_changed(Uid(500));

    let deadline = Instant::now() + StdDuration::from_secs(5);
    while notifier.calls().is_empty() && Instant::now() < deadline {
        std::thread::sleep(StdDuration::from_millis(10));
    }
    assert_eq!(
        notifier.calls(),
        vec![NotifierCall::Removed {
            app: "com.a".into(),
            user: USER
        }]
    );
}

#[test]
fn unwritable_store_never_breaks_event_handling() {
    let store = Arc::new(FlakyStore::new(MemoryStore::new()));
    let d = device(store.clone());
    d.resolver.install(FakeApp::new("com.a", Uid(500)).without_permission());
    store.fail_writes(true);

    d.resolver.grant(&"com.a".into(), USER);
    d.manager.on_permissions_changed(Uid(500));
    d.manager.apply_and_stage_backup(USER, GrantTimeState::new());

    assert_eq!(d.manager.first_grant_time(&"com.a".into(), USER).unwrap(), Some(at(1_000)));
    assert!(store.inner().read(USER, Slot::Current).unwrap().is_none());
    assert!(d.manager.on_user_removed(USER).is_err());
}

#[test]
fn users_never_see_each_other() {
    let d = device(Arc::new(MemoryStore::new()));
    let guest = UserId(10);
    d.resolver.install(FakeApp::new("com.a", Uid(500)));
    d.resolver.install(FakeApp::new("com.a", Uid::of(guest, 500)));

    d.manager
        .set_first_grant_time(&"com.a".into(), at(5), guest)
        .unwrap();

    assert_eq!(d.manager.first_grant_time(&"com.a".into(), USER).unwrap(), Some(at(1_000)));
    assert_eq!(d.manager.first_grant_time(&"com.a".into(), guest).unwrap(), Some(at(5)));

    d.manager.on_user_removed(guest).unwrap();
    assert_eq!(d.manager.first_grant_time(&"com.a".into(), USER).unwrap(), Some(at(1_000)));
}

#[test]
fn file_store_layout_and_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()));
    let d = device(store.clone());
    d.resolver.install(FakeApp::new("com.a", Uid(500)));
    d.resolver.install(FakeApp::new("com.one", Uid(600)).in_group("shared.fit"));
    d.manager.current_state(USER);

    let path = dir.path().join("0").join("first-grant-times.json");
    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(
        raw,
        json!({
            "version": 1,
            "packages": [{ "name": "com.a", "first_grant_time": "1970-01-01T00:16:40Z" }],
            "shared_groups": [{ "name": "shared.fit", "first_grant_time": "1970-01-01T00:16:40Z" }],
        })
    );

    // A new process sees the same times without rewriting anything.
    let restarted = FirstGrantTimeManager::new(
        d.resolver.clone(),
        Arc::new(FileStore::open(dir.path())),
        ManagerConfig::default(),
    )
    .with_clock(Arc::new(ManualClock::starting_at(at(50_000))));
    assert_eq!(
        restarted.first_grant_time(&"com.one".into(), USER).unwrap(),
        Some(at(1_000))
    );

    restarted.on_user_removed(USER).unwrap();
    assert!(!path.exists());
}

#[test]
fn sqlite_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("granttime.db");

    {
        let d = device(Arc::new(SqliteStore::open(&db).unwrap()));
        d.resolver.install(FakeApp::new("com.a", Uid(500)));
        d.manager
            .set_first_grant_time(&"com.a".into(), at(123), USER)
            .unwrap();
    }

    let d = device(Arc::new(SqliteStore::open(&db).unwrap()));
    d.resolver.install(FakeApp::new("com.a", Uid(500)));
    assert_eq!(d.manager.first_grant_time(&"com.a".into(), USER).unwrap(), Some(at(123)));
}

#[test]
fn reconciliation_is_idempotent_across_restarts() {
    let store = Arc::new(MemoryStore::new());
    let d = device(store.clone());
    d.resolver.install(FakeApp::new("com.a", Uid(500)));
    d.manager.current_state(USER);

    for _ in 0..3 {
        d.manager.invalidate_user(USER);
        d.manager.current_state(USER);
    }

    assert_eq!(store.write_count(USER, Slot::Current), 1);
}
