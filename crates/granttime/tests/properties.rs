//! Property tests over random event sequences, plus a concurrency check.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::Duration;
use proptest::prelude::*;

use granttime::store::MemoryStore;
use granttime::{
    AppName, FirstGrantTimeManager, GrantTime, GrantTimeState, IdentityResolver, InlineExecutor,
    ManagerConfig, Uid, UserId,
};
use granttime_testkit::generators::{app_event, grant_time, AppEvent};
use granttime_testkit::{at, init_tracing, FakeApp, FakeResolver, ManualClock};

const USER: UserId = UserId::SYSTEM;

/// Two standalone apps and two apps sharing uid 600.
fn population() -> Vec<FakeApp> {
    vec![
        FakeApp::new("com.alpha", Uid(500)),
        FakeApp::new("com.beta", Uid(501)),
        FakeApp::new("com.gamma", Uid(600)).in_group("shared.pair"),
        FakeApp::new("com.delta", Uid(600)).in_group("shared.pair"),
    ]
}

struct Harness {
    apps: Vec<FakeApp>,
    resolver: Arc<FakeResolver>,
    clock: Arc<ManualClock>,
    manager: FirstGrantTimeManager,
}

impl Harness {
    fn new() -> Self {
        init_tracing();
        let apps = population();
        let resolver = Arc::new(FakeResolver::new());
        for app in &apps {
            resolver.install(app.clone());
        }
        let clock = Arc::new(ManualClock::starting_at(at(1_000)));
        let manager = FirstGrantTimeManager::new(
            resolver.clone(),
            Arc::new(MemoryStore::new()),
            ManagerConfig::default(),
        )
        .with_clock(clock.clone())
        .with_executor(Arc::new(InlineExecutor));

        Self {
            apps,
            resolver,
            clock,
            manager,
        }
    }

    fn installed(&self, index: usize) -> bool {
        let app = &self.apps[index];
        self.resolver.uid_for_app(&app.name, USER).is_some()
    }

    fn apply(&self, event: AppEvent) {
        match event {
            AppEvent::Tick(secs) => self.clock.advance(Duration::seconds(secs)),
            AppEvent::Grant(i) | AppEvent::Revoke(i) if self.installed(i) => {
                let app = &self.apps[i];
                if matches!(event, AppEvent::Grant(_)) {
                    self.resolver.grant(&app.name, USER);
                } else {
                    self.resolver.revoke(&app.name, USER);
                }
                self.manager.on_permissions_changed(app.uid);
            }
            AppEvent::Uninstall(i) if self.installed(i) => {
                let app = &self.apps[i];
                self.resolver.uninstall(&app.name, USER);
                self.manager.on_package_removed(&app.name, app.uid, USER);
            }
            AppEvent::Reinstall(i) if !self.installed(i) => {
                let app = &self.apps[i];
                self.resolver.install(app.clone());
                self.manager.on_permissions_changed(app.uid);
            }
            _ => {}
        }
    }

    /// Grant time per installed app, as the manager reports it.
    fn observed(&self) -> BTreeMap<AppName, Option<GrantTime>> {
        self.resolver
            .installed(USER)
            .into_iter()
            .map(|app| {
                let time = self.manager.first_grant_time(&app.name, USER).unwrap();
                (app.name, time)
            })
            .collect()
    }

    /// Whether any installed app under `uid` holds the permission.
    fn uid_eligible(&self, uid: Uid) -> bool {
        self.resolver
            .installed(USER)
            .iter()
            .any(|app| app.uid == uid && app.holds_permission)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn tracked_uids_match_eligible_apps(events in prop::collection::vec(app_event(4), 1..40)) {
        let h = Harness::new();

        for event in events {
            h.apply(event);

            for app in h.resolver.installed(USER) {
                let time = h.manager.first_grant_time(&app.name, USER).unwrap();
                prop_assert_eq!(time.is_some(), h.uid_eligible(app.uid), "{} after {:?}", app.name, event);
            }
        }
    }

    #[test]
    fn grant_times_never_move_later(events in prop::collection::vec(app_event(4), 1..40)) {
        let h = Harness::new();
        let mut previous = h.observed();

        for event in events {
            h.apply(event);
            let current = h.observed();

            for (app, time) in &current {
                if let (Some(Some(before)), Some(after)) = (previous.get(app), time) {
                    prop_assert!(after <= before, "{} moved from {} to {}", app, before, after);
                }
            }
            previous = current;
        }
    }

    #[test]
    fn restoring_a_backup_never_moves_times_later(
        packages in prop::collection::vec((0usize..4, grant_time()), 0..6),
        group in prop::option::of(grant_time()),
    ) {
        let h = Harness::new();
        let before = h.observed();

        let mut backup = GrantTimeState::new();
        for (index, time) in packages {
            backup.set_package_grant_time(h.apps[index].name.clone(), time);
        }
        if let Some(time) = group {
            backup.set_shared_group_grant_time("shared.pair".into(), time);
        }
        h.manager.apply_and_stage_backup(USER, backup);

        for (app, time) in h.observed() {
            let before = before[&app].unwrap();
            prop_assert!(time.unwrap() <= before);
        }
    }
}

#[test]
fn readers_only_see_legitimate_values() {
    init_tracing();
    let resolver = Arc::new(FakeResolver::new());
    resolver.install(FakeApp::new("com.toggle", Uid(500)));
    resolver.install(FakeApp::new("com.steady", Uid(501)));
    let clock = Arc::new(ManualClock::starting_at(at(1_000)));
    let manager = Arc::new(
        FirstGrantTimeManager::new(
            resolver.clone(),
            Arc::new(MemoryStore::new()),
            ManagerConfig::default(),
        )
        .with_clock(clock)
        .with_executor(Arc::new(InlineExecutor)),
    );
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    let toggled = manager
                        .first_grant_time(&"com.toggle".into(), USER)
                        .unwrap();
                    assert!(toggled.is_none() || toggled == Some(at(1_000)));

                    let steady = manager
                        .first_grant_time(&"com.steady".into(), USER)
                        .unwrap();
                    assert_eq!(steady, Some(at(1_000)));
                }
            })
        })
        .collect();

    for i in 0..1_000 {
        if i % 2 == 0 {
            resolver.revoke(&"com.toggle".into(), USER);
        } else {
            resolver.grant(&"com.toggle".into(), USER);
        }
        manager.on_permissions_changed(Uid(500));
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(
        manager.first_grant_time(&"com.toggle".into(), USER).unwrap(),
        Some(at(1_000))
    );
}
