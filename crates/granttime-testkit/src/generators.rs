//! Proptest generators for property-based testing.

use proptest::prelude::*;

use granttime_core::{AppName, GrantTime, GrantTimeState, SharedGroupName};

use crate::fixtures::at;

/// Generate an app name.
pub fn app_name() -> impl Strategy<Value = AppName> {
    "com\\.[a-z]{1,8}\\.[a-z]{1,8}".prop_map(AppName::from)
}

/// Generate a shared group name.
pub fn shared_group_name() -> impl Strategy<Value = SharedGroupName> {
    "shared\\.[a-z]{1,8}".prop_map(SharedGroupName::from)
}

/// Generate a grant time between 1970 and 2100, at second precision.
pub fn grant_time() -> impl Strategy<Value = GrantTime> {
    (0i64..4_102_444_800).prop_map(at)
}

/// Generate a state with up to `max_entries` entries per map.
pub fn grant_time_state(max_entries: usize) -> impl Strategy<Value = GrantTimeState> {
    (
        prop::collection::btree_map(app_name(), grant_time(), 0..=max_entries),
        prop::collection::btree_map(shared_group_name(), grant_time(), 0..=max_entries),
    )
        .prop_map(|(packages, groups)| {
            let mut state = GrantTimeState::new();
            for (app, time) in packages {
                state.set_package_grant_time(app, time);
            }
            for (group, time) in groups {
                state.set_shared_group_grant_time(group, time);
            }
            state
        })
}

/// A change to one app of a small, fixed population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    Grant(usize),
    Revoke(usize),
    Uninstall(usize),
    Reinstall(usize),
    Tick(i64),
}

/// Generate events against a population of `apps` apps.
pub fn app_event(apps: usize) -> impl Strategy<Value = AppEvent> {
    prop_oneof![
        (0..apps).prop_map(AppEvent::Grant),
        (0..apps).prop_map(AppEvent::Revoke),
        (0..apps).prop_map(AppEvent::Uninstall),
        (0..apps).prop_map(AppEvent::Reinstall),
        (1i64..3_600).prop_map(AppEvent::Tick),
    ]
}
