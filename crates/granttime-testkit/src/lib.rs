//! # Grant Time Testkit
//!
//! Testing utilities for grant time tracking.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fakes**: An in-memory identity resolver, a manual clock, a recording
//!   priority notifier, and a store wrapper that fails on demand
//! - **Generators**: Proptest strategies for names, times, states, and events
//!
//! ## Test Fixtures
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use granttime::{FirstGrantTimeManager, InlineExecutor, ManagerConfig, Uid, UserId};
//! use granttime::store::MemoryStore;
//! use granttime_testkit::{FakeApp, FakeResolver, ManualClock};
//!
//! let resolver = Arc::new(FakeResolver::new());
//! resolver.install(FakeApp::new("com.example", Uid(10_050)));
//!
//! let manager = FirstGrantTimeManager::new(resolver, Arc::new(MemoryStore::new()), ManagerConfig::default())
//!     .with_clock(Arc::new(ManualClock::default()))
//!     .with_executor(Arc::new(InlineExecutor));
//!
//! assert!(manager.first_grant_time(&"com.example".into(), UserId::SYSTEM).unwrap().is_some());
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use granttime_testkit::generators::grant_time_state;
//!
//! proptest! {
//!     #[test]
//!     fn merge_is_idempotent(state in grant_time_state(8)) {
//!         let mut merged = state.clone();
//!         prop_assert_eq!(merged.merge_earliest(&state), 0);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    at, init_tracing, FakeApp, FakeResolver, FlakyStore, ManualClock, NotifierCall,
    RecordingNotifier,
};
