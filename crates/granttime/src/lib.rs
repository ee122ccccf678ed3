//! # Grant Time
//!
//! Tracks the instant each application first obtained a permission in a
//! tracked category, per user, and keeps that record correct across
//! installs, uninstalls, permission changes, and backup restores.
//!
//! ## Overview
//!
//! - **Cache**: uid to grant time, authoritative while the process runs
//! - **Store**: per-user current and staged slots, replaced atomically
//! - **Reconciliation**: lazily aligns persisted state with installed apps
//! - **Events**: permission changes, package and user removal, backup arrival
//!
//! ## Key Concepts
//!
//! - **Grant time**: never moves later once recorded.
//! - **Shared group**: apps under one shared uid share a single grant time.
//! - **Staged data**: restored backup entries waiting for their app to be
//!   granted.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use granttime::store::FileStore;
//! use granttime::{AppName, FirstGrantTimeManager, IdentityResolver, ManagerConfig, UserId};
//!
//! fn example(resolver: Arc<dyn IdentityResolver>) {
//!     let store = Arc::new(FileStore::open("/var/lib/granttime"));
//!     let manager = FirstGrantTimeManager::new(resolver, store, ManagerConfig::default());
//!
//!     let app = AppName::from("com.example.fitness");
//!     match manager.first_grant_time(&app, UserId::SYSTEM) {
//!         Ok(Some(time)) => println!("{app} first granted at {time}"),
//!         Ok(None) => println!("{app} holds no tracked permission"),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `granttime::core` - Identities, the persisted state, and the resolver trait
//! - `granttime::store` - Durable store abstraction with file, SQLite, and memory backends

mod backup;
pub mod cache;
pub mod config;
pub mod error;
mod events;
pub mod manager;
pub mod notifier;
mod reconcile;

pub use granttime_core as core;
pub use granttime_store as store;

pub use cache::GrantTimeCache;
pub use config::ManagerConfig;
pub use error::{GrantTimeError, Result};
pub use manager::FirstGrantTimeManager;
pub use notifier::{
    FollowUp, FollowUpExecutor, InlineExecutor, Job, NoopNotifier, PriorityNotifier,
    ThreadExecutor, TokioExecutor,
};

pub use granttime_core::{
    AppDescriptor, AppName, Clock, GrantTime, GrantTimeState, IdentityResolver, SharedGroupName,
    SystemClock, Uid, UserId,
};
