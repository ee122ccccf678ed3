//! # Granttime Store
//!
//! Durable storage for grant time state. Every user owns two independent
//! slots: [`Slot::Current`], the authoritative record, and [`Slot::Staged`],
//! backup data waiting to be merged into live state.
//!
//! ## Overview
//!
//! The [`DurableStore`] trait treats each `(user, slot)` pair as one keyed
//! record that is always replaced whole. Only two properties are load-bearing:
//! a write is atomic (a failed write leaves the previous record intact) and a
//! read observes the last successful write.
//!
//! ## Key Types
//!
//! - [`DurableStore`] - The storage trait
//! - [`FileStore`] - One JSON record file per slot, replaced via temp file + rename
//! - [`SqliteStore`] - One SQLite database for all users, replaced per transaction
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`StoreConfig`] - File layout configuration
//!
//! ## Usage
//!
//! ```rust,no_run
//! use granttime_core::{GrantTimeState, UserId};
//! use granttime_store::{DurableStore, FileStore, Slot, StoreConfig};
//!
//! let store = FileStore::new(StoreConfig::new("/var/lib/granttime"));
//! let user = UserId(0);
//!
//! store.write(user, Slot::Current, &GrantTimeState::new()).unwrap();
//! let state = store.read(user, Slot::Current).unwrap();
//! assert!(state.is_some());
//! ```

pub mod config;
pub mod error;
pub mod file;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{DurableStore, Slot};
