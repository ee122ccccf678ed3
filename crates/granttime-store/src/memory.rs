//! In-memory implementation of the DurableStore trait.
//!
//! This is primarily for testing. It has the same semantics as the file store
//! but keeps everything in memory, and counts writes so tests can assert on
//! how often a slot was persisted.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use granttime_core::{GrantTimeState, UserId};

use crate::error::Result;
use crate::traits::{DurableStore, Slot};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    /// Records indexed by (user, slot).
    records: HashMap<(UserId, Slot), GrantTimeState>,

    /// Successful writes per (user, slot).
    writes: HashMap<(UserId, Slot), usize>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes to `(user, slot)` so far.
    pub fn write_count(&self, user: UserId, slot: Slot) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.writes.get(&(user, slot)).copied().unwrap_or(0)
    }
}

impl DurableStore for MemoryStore {
    fn read(&self, user: UserId, slot: Slot) -> Result<Option<GrantTimeState>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.records.get(&(user, slot)).cloned())
    }

    fn write(&self, user: UserId, slot: Slot, state: &GrantTimeState) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.records.insert((user, slot), state.clone());
        *inner.writes.entry((user, slot)).or_default() += 1;
        Ok(())
    }

    fn delete(&self, user: UserId, slot: Slot) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.records.remove(&(user, slot));
        Ok(())
    }

    fn locate(&self, user: UserId, slot: Slot) -> PathBuf {
        PathBuf::from(format!("memory/{user}/{slot}"))
    }
}
