//! Store trait: the abstract interface for grant time persistence.
//!
//! This trait keeps the manager storage-agnostic. Implementations include a
//! JSON file store (primary), SQLite, and in-memory (for tests).

use std::fmt;
use std::path::PathBuf;

use granttime_core::{GrantTimeState, UserId};

use crate::error::Result;

/// Which of a user's two records to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Authoritative live state.
    Current,
    /// Restored backup data awaiting consumption.
    Staged,
}

impl Slot {
    /// Both slots, current first.
    pub const ALL: [Slot; 2] = [Slot::Current, Slot::Staged];

    /// Stable lowercase name, used in logs and SQL rows.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Slot::Current => "current",
            Slot::Staged => "staged",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The DurableStore trait: whole-record persistence per `(user, slot)`.
///
/// # Design Notes
///
/// - **Absent is not an error**: reading a slot that was never written
///   returns `Ok(None)`.
/// - **Atomic replace**: `write` either fully replaces the record or leaves
///   the previous one untouched.
/// - **Read-after-write**: a successful `write` is visible to the next `read`.
pub trait DurableStore: Send + Sync {
    /// Read the record in `slot` for `user`.
    fn read(&self, user: UserId, slot: Slot) -> Result<Option<GrantTimeState>>;

    /// Replace the record in `slot` for `user`.
    fn write(&self, user: UserId, slot: Slot, state: &GrantTimeState) -> Result<()>;

    /// Delete the record in `slot` for `user`. Deleting an absent record is
    /// not an error.
    fn delete(&self, user: UserId, slot: Slot) -> Result<()>;

    /// Where the record for `(user, slot)` lives.
    fn locate(&self, user: UserId, slot: Slot) -> PathBuf;
}

impl<S: DurableStore + ?Sized> DurableStore for std::sync::Arc<S> {
    fn read(&self, user: UserId, slot: Slot) -> Result<Option<GrantTimeState>> {
        (**self).read(user, slot)
    }

    fn write(&self, user: UserId, slot: Slot, state: &GrantTimeState) -> Result<()> {
        (**self).write(user, slot, state)
    }

    fn delete(&self, user: UserId, slot: Slot) -> Result<()> {
        (**self).delete(user, slot)
    }

    fn locate(&self, user: UserId, slot: Slot) -> PathBuf {
        (**self).locate(user, slot)
    }
}
