//! # Granttime Core
//!
//! Pure primitives for first grant time tracking: identities, the versioned
//! grant time state, and its persisted record layout.
//!
//! This crate contains no I/O, no locking, no storage. It is pure computation
//! over the data model shared by the store and the manager, plus the
//! resolver trait through which the platform is consulted.
//!
//! ## Key Types
//!
//! - [`UserId`] - An operating-system user
//! - [`Uid`] - A numeric OS identity; encodes its owning user
//! - [`AppName`] / [`SharedGroupName`] - The two ways a grant time is keyed
//! - [`GrantTimeState`] - Versioned snapshot of one user's grant times
//! - [`Clock`] - Source of "now" for new grant times
//! - [`IdentityResolver`] - Platform view of installed apps and their uids
//!
//! ## Record Layout
//!
//! States are persisted and transferred as a [`GrantTimeRecord`]: a schema
//! version plus two name-keyed lists of RFC 3339 instants. See [`record`].

pub mod clock;
pub mod error;
pub mod record;
pub mod resolver;
pub mod state;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use error::{CoreError, Result};
pub use record::{GrantEntry, GrantTimeRecord};
pub use resolver::{AppDescriptor, IdentityResolver};
pub use state::{GrantTimeState, CURRENT_VERSION};
pub use types::{AppName, GrantTime, SharedGroupName, Uid, UserId, PER_USER_RANGE};
