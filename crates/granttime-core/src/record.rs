//! Persisted record layout for grant time state.
//!
//! A record holds a schema version and two name-keyed lists of
//! `(name, instant)` pairs: one for individually-owned identities and one for
//! shared identity groups. Instants are serialized as RFC 3339 strings.
//!
//! ```json
//! {
//!   "version": 1,
//!   "packages": [{ "name": "com.example.app", "first_grant_time": "2024-03-01T10:00:00Z" }],
//!   "shared_groups": []
//! }
//! ```
//!
//! The version field is optional on read. A record written without one
//! decodes to `version: None`; it is never coerced to zero.

use serde::{Deserialize, Serialize};

use crate::types::GrantTime;

/// One `(name, first grant time)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantEntry {
    /// App name or shared group name, depending on the list.
    pub name: String,

    /// When the identity first obtained a tracked permission.
    pub first_grant_time: GrantTime,
}

/// Wire and disk form of a [`GrantTimeState`](crate::GrantTimeState).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GrantTimeRecord {
    /// Schema version; `None` when the record carried none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,

    /// Grant times of individually-owned identities, keyed by app name.
    #[serde(default)]
    pub packages: Vec<GrantEntry>,

    /// Grant times of shared identity groups, keyed by group name.
    #[serde(default)]
    pub shared_groups: Vec<GrantEntry>,
}
