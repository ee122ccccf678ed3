//! Strong type definitions for identities.
//!
//! All identifiers are newtypes to prevent mixing a user with a uid, or an
//! app name with a shared group name, at compile time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The instant an application first obtained a tracked permission.
pub type GrantTime = DateTime<Utc>;

/// Number of uids reserved for each user.
///
/// A uid is laid out as `user * PER_USER_RANGE + app_id`.
pub const PER_USER_RANGE: u32 = 100_000;

/// An operating-system user.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl UserId {
    /// The system (primary) user.
    pub const SYSTEM: Self = Self(0);

    /// Get the raw user number.
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A numeric OS identity.
///
/// Several applications may run under one uid when they belong to a shared
/// identity group.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(pub u32);

impl Uid {
    /// Build the uid of `app_id` for `user`.
    pub const fn of(user: UserId, app_id: u32) -> Self {
        Self(user.0 * PER_USER_RANGE + app_id % PER_USER_RANGE)
    }

    /// The user this uid belongs to.
    pub const fn user(&self) -> UserId {
        UserId(self.0 / PER_USER_RANGE)
    }

    /// The per-user application id.
    pub const fn app_id(&self) -> u32 {
        self.0 % PER_USER_RANGE
    }

    /// Get the raw uid.
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({})", self.0)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of an installed application.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppName(String);

impl AppName {
    /// Create an app name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppName({})", self.0)
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for AppName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Name of a shared identity group.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedGroupName(String);

impl SharedGroupName {
    /// Create a shared group name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SharedGroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedGroupName({})", self.0)
    }
}

impl fmt::Display for SharedGroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SharedGroupName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SharedGroupName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_encodes_user() {
        let uid = Uid::of(UserId(10), 123);
        assert_eq!(uid.get(), 1_000_123);
        assert_eq!(uid.user(), UserId(10));
        assert_eq!(uid.app_id(), 123);
    }

    #[test]
    fn test_system_user_uids() {
        assert_eq!(Uid(500).user(), UserId::SYSTEM);
        assert_eq!(Uid(99_999).user(), UserId::SYSTEM);
        assert_eq!(Uid(100_000).user(), UserId(1));
    }

    #[test]
    fn test_names_serialize_transparently() {
        let app = AppName::new("com.example.fitness");
        let json = serde_json::to_string(&app).unwrap();
        assert_eq!(json, "\"com.example.fitness\"");

        let group: SharedGroupName = serde_json::from_str("\"shared.health\"").unwrap();
        assert_eq!(group.as_str(), "shared.health");
    }

    #[test]
    fn test_debug_formats() {
        assert_eq!(format!("{:?}", Uid(500)), "Uid(500)");
        assert_eq!(format!("{}", AppName::from("a.b")), "a.b");
    }
}
