//! Identity resolution: the view of installed applications this crate consumes.
//!
//! The resolver is owned by the platform. It answers which apps run under a
//! uid, which group a uid belongs to, and which apps are currently eligible to
//! have a grant time. Implementations must be cheap and non-blocking; they are
//! called while the manager holds its lock.

use crate::types::{AppName, SharedGroupName, Uid, UserId};

/// An installed application as reported by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppDescriptor {
    /// Application name.
    pub name: AppName,

    /// Numeric identity the app runs under.
    pub uid: Uid,

    /// Shared identity group, if the uid is shared.
    pub shared_group: Option<SharedGroupName>,
}

impl AppDescriptor {
    /// An app with its own uid.
    pub fn new(name: impl Into<AppName>, uid: Uid) -> Self {
        Self {
            name: name.into(),
            uid,
            shared_group: None,
        }
    }

    /// Mark the app as a member of a shared identity group.
    pub fn in_group(mut self, group: impl Into<SharedGroupName>) -> Self {
        self.shared_group = Some(group.into());
        self
    }
}

/// Translates between numeric identities, app names, and shared groups.
pub trait IdentityResolver: Send + Sync {
    /// The uid `app` runs under for `user`, or `None` if not installed.
    fn uid_for_app(&self, app: &AppName, user: UserId) -> Option<Uid>;

    /// Every installed app running under `uid`. Empty if the uid is stale.
    fn app_names_for_uid(&self, uid: Uid) -> Vec<AppName>;

    /// The shared group of `uid`, if it is shared.
    fn shared_group_for_uid(&self, uid: Uid) -> Option<SharedGroupName>;

    /// Apps installed for `user` that currently hold at least one permission
    /// in the tracked category.
    fn apps_holding_tracked_permission(&self, user: UserId) -> Vec<AppDescriptor>;

    /// Whether `app` declares that it discloses its permission usage.
    fn supports_usage_disclosure(&self, app: &AppName, user: UserId) -> bool;
}
