//! Reactions to permission, package, and user change notifications.
//!
//! Handlers never fail: stale notifications are ignored and store errors are
//! logged. Each handler re-checks live state instead of trusting its payload,
//! so racing notifications converge on the current truth.

use tracing::{debug, info};

use granttime_core::{AppName, Uid, UserId};
use granttime_store::Slot;

use crate::error::Result;
use crate::manager::FirstGrantTimeManager;
use crate::notifier::FollowUp;

impl FirstGrantTimeManager {
    /// The tracked permissions of `uid` changed.
    pub fn on_permissions_changed(&self, uid: Uid) {
        let apps = self.resolver.app_names_for_uid(uid);
        if apps.is_empty() {
            debug!(%uid, "permission change for uid with no installed apps; ignoring");
            return;
        }
        let user = uid.user();

        let follow_up = {
            let mut inner = self.write_inner();
            self.ensure_reconciled(&mut inner, user);

            if !apps
                .iter()
                .any(|app| self.resolver.supports_usage_disclosure(app, user))
            {
                debug!(%uid, "no app under uid supports usage disclosure; ignoring");
                return;
            }

            let had = inner.cache.contains(uid);
            let has_now = self.is_eligible(uid, user);

            match (had, has_now) {
                (true, false) => {
                    inner.cache.remove(uid);
                    self.persist_current(&inner, user);
                    info!(%uid, %user, "tracked permission revoked; grant time dropped");
                    Some(FollowUp::RemoveFromPriorityList { apps, user })
                }
                (false, true) => {
                    let staged = if self.config.adopt_staged_on_grant {
                        self.merge_staged_for_uid(&mut inner, uid, user)
                    } else {
                        None
                    };
                    let time = match staged {
                        Some(time) => time,
                        None => {
                            let now = self.clock.now();
                            inner.cache.put(uid, now);
                            now
                        }
                    };
                    self.persist_current(&inner, user);
                    info!(%uid, %user, %time, from_backup = staged.is_some(), "tracked permission granted");
                    None
                }
                _ => Some(FollowUp::ResyncPriorityList { apps, user }),
            }
        };

        if let Some(follow_up) = follow_up {
            self.dispatch(follow_up);
        }
    }

    /// `app` was uninstalled from `uid`.
    pub fn on_package_removed(&self, app: &AppName, uid: Uid, user: UserId) {
        if uid.user() != user {
            debug!(%app, %uid, %user, "package removal for a uid of another user; ignoring");
            return;
        }
        let still_installed = !self.resolver.app_names_for_uid(uid).is_empty();

        let mut inner = self.write_inner();
        self.ensure_reconciled(&mut inner, user);

        if still_installed && (!inner.cache.contains(uid) || self.is_eligible(uid, user)) {
            debug!(%app, %uid, "uid still carries eligible apps; keeping grant time");
            return;
        }

        if inner.cache.remove(uid).is_some() {
            self.persist_current(&inner, user);
            info!(%app, %uid, %user, "package removed; grant time dropped");
        }
    }

    /// `user` was removed; forget and delete everything recorded for it.
    pub fn on_user_removed(&self, user: UserId) -> Result<()> {
        let mut inner = self.write_inner();
        inner.visited.remove(&user);
        let dropped = inner.cache.clear_user(user);

        for slot in Slot::ALL {
            self.store.delete(user, slot)?;
        }

        info!(%user, dropped, "user removed; grant times deleted");
        Ok(())
    }
}
