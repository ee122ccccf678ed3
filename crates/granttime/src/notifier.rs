//! Best-effort follow-ups to the dependent priority list.
//!
//! After a grant time mutation, the app's position in an external priority
//! list may need updating. That work is dispatched outside the manager's lock
//! through a [`FollowUpExecutor`]; it may fail or panic without affecting the
//! mutation that triggered it.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tracing::{debug, warn};

use granttime_core::{AppName, UserId};

/// The external priority list that mirrors which apps may contribute data.
pub trait PriorityNotifier: Send + Sync {
    /// Drop `app` from the priority list if it no longer qualifies.
    fn remove_app_from_priority_list(&self, app: &AppName, user: UserId) -> anyhow::Result<()>;

    /// Re-check the priority list entries of `apps`.
    fn resync_priority_list(&self, apps: &[AppName], user: UserId) -> anyhow::Result<()>;
}

/// Notifier for deployments without a priority list.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl PriorityNotifier for NoopNotifier {
    fn remove_app_from_priority_list(&self, _app: &AppName, _user: UserId) -> anyhow::Result<()> {
        Ok(())
    }

    fn resync_priority_list(&self, _apps: &[AppName], _user: UserId) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A follow-up produced by a permission change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    /// The uid lost its grant; remove its apps from the priority list.
    RemoveFromPriorityList { apps: Vec<AppName>, user: UserId },

    /// Nothing changed for the uid; re-sync its apps anyway.
    ResyncPriorityList { apps: Vec<AppName>, user: UserId },
}

impl FollowUp {
    /// Deliver this follow-up. Failures are logged per app, never returned.
    pub fn deliver(&self, notifier: &dyn PriorityNotifier) {
        match self {
            FollowUp::RemoveFromPriorityList { apps, user } => {
                for app in apps {
                    if let Err(e) = notifier.remove_app_from_priority_list(app, *user) {
                        warn!(%app, %user, error = %format_args!("{e:#}"), "failed to remove app from priority list");
                    }
                }
            }
            FollowUp::ResyncPriorityList { apps, user } => {
                if let Err(e) = notifier.resync_priority_list(apps, *user) {
                    warn!(?apps, %user, error = %format_args!("{e:#}"), "failed to re-sync priority list");
                }
            }
        }
    }
}

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs follow-up jobs outside the manager's lock.
pub trait FollowUpExecutor: Send + Sync {
    /// Run `job`, now or later.
    fn execute(&self, job: Job);
}

/// Runs jobs on the calling thread, after the lock has been released.
///
/// Deterministic; intended for tests and single-threaded embedders.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl FollowUpExecutor for InlineExecutor {
    fn execute(&self, job: Job) {
        run_guarded(job);
    }
}

/// Runs each job on a fresh, detached thread.
#[derive(Debug, Clone)]
pub struct ThreadExecutor {
    thread_name: String,
}

impl ThreadExecutor {
    /// Executor whose threads carry `thread_name`.
    pub fn new(thread_name: impl Into<String>) -> Self {
        Self {
            thread_name: thread_name.into(),
        }
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new("granttime-follow-up")
    }
}

impl FollowUpExecutor for ThreadExecutor {
    fn execute(&self, job: Job) {
        let spawned = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || run_guarded(job));

        if let Err(e) = spawned {
            warn!(error = %e, "failed to spawn follow-up thread; follow-up dropped");
        }
    }
}

/// Runs jobs on a tokio runtime's blocking pool.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioExecutor {
    /// Executor bound to `handle`.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Executor bound to the runtime of the calling context, if there is one.
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl FollowUpExecutor for TokioExecutor {
    fn execute(&self, job: Job) {
        // The JoinHandle is dropped: follow-ups are fire-and-forget.
        let _ = self.handle.spawn_blocking(move || run_guarded(job));
    }
}

fn run_guarded(job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        warn!("follow-up job panicked");
    } else {
        debug!("follow-up job finished");
    }
}
