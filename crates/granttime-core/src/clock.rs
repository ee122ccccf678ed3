//! Source of "now" for newly recorded grant times.

use chrono::Utc;

use crate::types::GrantTime;

/// A source of the current instant.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> GrantTime;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> GrantTime {
        Utc::now()
    }
}
