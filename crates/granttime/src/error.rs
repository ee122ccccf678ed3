//! Error types for the grant time manager.

use granttime_core::{AppName, CoreError, UserId};
use granttime_store::StoreError;
use thiserror::Error;

/// Errors that can occur during manager operations.
///
/// Event handlers never return these; they log and carry on. Only direct
/// queries and explicit lifecycle calls surface errors to the caller.
#[derive(Debug, Error)]
pub enum GrantTimeError {
    /// The app is not installed for the user.
    #[error("app {app} is not installed for user {user}")]
    IdentityNotFound { app: AppName, user: UserId },

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Encoding or decoding error.
    #[error("encoding error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for manager operations.
pub type Result<T> = std::result::Result<T, GrantTimeError>;
