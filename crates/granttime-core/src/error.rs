//! Error types for Granttime Core.

use thiserror::Error;

/// Errors that can occur while encoding or decoding grant time state.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("duplicate {kind} entry in record: {name}")]
    DuplicateEntry { kind: &'static str, name: String },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
