//! Error types for the response cache
//!
//! Provides unified error handling using thiserror. Upstream transport errors
//! are deliberately not part of this enum: the caching transport hands them
//! back to the caller untouched.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the caching layer.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The per-backend options block could not be decoded
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// A bounded store was requested without any bound
    #[error("Bounded store needs max_items or max_size greater than zero")]
    InvalidBounds,

    /// Stored bytes could not be decoded back into a response
    #[error("Malformed cache entry: {0}")]
    MalformedEntry(String),
}

// == Result Type Alias ==
/// Convenience Result type for the caching layer.
pub type Result<T> = std::result::Result<T, CacheError>;
