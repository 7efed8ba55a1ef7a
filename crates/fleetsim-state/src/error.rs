//! Error types for the fleet store.

use thiserror::Error;

/// Result type alias for fleet store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during fleet store operations.
#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("duplicate server id: {0}")]
    DuplicateServer(String),

    #[error("server not found: {0}")]
    NotFound(String),

    #[error("alert not found: {0}")]
    AlertNotFound(String),

    #[error("server {0} is not in the operational pool")]
    NotOperational(String),

    #[error("fleet store is already seeded")]
    AlreadySeeded,
}
