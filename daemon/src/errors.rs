//! Error types for the control command surface.
//!
//! Probe failures never travel through these types; they are materialized
//! into check details on the result record. These errors exist so the command
//! router can map a failure onto the `{status: error, message}` envelope
//! while keeping the failure kind visible to callers inside the crate.

use std::fmt;

/// Error produced while handling a control command.
#[derive(Debug)]
pub enum CommandError {
    /// Missing or invalid field in the request payload.
    Validation(String),

    /// Referenced entity does not exist.
    NotFound(String),

    /// Name already taken within the containing scope.
    Conflict(String),

    /// Persistence failure.
    Store(String),

    /// Encryption failure while handling a secret field.
    Crypto(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The message is the protocol-visible text; the variant only carries
        // the kind for in-crate callers.
        match self {
            CommandError::Validation(msg)
            | CommandError::NotFound(msg)
            | CommandError::Conflict(msg)
            | CommandError::Store(msg)
            | CommandError::Crypto(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<anyhow::Error> for CommandError {
    fn from(err: anyhow::Error) -> Self {
        CommandError::Store(err.to_string())
    }
}

impl From<crate::crypto::CryptoError> for CommandError {
    fn from(err: crate::crypto::CryptoError) -> Self {
        CommandError::Crypto(err.to_string())
    }
}
