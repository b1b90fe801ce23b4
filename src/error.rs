//! Error types for persisted bindings
//!
//! None of these ever escape a binding as a panic. Construction recovers
//! from all of them; writes hand them back so callers can inspect or drop
//! them.

use thiserror::Error;

/// Failure while moving a value between a binding and its store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersistError {
    /// Value could not be turned into a storable form
    #[error("failed to encode value for key '{key}': {reason}")]
    Encode { key: String, reason: String },

    /// Stored value was malformed or of the wrong type
    #[error("failed to decode value for key '{key}': {reason}")]
    Decode { key: String, reason: String },

    /// Backing store rejected the operation
    #[error("store error for key '{key}': {reason}")]
    Store { key: String, reason: String },
}

impl PersistError {
    pub fn encode(key: &str, reason: impl ToString) -> Self {
        PersistError::Encode {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn decode(key: &str, reason: impl ToString) -> Self {
        PersistError::Decode {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn store(key: &str, reason: impl ToString) -> Self {
        PersistError::Store {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Key the failure relates to
    pub fn key(&self) -> &str {
        match self {
            PersistError::Encode { key, .. }
            | PersistError::Decode { key, .. }
            | PersistError::Store { key, .. } => key,
        }
    }
}
