//! Error taxonomy for core operations.
//!
//! None of these errors are transient: retrying an operation against the
//! same ledger state reproduces the same outcome.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShieldError {
    /// A referenced policy, claim, user, withdrawal or evidence record is missing.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    /// The actor lacks the owner/claimant/reviewer/administrator relationship.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Malformed or out-of-range input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The operation is invalid for the entity's current status.
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// A collaborator (ledger file, evidence storage) failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Coarse classification surfaced to callers and written to the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    Validation,
    StateConflict,
    Storage,
}

impl ShieldError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShieldError::NotFound { .. } => ErrorKind::NotFound,
            ShieldError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ShieldError::Validation(_) => ErrorKind::Validation,
            ShieldError::StateConflict(_) => ErrorKind::StateConflict,
            ShieldError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl Into<u64>) -> Self {
        ShieldError::NotFound { entity, id: id.into() }
    }
}

pub type Result<T> = std::result::Result<T, ShieldError>;

impl From<std::io::Error> for ShieldError {
    fn from(e: std::io::Error) -> Self {
        ShieldError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for ShieldError {
    fn from(e: serde_json::Error) -> Self {
        ShieldError::Storage(format!("JSON error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(ShieldError::not_found("policy", 4u64).kind(), ErrorKind::NotFound);
        assert_eq!(ShieldError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(ShieldError::StateConflict("x".into()).kind(), ErrorKind::StateConflict);
        assert_eq!(
            ShieldError::PermissionDenied("x".into()).kind(),
            ErrorKind::PermissionDenied
        );
    }

    #[test]
    fn not_found_message_names_entity_and_id() {
        let err = ShieldError::not_found("claim", 9u64);
        assert_eq!(err.to_string(), "claim 9 not found");
    }

    #[test]
    fn io_errors_become_storage() {
        let err: ShieldError = std::io::Error::other("disk gone").into();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
