//! Engine error taxonomy

use uuid::Uuid;

use super::inventory::InventoryError;

/// Why a client request was not applied. None of these are fatal: the
/// engine logs, counts and moves on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    /// Malformed or missing fields
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Well-formed but not allowed right now
    #[error("rejected: {0}")]
    Validation(String),

    /// Would create or destroy petals
    #[error("inventory consistency violation: {0}")]
    Consistency(InventoryError),

    /// The session has no player any more
    #[error("session {0} is gone")]
    SessionLost(Uuid),
}

impl GameError {
    pub fn validation(reason: impl Into<String>) -> Self {
        GameError::Validation(reason.into())
    }
}

impl From<InventoryError> for GameError {
    fn from(err: InventoryError) -> Self {
        if err.is_consistency_violation() {
            GameError::Consistency(err)
        } else {
            GameError::Validation(err.to_string())
        }
    }
}
