use crate::{games::GameError, ledger::LedgerError};
use arcade_types::{
    SessionKey, ERROR_INSUFFICIENT_FUNDS, ERROR_INTERNAL, ERROR_INVALID_ACTION,
    ERROR_SESSION_CONFLICT, ERROR_SESSION_NOT_FOUND, ERROR_STAKE_OUT_OF_BOUNDS,
};
use thiserror::Error;

/// Errors returned to the router.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: i64, need: u64 },
    #[error("a session is already active for {0}")]
    SessionConflict(SessionKey),
    #[error("no active session for {0}")]
    SessionNotFound(SessionKey),
    #[error("invalid action: {0}")]
    InvalidAction(&'static str),
    #[error("stake {stake} outside [{min}, {max}]")]
    StakeOutOfBounds { stake: u64, min: u64, max: u64 },
    #[error("ledger failure: {0}")]
    Ledger(#[from] LedgerError),
}

impl EngineError {
    /// Stable numeric code for the presentation layer.
    pub fn code(&self) -> u8 {
        match self {
            EngineError::InsufficientFunds { .. } => ERROR_INSUFFICIENT_FUNDS,
            EngineError::SessionConflict(_) => ERROR_SESSION_CONFLICT,
            EngineError::SessionNotFound(_) => ERROR_SESSION_NOT_FOUND,
            EngineError::InvalidAction(_) => ERROR_INVALID_ACTION,
            EngineError::StakeOutOfBounds { .. } => ERROR_STAKE_OUT_OF_BOUNDS,
            EngineError::Ledger(LedgerError::InsufficientFunds { .. }) => ERROR_INSUFFICIENT_FUNDS,
            EngineError::Ledger(_) => ERROR_INTERNAL,
        }
    }
}

impl From<GameError> for EngineError {
    fn from(error: GameError) -> Self {
        EngineError::InvalidAction(error.reason())
    }
}
