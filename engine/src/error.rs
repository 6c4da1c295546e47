//! Error types for the Lumina engine.

use crate::ProfileId;
use thiserror::Error;

/// All possible errors from the Lumina engine.
///
/// Every variant describes a rejected mutation; the document is left
/// untouched whenever one of these is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Lookup errors
    #[error("profile not found: {0}")]
    ProfileNotFound(ProfileId),

    #[error("profile already exists: {0}")]
    ProfileExists(ProfileId),

    #[error("unknown game: {0}")]
    UnknownGame(String),

    #[error("unknown achievement: {0}")]
    UnknownAchievement(String),

    #[error("unknown reward: {0}")]
    UnknownReward(String),

    #[error("unknown shop item: {0}")]
    UnknownItem(String),

    // Authorization errors
    #[error("invalid PIN")]
    InvalidPin,

    #[error("PIN must be exactly 4 digits, got '{0}'")]
    InvalidPinFormat(String),

    #[error("guest profile cannot have a PIN")]
    GuestPinNotAllowed,

    // Balance errors
    #[error("not enough coins: need {needed}, have {available}")]
    InsufficientCoins { needed: u64, available: u64 },

    #[error("not enough reward points: need {needed}, have {available}")]
    InsufficientPoints { needed: u64, available: u64 },

    #[error("no '{0}' power-ups left")]
    InsufficientPowerUps(String),

    #[error("item already owned: {0}")]
    AlreadyOwned(String),

    // Shared state errors
    #[error("no pending reward at index {0}")]
    NoPendingReward(usize),

    #[error("family quest is not active or its goal has not been reached")]
    QuestNotComplete,

    // Document errors
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::ProfileNotFound("ada".into());
        assert_eq!(err.to_string(), "profile not found: ada");

        let err = Error::InsufficientCoins {
            needed: 50,
            available: 40,
        };
        assert_eq!(err.to_string(), "not enough coins: need 50, have 40");

        let err = Error::InvalidPinFormat("12a4".into());
        assert_eq!(
            err.to_string(),
            "PIN must be exactly 4 digits, got '12a4'"
        );
    }
}
