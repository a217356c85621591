//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
///
/// Every variant except `Infrastructure` is a recoverable guard failure: the
/// room that rejected the command is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    /// No live room carries this code.
    #[error("room not found: {0}")]
    RoomNotFound(String),

    /// The registry already holds the maximum number of concurrent rooms.
    #[error("room capacity exceeded: at most {limit} rooms may be open")]
    CapacityExceeded {
        /// The configured room limit.
        limit: usize,
    },

    /// The room roster is full.
    #[error("room is full: at most {limit} players")]
    RoomFull {
        /// The roster limit.
        limit: usize,
    },

    /// A command arrived while its guard does not hold.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The player already guessed in this round.
    #[error("a guess was already recorded for round {round_index}")]
    DuplicateGuess {
        /// The round that already holds a guess.
        round_index: usize,
    },

    /// A reconnect token was presented after its grace window.
    #[error("session expired")]
    StaleSession,

    /// Malformed or out-of-range input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The photo source had nothing to offer.
    #[error("no photos available")]
    NoPhotosAvailable,

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl GameError {
    /// Machine-readable code carried by `error` messages and HTTP bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "ROOM_NOT_FOUND",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::RoomFull { .. } => "ROOM_FULL",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::DuplicateGuess { .. } => "DUPLICATE_GUESS",
            Self::StaleSession => "STALE_SESSION",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NoPhotosAvailable => "NO_PHOTOS_AVAILABLE",
            Self::Infrastructure(_) => "INFRASTRUCTURE_ERROR",
        }
    }

    /// Shorthand for an `InvalidTransition` with a formatted reason.
    pub fn transition(reason: impl Into<String>) -> Self {
        Self::InvalidTransition(reason.into())
    }
}
