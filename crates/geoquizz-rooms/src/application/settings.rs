//! Engine-wide settings.

use geoquizz_core::error::GameError;

use crate::domain::aggregates::RoomTimings;

/// Tunables shared by every room a `ConnectionManager` creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    /// Countdown, round, pause, grace and idle durations.
    pub timings: RoomTimings,
    /// Most rooms open at once.
    pub max_rooms: usize,
    /// Capacity of each room's command queue.
    pub command_capacity: usize,
    /// Rounds played when `create_room` names none.
    pub default_rounds: usize,
    /// Most rounds a room may play.
    pub max_rounds: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            timings: RoomTimings::default(),
            max_rooms: 1000,
            command_capacity: 128,
            default_rounds: 5,
            max_rounds: 20,
        }
    }
}

impl GameSettings {
    /// Resolves a requested round count.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InvalidInput` outside `1..=max_rounds`.
    pub fn rounds(&self, requested: Option<usize>) -> Result<usize, GameError> {
        let rounds = requested.unwrap_or(self.default_rounds);
        if (1..=self.max_rounds).contains(&rounds) {
            Ok(rounds)
        } else {
            Err(GameError::InvalidInput(format!(
                "num_rounds must be between 1 and {}",
                self.max_rounds
            )))
        }
    }
}
