//! Finished-game history abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// One player's line in a finished game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Display name at the end of the game.
    pub player_name: String,
    /// 1-based final rank.
    pub rank: usize,
    /// Sum of all round scores.
    pub total_score: u32,
    /// `total_score / num_rounds`, rounded to 2 decimals.
    pub average_score: f64,
}

/// Summary of a finished multiplayer game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Code of the room that hosted the game.
    pub room_code: String,
    /// Human-readable room name.
    pub room_name: String,
    /// When the room was created.
    pub created_at: DateTime<Utc>,
    /// When the final ranking was computed.
    pub finished_at: DateTime<Utc>,
    /// Number of rounds played.
    pub num_rounds: usize,
    /// Players in ranking order.
    pub players: Vec<PlayerRecord>,
}

/// Sink for finished games.
#[async_trait]
pub trait GameRecordRepository: Send + Sync {
    /// Persist one finished game.
    async fn record_game(&self, record: &GameRecord) -> Result<(), GameError>;
}
