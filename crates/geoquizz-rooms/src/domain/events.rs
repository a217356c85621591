//! Engine → client protocol messages.
//!
//! Frames are JSON, adjacently tagged: `{"event": "round_started", "data": {...}}`.

use geoquizz_core::error::GameError;
use geoquizz_core::geo::Coordinate;
use serde::{Deserialize, Serialize};

use super::aggregates::RoomState;
use super::player::PlayerId;
use super::room_code::RoomCode;

/// Error code for faults that force a room to FINISHED.
pub const ROOM_FAULT_CODE: &str = "ROOM_FAULT";

/// Error code for frames that could not be decoded.
pub const INVALID_MESSAGE_CODE: &str = "INVALID_MESSAGE";

/// Sent only to the connection that joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRoom {
    /// The player's stable identifier.
    pub player_id: PlayerId,
    /// Assigned palette color.
    pub color: String,
    /// Room code.
    pub room_id: RoomCode,
    /// Token to present when reconnecting.
    pub session_token: String,
    /// Whether the player currently hosts the room.
    pub is_host: bool,
    /// Whether an existing identity was restored.
    pub reconnected: bool,
}

/// One roster line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Display name.
    pub name: String,
    /// Palette color.
    pub color: String,
    /// Lobby ready flag.
    pub ready: bool,
    /// Whether the player has a live connection.
    pub connected: bool,
    /// Whether the player hosts the room.
    pub is_host: bool,
    /// Accumulated score.
    pub total_score: u32,
}

/// Full room view, without any true location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    /// Room code.
    pub room_id: RoomCode,
    /// Human-readable room name.
    pub name: String,
    /// Current state.
    pub state: RoomState,
    /// Current host.
    pub host_id: Option<PlayerId>,
    /// 0-based current round.
    pub round_index: usize,
    /// Rounds in the game.
    pub num_rounds: usize,
    /// Roster in join order.
    pub players: Vec<PlayerSummary>,
}

/// Announces a new round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundStarted {
    /// 0-based round index.
    pub round_index: usize,
    /// Rounds in the game.
    pub total_rounds: usize,
    /// Photo identifier.
    pub photo_id: String,
    /// Where the client fetches the photo.
    pub photo_url: String,
    /// Full round length in seconds.
    pub duration_seconds: u32,
}

/// One player's line in `round_results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRoundResult {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Display name.
    pub name: String,
    /// Palette color.
    pub color: String,
    /// Submitted location; null if the player never submitted.
    pub guess: Option<Coordinate>,
    /// Distance in km; null if the player never submitted.
    pub distance_km: Option<f64>,
    /// Points for this round.
    pub score: u32,
    /// Cumulative total after this round.
    pub total_score: u32,
}

/// Outcome of one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResults {
    /// 0-based round index.
    pub round_index: usize,
    /// Where the photo was taken.
    pub location: Coordinate,
    /// Per-player lines, in join order.
    pub results: Vec<PlayerRoundResult>,
}

/// One line of a ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// 1-based position.
    pub rank: usize,
    /// Player identifier.
    pub player_id: PlayerId,
    /// Display name.
    pub name: String,
    /// Palette color.
    pub color: String,
    /// Accumulated score.
    pub total_score: u32,
}

/// Message types sent from the engine to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The receiving connection is now bound to a player.
    JoinedRoom(JoinedRoom),
    /// The roster or a roster flag changed.
    RoomUpdated(RoomSnapshot),
    /// One second of the pre-round countdown elapsed.
    CountdownTick {
        /// Seconds before the round starts.
        seconds_remaining: u32,
    },
    /// A round began.
    RoundStarted(RoundStarted),
    /// One second of the round elapsed.
    TimerUpdate {
        /// Seconds left to submit.
        seconds_remaining: u32,
    },
    /// A player's guess was recorded.
    PlayerSubmitted {
        /// Who submitted.
        player_id: PlayerId,
    },
    /// The round resolved.
    RoundResults(RoundResults),
    /// The last round resolved and the host moved on.
    GameFinished {
        /// Final ranking, best first.
        ranking: Vec<RankingEntry>,
    },
    /// A player dropped mid-game.
    GamePaused {
        /// Who dropped.
        player_name: String,
        /// How long the room waits, in seconds.
        pause_seconds: u32,
    },
    /// One second of the pause window elapsed.
    PauseCountdown {
        /// Seconds before play resumes regardless.
        seconds_remaining: u32,
    },
    /// Play continues where it stopped.
    GameResumed,
    /// The host removed a player.
    PlayerKicked {
        /// Who was removed.
        player_id: PlayerId,
    },
    /// The room is shutting down.
    RoomClosed {
        /// Why the room closed.
        reason: String,
    },
    /// A command was rejected.
    Error {
        /// Human-readable reason.
        message: String,
        /// Machine-readable code.
        code: String,
    },
}

impl ServerMessage {
    /// Error message for a rejected command.
    #[must_use]
    pub fn error(err: &GameError) -> Self {
        Self::Error {
            message: err.to_string(),
            code: err.code().to_owned(),
        }
    }

    /// The wire event name.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::JoinedRoom(_) => "joined_room",
            Self::RoomUpdated(_) => "room_updated",
            Self::CountdownTick { .. } => "countdown_tick",
            Self::RoundStarted(_) => "round_started",
            Self::TimerUpdate { .. } => "timer_update",
            Self::PlayerSubmitted { .. } => "player_submitted",
            Self::RoundResults(_) => "round_results",
            Self::GameFinished { .. } => "game_finished",
            Self::GamePaused { .. } => "game_paused",
            Self::PauseCountdown { .. } => "pause_countdown",
            Self::GameResumed => "game_resumed",
            Self::PlayerKicked { .. } => "player_kicked",
            Self::RoomClosed { .. } => "room_closed",
            Self::Error { .. } => "error",
        }
    }

    /// Encodes the message as a JSON text frame.
    ///
    /// # Panics
    ///
    /// Never in practice: every payload is plain data with string keys.
    #[must_use]
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("ServerMessage serialization is infallible")
    }
}
