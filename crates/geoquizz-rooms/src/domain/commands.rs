//! Client → engine protocol messages.

use geoquizz_core::error::GameError;
use serde::{Deserialize, Serialize};

use super::player::PlayerId;

/// Message types sent from clients to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Open a new room and join it as host.
    CreateRoom {
        /// Human-readable room name.
        #[serde(default)]
        room_name: Option<String>,
        /// The host's display name.
        host_name: String,
        /// Rounds to play.
        #[serde(default)]
        num_rounds: Option<usize>,
    },
    /// Join (or reconnect to) an existing room.
    JoinRoom {
        /// Room code, any case.
        room_id: String,
        /// Display name.
        player_name: String,
        /// Token from an earlier `joined_room`, to reclaim that identity.
        #[serde(default)]
        session_token: Option<String>,
    },
    /// Set the lobby ready flag.
    PlayerReady {
        /// New flag value.
        ready: bool,
    },
    /// Host only: leave the lobby.
    StartGame,
    /// Guess the current photo's location.
    SubmitGuess {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
    },
    /// Host only: move past the round results.
    NextRound,
    /// Leave the room for good.
    LeaveRoom,
    /// Host only: remove a player.
    KickPlayer {
        /// Who to remove.
        player_id: PlayerId,
    },
}

/// A command issued by a player already bound to a room.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerAction {
    /// Set the lobby ready flag.
    Ready(bool),
    /// Start the game.
    Start,
    /// Submit a guess.
    Submit {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
    },
    /// Advance past round results.
    NextRound,
    /// Leave the room.
    Leave,
    /// Remove another player.
    Kick(PlayerId),
}

impl PlayerAction {
    /// Name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready(_) => "player_ready",
            Self::Start => "start_game",
            Self::Submit { .. } => "submit_guess",
            Self::NextRound => "next_round",
            Self::Leave => "leave_room",
            Self::Kick(_) => "kick_player",
        }
    }
}

/// Where an inbound message must go.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Handled by the registry before any engine exists.
    Create {
        /// Requested room name.
        room_name: Option<String>,
        /// Host display name.
        host_name: String,
        /// Requested round count.
        num_rounds: Option<usize>,
    },
    /// Resolved to a room by code.
    Join {
        /// Raw room code.
        room_id: String,
        /// Display name.
        player_name: String,
        /// Reconnect token.
        session_token: Option<String>,
    },
    /// Resolved to a room through the connection binding.
    Action(PlayerAction),
}

impl ClientMessage {
    /// Decodes a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InvalidInput` if the frame is not a known message.
    pub fn decode(text: &str) -> Result<Self, GameError> {
        serde_json::from_str(text)
            .map_err(|e| GameError::InvalidInput(format!("unreadable message: {e}")))
    }

    /// The wire event name.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create_room",
            Self::JoinRoom { .. } => "join_room",
            Self::PlayerReady { .. } => "player_ready",
            Self::StartGame => "start_game",
            Self::SubmitGuess { .. } => "submit_guess",
            Self::NextRound => "next_round",
            Self::LeaveRoom => "leave_room",
            Self::KickPlayer { .. } => "kick_player",
        }
    }

    /// Splits the message by how it is routed.
    #[must_use]
    pub fn route(self) -> Route {
        match self {
            Self::CreateRoom {
                room_name,
                host_name,
                num_rounds,
            } => Route::Create {
                room_name,
                host_name,
                num_rounds,
            },
            Self::JoinRoom {
                room_id,
                player_name,
                session_token,
            } => Route::Join {
                room_id,
                player_name,
                session_token,
            },
            Self::PlayerReady { ready } => Route::Action(PlayerAction::Ready(ready)),
            Self::StartGame => Route::Action(PlayerAction::Start),
            Self::SubmitGuess {
                latitude,
                longitude,
            } => Route::Action(PlayerAction::Submit {
                latitude,
                longitude,
            }),
            Self::NextRound => Route::Action(PlayerAction::NextRound),
            Self::LeaveRoom => Route::Action(PlayerAction::Leave),
            Self::KickPlayer { player_id } => Route::Action(PlayerAction::Kick(player_id)),
        }
    }
}
