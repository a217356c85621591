//! Players, their per-round guesses and connection identity.

use std::fmt;

use chrono::{DateTime, Utc};
use geoquizz_core::error::GameError;
use geoquizz_core::geo::{Coordinate, ScoredGuess};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

/// Stable player identifier, kept across reconnects.
pub type PlayerId = Uuid;

/// Palette handed out by join order. Its length is the roster limit.
pub const PLAYER_COLORS: [&str; 8] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#bfef45",
];

/// Longest accepted display name, in characters.
pub const MAX_NAME_CHARS: usize = 32;

/// Identifies one live transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Trims a display name and checks its length.
///
/// # Errors
///
/// Returns `GameError::InvalidInput` for empty or over-long names.
pub fn validate_display_name(raw: &str) -> Result<String, GameError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(GameError::InvalidInput("name must not be empty".to_owned()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(GameError::InvalidInput(format!(
            "name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_owned())
}

/// A player's entry for one round. Created empty when the round starts and
/// filled at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct Guess {
    /// Round this guess belongs to.
    pub round_index: usize,
    /// Submitted location, if any.
    pub location: Option<Coordinate>,
    /// Distance from the true location, if submitted.
    pub distance_km: Option<f64>,
    /// Points earned; zero when nothing was submitted.
    pub score: u32,
    /// When the guess arrived.
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Guess {
    /// An unsubmitted entry for `round_index`.
    #[must_use]
    pub fn pending(round_index: usize) -> Self {
        Self {
            round_index,
            location: None,
            distance_km: None,
            score: 0,
            submitted_at: None,
        }
    }

    /// Whether the player submitted for this round.
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    pub(crate) fn fill(&mut self, location: Coordinate, scored: ScoredGuess, at: DateTime<Utc>) {
        self.location = Some(location);
        self.distance_km = Some(scored.distance_km);
        self.score = scored.score;
        self.submitted_at = Some(at);
    }
}

/// A member of a room roster.
#[derive(Debug, Clone)]
pub struct Player {
    /// Stable identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Palette color, unique within the room.
    pub color: &'static str,
    /// Token that lets this player reclaim the identity after a drop.
    pub session_token: String,
    /// Lobby ready flag.
    pub ready: bool,
    /// Whether a live connection is bound to this player.
    pub connected: bool,
    /// Given up on by an expired pause; not waited for again.
    pub absent: bool,
    /// Left (or was kicked) after the game started.
    pub left: bool,
    /// Connection currently bound to this player.
    pub connection: Option<ConnectionId>,
    /// When the last connection dropped.
    pub disconnected_at: Option<Instant>,
    /// One entry per round the player took part in.
    pub guesses: Vec<Guess>,
}

impl Player {
    /// A freshly joined, connected player.
    #[must_use]
    pub fn new(name: String, color: &'static str, connection: ConnectionId) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            color,
            session_token: Uuid::new_v4().to_string(),
            ready: false,
            connected: true,
            absent: false,
            left: false,
            connection: Some(connection),
            disconnected_at: None,
            guesses: Vec::new(),
        }
    }

    /// Sum of every recorded round score.
    #[must_use]
    pub fn total_score(&self) -> u32 {
        self.guesses.iter().map(|g| g.score).sum()
    }

    /// The entry for `round_index`, if the player took part.
    #[must_use]
    pub fn guess_for(&self, round_index: usize) -> Option<&Guess> {
        self.guesses.iter().find(|g| g.round_index == round_index)
    }

    pub(crate) fn guess_for_mut(&mut self, round_index: usize) -> Option<&mut Guess> {
        self.guesses.iter_mut().find(|g| g.round_index == round_index)
    }

    /// Adds an empty entry for `round_index` unless one exists.
    pub(crate) fn open_round(&mut self, round_index: usize) {
        if self.guess_for(round_index).is_none() {
            self.guesses.push(Guess::pending(round_index));
        }
    }

    /// Whether the player submitted in `round_index`.
    #[must_use]
    pub fn has_submitted(&self, round_index: usize) -> bool {
        self.guess_for(round_index).is_some_and(Guess::is_submitted)
    }

    /// Connected and still part of the game.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.connected && !self.left
    }

    /// Dropped without leaving and not yet given up on.
    #[must_use]
    pub fn is_awaited(&self) -> bool {
        !self.connected && !self.left && !self.absent
    }

    pub(crate) fn bind(&mut self, connection: ConnectionId) {
        self.connected = true;
        self.absent = false;
        self.connection = Some(connection);
        self.disconnected_at = None;
    }

    pub(crate) fn unbind(&mut self, now: Instant) {
        self.connected = false;
        self.connection = None;
        self.disconnected_at = Some(now);
    }
}
