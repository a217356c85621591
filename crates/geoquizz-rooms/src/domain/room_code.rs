//! Short, case-insensitive room codes.

use std::fmt;
use std::str::FromStr;

use geoquizz_core::error::GameError;
use geoquizz_core::rng::DeterministicRng;
use serde::{Deserialize, Serialize};

/// Characters a room code is drawn from. `I`, `O`, `0` and `1` are left out
/// so codes survive being read aloud or typed from a screen.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of characters in a room code.
pub const ROOM_CODE_LEN: usize = 6;

/// A normalized (upper-case) room code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Draws a random code.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn generate(rng: &mut dyn DeterministicRng) -> Self {
        let last = (ROOM_CODE_ALPHABET.len() - 1) as u32;
        let code = (0..ROOM_CODE_LEN)
            .map(|_| char::from(ROOM_CODE_ALPHABET[rng.next_u32_range(0, last) as usize]))
            .collect();
        Self(code)
    }

    /// Parses user input, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InvalidInput` if the input is not a well-formed code.
    pub fn parse(raw: &str) -> Result<Self, GameError> {
        let normalized = raw.trim().to_ascii_uppercase();
        let well_formed = normalized.len() == ROOM_CODE_LEN
            && normalized.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b));
        if well_formed {
            Ok(Self(normalized))
        } else {
            Err(GameError::InvalidInput(format!("malformed room code: {raw}")))
        }
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomCode {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}
