//! Read-only room queries.
//!
//! Views are taken by the room's own engine, so they are consistent with
//! every command handled before the query.

use geoquizz_core::error::GameError;
use serde::Serialize;

use crate::application::registry::RoomRegistry;
use crate::domain::events::{RankingEntry, RoomSnapshot};

/// Read-only view of a room.
///
/// Note: the true location of the current photo is never part of a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomView {
    /// Roster and state.
    pub snapshot: RoomSnapshot,
    /// Current ranking, best first.
    pub ranking: Vec<RankingEntry>,
}

/// Retrieves a room's snapshot by code.
///
/// # Errors
///
/// Returns `GameError::RoomNotFound` if no live room has that code.
pub async fn get_room(registry: &RoomRegistry, code: &str) -> Result<RoomSnapshot, GameError> {
    let handle = registry.get(code)?;
    Ok(handle.inspect().await?.snapshot)
}

/// Retrieves a room's current ranking by code.
///
/// # Errors
///
/// Returns `GameError::RoomNotFound` if no live room has that code.
pub async fn get_leaderboard(
    registry: &RoomRegistry,
    code: &str,
) -> Result<Vec<RankingEntry>, GameError> {
    let handle = registry.get(code)?;
    Ok(handle.inspect().await?.ranking)
}
