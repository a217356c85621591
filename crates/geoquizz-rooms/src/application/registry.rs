//! Process-wide directory of live rooms.
//!
//! The registry holds no game logic. It allocates codes, hands out engine
//! handles and forgets rooms once their engine shuts down.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use geoquizz_core::error::GameError;
use geoquizz_core::rng::DeterministicRng;
use tracing::{debug, info};

use crate::application::engine::RoomHandle;
use crate::domain::room_code::RoomCode;

/// Attempts at drawing an unused code before creation gives up.
const MAX_CODE_ATTEMPTS: usize = 32;

/// Directory of live rooms keyed by code.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomCode, RoomHandle>>,
    max_rooms: usize,
    rng: Mutex<Box<dyn DeterministicRng>>,
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("rooms", &self.len())
            .field("max_rooms", &self.max_rooms)
            .finish_non_exhaustive()
    }
}

impl RoomRegistry {
    /// Creates an empty registry admitting at most `max_rooms` live rooms.
    #[must_use]
    pub fn new(max_rooms: usize, rng: Box<dyn DeterministicRng>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            max_rooms,
            rng: Mutex::new(rng),
        }
    }

    /// Allocates a fresh code and registers the room `spawn` builds for it.
    ///
    /// `spawn` runs while the directory is locked and must not call back
    /// into the registry.
    ///
    /// # Errors
    ///
    /// Returns `GameError::CapacityExceeded` when the room limit is reached,
    /// or `GameError::Infrastructure` if no unused code could be drawn.
    pub fn create<F>(&self, spawn: F) -> Result<RoomHandle, GameError>
    where
        F: FnOnce(RoomCode) -> RoomHandle,
    {
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        if rooms.len() >= self.max_rooms {
            return Err(GameError::CapacityExceeded {
                limit: self.max_rooms,
            });
        }

        let code = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            (0..MAX_CODE_ATTEMPTS)
                .map(|_| RoomCode::generate(rng.as_mut()))
                .find(|code| !rooms.contains_key(code))
        };
        let Some(code) = code else {
            return Err(GameError::Infrastructure(
                "could not allocate a unique room code".to_owned(),
            ));
        };

        let handle = spawn(code.clone());
        rooms.insert(code.clone(), handle.clone());
        info!(room = %code, live_rooms = rooms.len(), "room registered");
        Ok(handle)
    }

    /// Looks up a live room from user input, in any case.
    ///
    /// # Errors
    ///
    /// Returns `GameError::RoomNotFound` for malformed or unknown codes.
    pub fn get(&self, raw: &str) -> Result<RoomHandle, GameError> {
        let code = RoomCode::parse(raw).map_err(|_| GameError::RoomNotFound(raw.to_owned()))?;
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&code)
            .filter(|handle| !handle.is_closed())
            .cloned()
            .ok_or_else(|| GameError::RoomNotFound(code.to_string()))
    }

    /// Forgets a room. Removing an unknown code is a no-op.
    pub fn remove(&self, code: &RoomCode) {
        let removed = self
            .rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(code);
        if removed.is_some() {
            info!(room = %code, "room removed");
        } else {
            debug!(room = %code, "room already removed");
        }
    }

    /// Number of live rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no room is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
