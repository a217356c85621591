//! Connection routing.
//!
//! The `ConnectionManager` is the single entry point for transports. It
//! numbers connections, resolves each inbound message to a room engine and
//! turns routing failures into `error` messages for the sender.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use geoquizz_core::clock::Clock;
use geoquizz_core::error::GameError;
use geoquizz_core::photo::PhotoSource;
use geoquizz_core::record::GameRecordRepository;
use geoquizz_core::rng::DeterministicRng;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::application::engine::{EngineServices, RoomEngine, RoomHandle};
use crate::application::fanout::Fanout;
use crate::application::registry::RoomRegistry;
use crate::application::settings::GameSettings;
use crate::domain::aggregates::Room;
use crate::domain::commands::{ClientMessage, PlayerAction, Route};
use crate::domain::events::ServerMessage;
use crate::domain::player::{ConnectionId, validate_display_name};

/// Name given to rooms created without one.
pub const DEFAULT_ROOM_NAME: &str = "Room";

/// Routes connections to rooms.
pub struct ConnectionManager {
    settings: GameSettings,
    photos: Arc<dyn PhotoSource>,
    services: EngineServices,
    next_connection: AtomicU64,
}

impl ConnectionManager {
    /// Creates a manager with an empty registry and socket table.
    #[must_use]
    pub fn new(
        settings: GameSettings,
        photos: Arc<dyn PhotoSource>,
        records: Arc<dyn GameRecordRepository>,
        clock: Arc<dyn Clock>,
        rng: Box<dyn DeterministicRng>,
    ) -> Self {
        Self {
            settings,
            photos,
            services: EngineServices {
                clock,
                records,
                fanout: Arc::new(Fanout::new()),
                registry: Arc::new(RoomRegistry::new(settings.max_rooms, rng)),
            },
            next_connection: AtomicU64::new(0),
        }
    }

    /// The room directory.
    #[must_use]
    pub fn registry(&self) -> &RoomRegistry {
        &self.services.registry
    }

    /// The socket table.
    #[must_use]
    pub fn fanout(&self) -> &Fanout {
        &self.services.fanout
    }

    /// The settings rooms are created with.
    #[must_use]
    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    /// Registers a new transport connection and its outbound queue.
    pub fn connect(&self, outbound: mpsc::Sender<ServerMessage>) -> ConnectionId {
        let connection = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed) + 1);
        self.services.fanout.attach(connection, outbound);
        debug!(%connection, "connection attached");
        connection
    }

    /// Routes one inbound message. Failures are reported to `connection`.
    pub async fn handle(&self, connection: ConnectionId, message: ClientMessage) {
        let event = message.event_name();
        let result = match message.route() {
            Route::Create {
                room_name,
                host_name,
                num_rounds,
            } => {
                self.create_room(connection, room_name, &host_name, num_rounds)
                    .await
            }
            Route::Join {
                room_id,
                player_name,
                session_token,
            } => {
                self.join_room(connection, &room_id, &player_name, session_token)
                    .await
            }
            Route::Action(action) => self.act(connection, action).await,
        };
        if let Err(err) = result {
            debug!(%connection, event, error = %err, "message rejected");
            self.services
                .fanout
                .send(connection, ServerMessage::error(&err));
        }
    }

    /// Forgets a closed connection and tells its room.
    pub async fn disconnect(&self, connection: ConnectionId) {
        let Some(binding) = self.services.fanout.detach(connection) else {
            debug!(%connection, "unbound connection closed");
            return;
        };
        info!(%connection, room = %binding.room, player = %binding.player, "connection lost");
        if let Ok(handle) = self.services.registry.get(binding.room.as_str()) {
            handle.disconnected(connection, binding.player).await;
        }
    }

    async fn create_room(
        &self,
        connection: ConnectionId,
        room_name: Option<String>,
        host_name: &str,
        num_rounds: Option<usize>,
    ) -> Result<(), GameError> {
        let host_name = validate_display_name(host_name)?;
        let room_name = room_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(validate_display_name)
            .transpose()?
            .unwrap_or_else(|| DEFAULT_ROOM_NAME.to_owned());
        let rounds = self.settings.rounds(num_rounds)?;
        let deck = self.photos.draw(rounds).await?;
        if deck.is_empty() {
            return Err(GameError::NoPhotosAvailable);
        }

        let num_rounds = deck.len().min(rounds);
        let created_at = self.services.clock.now();
        let timings = self.settings.timings;
        let capacity = self.settings.command_capacity;
        let services = self.services.clone();
        let handle = self.services.registry.create(|code| {
            let room = Room::new(code, room_name, num_rounds, deck, timings, created_at);
            RoomEngine::spawn(room, services, capacity)
        })?;
        info!(room = %handle.code(), %connection, num_rounds, "room created");

        self.enter(connection, &handle, host_name, None).await
    }

    async fn join_room(
        &self,
        connection: ConnectionId,
        room_id: &str,
        player_name: &str,
        session_token: Option<String>,
    ) -> Result<(), GameError> {
        let name = validate_display_name(player_name)?;
        let handle = self.services.registry.get(room_id)?;
        self.enter(connection, &handle, name, session_token).await
    }

    /// Joins `handle`, leaving whatever room the connection was in before.
    async fn enter(
        &self,
        connection: ConnectionId,
        handle: &RoomHandle,
        name: String,
        session_token: Option<String>,
    ) -> Result<(), GameError> {
        if let Some(previous) = self.services.fanout.binding(connection) {
            if &previous.room == handle.code() {
                return Err(GameError::transition("already in this room"));
            }
            self.services.fanout.unbind(connection, &previous.room);
            if let Ok(old) = self.services.registry.get(previous.room.as_str()) {
                if old
                    .act(connection, previous.player, PlayerAction::Leave)
                    .await
                    .is_err()
                {
                    debug!(%connection, room = %previous.room, "previous room already closed");
                }
            }
        }
        handle
            .join(connection, name, session_token)
            .await
            .map(|_| ())
    }

    async fn act(&self, connection: ConnectionId, action: PlayerAction) -> Result<(), GameError> {
        let binding = self
            .services
            .fanout
            .binding(connection)
            .ok_or_else(|| GameError::transition("join a room first"))?;
        let handle = self.services.registry.get(binding.room.as_str())?;
        handle.act(connection, binding.player, action).await
    }
}
