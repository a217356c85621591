//! The per-room actor.
//!
//! Each room runs as one task that drains a bounded command queue. Client
//! actions, disconnect notices and timer firings for the room all pass
//! through that queue, so the aggregate only ever sees one command at a
//! time and needs no lock.

use std::collections::HashMap;
use std::sync::Arc;

use geoquizz_core::clock::Clock;
use geoquizz_core::error::GameError;
use geoquizz_core::record::GameRecordRepository;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::fanout::Fanout;
use crate::application::query_handlers::RoomView;
use crate::application::registry::RoomRegistry;
use crate::application::scheduler::{Fired, Scheduler, TimerToken};
use crate::domain::aggregates::Room;
use crate::domain::commands::PlayerAction;
use crate::domain::effects::{Effect, RoomTimer};
use crate::domain::events::ServerMessage;
use crate::domain::player::{ConnectionId, PlayerId};
use crate::domain::room_code::RoomCode;

/// Commands a room engine accepts.
#[derive(Debug)]
pub enum RoomCommand {
    /// Join or reconnect; the outcome comes back on `reply`.
    Join {
        /// The joining connection.
        connection: ConnectionId,
        /// Validated display name.
        player_name: String,
        /// Token from an earlier join.
        session_token: Option<String>,
        /// Receives the bound player id.
        reply: oneshot::Sender<Result<PlayerId, GameError>>,
    },
    /// A command from a bound player. Rejections go back to `connection`.
    Act {
        /// The sending connection.
        connection: ConnectionId,
        /// The player the connection is bound to.
        player: PlayerId,
        /// What to do.
        action: PlayerAction,
    },
    /// The connection bound to `player` dropped.
    Disconnected {
        /// The connection that dropped.
        connection: ConnectionId,
        /// The player it was bound to.
        player: PlayerId,
    },
    /// Read-only view for queries.
    Inspect {
        /// Receives the view.
        reply: oneshot::Sender<RoomView>,
    },
    /// A room timer fired.
    Timer(Fired<RoomTimer>),
}

impl From<Fired<RoomTimer>> for RoomCommand {
    fn from(fired: Fired<RoomTimer>) -> Self {
        Self::Timer(fired)
    }
}

/// Cloneable address of a running room engine.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: RoomCode,
    commands: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Wraps the sending side of a room's command queue.
    #[must_use]
    pub fn new(code: RoomCode, commands: mpsc::Sender<RoomCommand>) -> Self {
        Self { code, commands }
    }

    /// The room's code.
    #[must_use]
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Whether the engine has shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Joins the room and waits until the connection is bound.
    ///
    /// # Errors
    ///
    /// Returns the room's rejection, or `GameError::RoomNotFound` if the
    /// room closed first.
    pub async fn join(
        &self,
        connection: ConnectionId,
        player_name: String,
        session_token: Option<String>,
    ) -> Result<PlayerId, GameError> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::Join {
            connection,
            player_name,
            session_token,
            reply,
        })
        .await?;
        response.await.map_err(|_| self.gone())?
    }

    /// Queues a player command.
    ///
    /// # Errors
    ///
    /// Returns `GameError::RoomNotFound` if the room closed.
    pub async fn act(
        &self,
        connection: ConnectionId,
        player: PlayerId,
        action: PlayerAction,
    ) -> Result<(), GameError> {
        self.send(RoomCommand::Act {
            connection,
            player,
            action,
        })
        .await
    }

    /// Reports a dropped connection. A closed room is not an error here.
    pub async fn disconnected(&self, connection: ConnectionId, player: PlayerId) {
        if self
            .send(RoomCommand::Disconnected { connection, player })
            .await
            .is_err()
        {
            debug!(room = %self.code, %connection, "disconnect for a closed room");
        }
    }

    /// Fetches a read-only view of the room.
    ///
    /// # Errors
    ///
    /// Returns `GameError::RoomNotFound` if the room closed.
    pub async fn inspect(&self) -> Result<RoomView, GameError> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::Inspect { reply }).await?;
        response.await.map_err(|_| self.gone())
    }

    async fn send(&self, command: RoomCommand) -> Result<(), GameError> {
        self.commands.send(command).await.map_err(|_| self.gone())
    }

    fn gone(&self) -> GameError {
        GameError::RoomNotFound(self.code.to_string())
    }
}

/// Collaborators shared by every room engine.
#[derive(Clone)]
pub struct EngineServices {
    /// Wall clock for timestamps that leave the engine.
    pub clock: Arc<dyn Clock>,
    /// Sink for finished games.
    pub records: Arc<dyn GameRecordRepository>,
    /// Outbound socket table.
    pub fanout: Arc<Fanout>,
    /// Directory the engine removes itself from on close.
    pub registry: Arc<RoomRegistry>,
}

/// Runs one room: applies commands to the aggregate and performs its effects.
pub struct RoomEngine {
    room: Room,
    services: EngineServices,
    scheduler: Scheduler<RoomCommand>,
    timers: HashMap<RoomTimer, TimerToken>,
    closed: bool,
}

impl RoomEngine {
    /// Starts the engine task for `room` and returns its handle.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(room: Room, services: EngineServices, capacity: usize) -> RoomHandle {
        let (commands, inbox) = mpsc::channel(capacity);
        let handle = RoomHandle::new(room.code().clone(), commands);
        let mut engine = Self {
            room,
            services,
            scheduler: Scheduler::new(&handle.commands),
            timers: HashMap::new(),
            closed: false,
        };
        engine.apply_effects();
        tokio::spawn(engine.run(inbox));
        handle
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<RoomCommand>) {
        info!(room = %self.room.code(), "room engine started");
        while !self.closed {
            let Some(command) = inbox.recv().await else {
                break;
            };
            let before = self.room.state();
            self.handle(command);
            let after = self.room.state();
            if before != after {
                info!(
                    room = %self.room.code(),
                    from = ?before,
                    to = ?after,
                    round = self.room.round_index(),
                    "room state changed"
                );
            }
        }
        self.shutdown();
    }

    fn handle(&mut self, command: RoomCommand) {
        let now = Instant::now();
        match command {
            RoomCommand::Join {
                connection,
                player_name,
                session_token,
                reply,
            } => {
                self.room.touch();
                let result = self
                    .room
                    .join(connection, player_name, session_token.as_deref(), now);
                match &result {
                    Ok(player) => {
                        info!(room = %self.room.code(), %connection, %player, "player joined");
                    }
                    Err(err) => {
                        debug!(room = %self.room.code(), %connection, error = %err, "join rejected");
                    }
                }
                self.apply_effects();
                let _ = reply.send(result);
            }
            RoomCommand::Act {
                connection,
                player,
                action,
            } => {
                self.room.touch();
                let clock = Arc::clone(&self.services.clock);
                if let Err(err) = self.room.act(player, action, now, clock.as_ref()) {
                    debug!(
                        room = %self.room.code(),
                        %player,
                        action = action.name(),
                        error = %err,
                        "command rejected"
                    );
                    self.services
                        .fanout
                        .send(connection, ServerMessage::error(&err));
                }
                self.apply_effects();
            }
            RoomCommand::Disconnected { connection, player } => {
                self.room.disconnect(player, connection, now);
                self.apply_effects();
            }
            RoomCommand::Inspect { reply } => {
                let _ = reply.send(RoomView {
                    snapshot: self.room.snapshot(),
                    ranking: self.room.ranking(),
                });
            }
            RoomCommand::Timer(fired) => self.fire(fired, now),
        }
    }

    fn fire(&mut self, fired: Fired<RoomTimer>, now: Instant) {
        let current = self.timers.get(&fired.kind) == Some(&fired.token);
        if !current || !self.scheduler.accept(fired.token) {
            debug!(room = %self.room.code(), timer = ?fired.kind, "stale timer discarded");
            return;
        }
        if !self.scheduler.is_pending(fired.token) {
            self.timers.remove(&fired.kind);
        }
        let clock = Arc::clone(&self.services.clock);
        self.room.on_timer(fired.kind, now, clock.as_ref());
        self.apply_effects();
    }

    fn apply_effects(&mut self) {
        let code = self.room.code().clone();
        for effect in self.room.take_effects() {
            match effect {
                Effect::Broadcast(message) => self.services.fanout.broadcast(&code, &message),
                Effect::Send {
                    connection,
                    message,
                } => self.services.fanout.send(connection, message),
                Effect::Bind { connection, player } => {
                    self.services.fanout.bind(connection, &code, player);
                }
                Effect::Unbind { connection } => self.services.fanout.unbind(connection, &code),
                Effect::Schedule {
                    timer,
                    delay,
                    periodic,
                } => {
                    self.cancel_timer(timer);
                    let token = if periodic {
                        self.scheduler.every(delay, timer)
                    } else {
                        self.scheduler.after(delay, timer)
                    };
                    self.timers.insert(timer, token);
                }
                Effect::Cancel(timer) => self.cancel_timer(timer),
                Effect::Record(record) => {
                    let records = Arc::clone(&self.services.records);
                    tokio::spawn(async move {
                        match records.record_game(&record).await {
                            Ok(()) => info!(room = %record.room_code, "game recorded"),
                            Err(err) => {
                                warn!(room = %record.room_code, error = %err, "failed to record game");
                            }
                        }
                    });
                }
                Effect::Close => self.closed = true,
            }
        }
    }

    fn cancel_timer(&mut self, timer: RoomTimer) {
        if let Some(token) = self.timers.remove(&timer) {
            self.scheduler.cancel(token);
        }
    }

    fn shutdown(&mut self) {
        let code = self.room.code().clone();
        self.scheduler.cancel_all();
        self.timers.clear();
        self.services.fanout.unbind_room(&code);
        self.services.registry.remove(&code);
        info!(room = %code, "room engine stopped");
    }
}
