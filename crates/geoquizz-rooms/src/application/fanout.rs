//! Socket table: outbound queues per connection and the room each one is
//! bound to.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::domain::events::ServerMessage;
use crate::domain::player::{ConnectionId, PlayerId};
use crate::domain::room_code::RoomCode;

/// Outbound queue capacity per connection.
pub const OUTBOUND_CAPACITY: usize = 64;

/// Where a connection's actions are routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// The room the connection plays in.
    pub room: RoomCode,
    /// The player it speaks for.
    pub player: PlayerId,
}

#[derive(Debug)]
struct Socket {
    outbound: mpsc::Sender<ServerMessage>,
    binding: Option<Binding>,
}

#[derive(Debug, Default)]
struct Table {
    sockets: HashMap<ConnectionId, Socket>,
    rooms: HashMap<RoomCode, HashSet<ConnectionId>>,
}

impl Table {
    fn clear_binding(&mut self, connection: ConnectionId) -> Option<Binding> {
        let binding = self.sockets.get_mut(&connection)?.binding.take()?;
        if let Some(members) = self.rooms.get_mut(&binding.room) {
            members.remove(&connection);
            if members.is_empty() {
                self.rooms.remove(&binding.room);
            }
        }
        Some(binding)
    }
}

/// Delivers engine messages to live connections.
///
/// Sends never block: a connection whose queue is full loses that message
/// and every other recipient is unaffected.
#[derive(Debug, Default)]
pub struct Fanout {
    table: RwLock<Table>,
}

impl Fanout {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a live connection and its outbound queue.
    pub fn attach(&self, connection: ConnectionId, outbound: mpsc::Sender<ServerMessage>) {
        self.write().sockets.insert(
            connection,
            Socket {
                outbound,
                binding: None,
            },
        );
    }

    /// Forgets a connection. Returns the binding it had, if any.
    pub fn detach(&self, connection: ConnectionId) -> Option<Binding> {
        let mut table = self.write();
        let binding = table.clear_binding(connection);
        table.sockets.remove(&connection);
        binding
    }

    /// Routes `connection` to `player` in `room`, replacing any earlier binding.
    pub fn bind(&self, connection: ConnectionId, room: &RoomCode, player: PlayerId) {
        let mut table = self.write();
        table.clear_binding(connection);
        let Some(socket) = table.sockets.get_mut(&connection) else {
            debug!(%connection, room = %room, "bind for a closed connection ignored");
            return;
        };
        socket.binding = Some(Binding {
            room: room.clone(),
            player,
        });
        table
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(connection);
    }

    /// Clears the binding of `connection`, but only if it points at `room`.
    pub fn unbind(&self, connection: ConnectionId, room: &RoomCode) {
        let mut table = self.write();
        let bound_here = table
            .sockets
            .get(&connection)
            .and_then(|s| s.binding.as_ref())
            .is_some_and(|b| &b.room == room);
        if bound_here {
            table.clear_binding(connection);
        }
    }

    /// Clears every binding to `room`.
    pub fn unbind_room(&self, room: &RoomCode) {
        let mut table = self.write();
        let members = table.rooms.remove(room).unwrap_or_default();
        for connection in members {
            if let Some(socket) = table.sockets.get_mut(&connection) {
                socket.binding = None;
            }
        }
    }

    /// The current binding of `connection`.
    #[must_use]
    pub fn binding(&self, connection: ConnectionId) -> Option<Binding> {
        self.read()
            .sockets
            .get(&connection)
            .and_then(|s| s.binding.clone())
    }

    /// Connections bound to `room`.
    #[must_use]
    pub fn members(&self, room: &RoomCode) -> Vec<ConnectionId> {
        let mut members: Vec<_> = self
            .read()
            .rooms
            .get(room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
    }

    /// Number of attached connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.read().sockets.len()
    }

    /// Queues `message` for one connection.
    pub fn send(&self, connection: ConnectionId, message: ServerMessage) {
        let table = self.read();
        if let Some(socket) = table.sockets.get(&connection) {
            deliver(connection, &socket.outbound, message);
        }
    }

    /// Queues `message` for every connection bound to `room`.
    pub fn broadcast(&self, room: &RoomCode, message: &ServerMessage) {
        let table = self.read();
        let Some(members) = table.rooms.get(room) else {
            return;
        };
        for connection in members {
            if let Some(socket) = table.sockets.get(connection) {
                deliver(*connection, &socket.outbound, message.clone());
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Table> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Table> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn deliver(connection: ConnectionId, outbound: &mpsc::Sender<ServerMessage>, message: ServerMessage) {
    match outbound.try_send(message) {
        Ok(()) => {}
        Err(TrySendError::Full(message)) => {
            warn!(
                %connection,
                event = message.event_name(),
                "outbound queue full, message dropped"
            );
        }
        Err(TrySendError::Closed(_)) => {
            debug!(%connection, "outbound queue closed");
        }
    }
}
