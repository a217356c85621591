//! Side effects requested by the room aggregate.
//!
//! The aggregate never touches sockets or timers. Each command handler
//! pushes effects onto a list that the engine interprets in order.

use std::time::Duration;

use geoquizz_core::record::GameRecord;

use super::events::ServerMessage;
use super::player::{ConnectionId, PlayerId};

/// The timers a room can have pending. At most one of each kind is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomTimer {
    /// One second of the pre-round countdown.
    CountdownTick,
    /// One second of an active round.
    RoundTick,
    /// The round deadline.
    RoundExpired,
    /// One second of the pause window.
    PauseTick,
    /// The end of the pause window.
    PauseExpired,
    /// Automatic move past round results.
    AutoAdvance,
    /// No inbound command for the idle timeout.
    Idle,
}

/// One instruction for the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Deliver to every connection bound to the room.
    Broadcast(ServerMessage),
    /// Deliver to one connection.
    Send {
        /// Recipient.
        connection: ConnectionId,
        /// Payload.
        message: ServerMessage,
    },
    /// Route the connection's future actions to `player` in this room.
    Bind {
        /// The connection to bind.
        connection: ConnectionId,
        /// The player it now speaks for.
        player: PlayerId,
    },
    /// Stop routing the connection to this room.
    Unbind {
        /// The connection to release.
        connection: ConnectionId,
    },
    /// Arm `timer`, replacing any pending timer of the same kind.
    Schedule {
        /// Which timer.
        timer: RoomTimer,
        /// Delay before the first firing; also the period when periodic.
        delay: Duration,
        /// Fire every `delay` until cancelled.
        periodic: bool,
    },
    /// Disarm `timer` if pending.
    Cancel(RoomTimer),
    /// Hand a finished game to the history sink.
    Record(GameRecord),
    /// Cancel everything and drop the room.
    Close,
}

impl Effect {
    /// A one-shot timer.
    #[must_use]
    pub fn after(timer: RoomTimer, delay: Duration) -> Self {
        Self::Schedule {
            timer,
            delay,
            periodic: false,
        }
    }

    /// A periodic timer.
    #[must_use]
    pub fn every(timer: RoomTimer, period: Duration) -> Self {
        Self::Schedule {
            timer,
            delay: period,
            periodic: true,
        }
    }
}
