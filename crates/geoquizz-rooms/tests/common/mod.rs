//! Shared helpers for room engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use geoquizz_rooms::application::connection::ConnectionManager;
use geoquizz_rooms::application::settings::GameSettings;
use geoquizz_rooms::domain::aggregates::RoomTimings;
use geoquizz_rooms::domain::commands::ClientMessage;
use geoquizz_rooms::domain::events::{JoinedRoom, ServerMessage};
use geoquizz_rooms::domain::player::ConnectionId;
use geoquizz_test_support::{FixedClock, RecordingGameRecords, SequenceRng, StaticPhotoSource};
use tokio::sync::mpsc;

/// How long a test waits for an expected message, in virtual time.
const RECV_TIMEOUT: Duration = Duration::from_secs(900);

/// A manager wired to deterministic doubles.
pub struct Harness {
    pub manager: ConnectionManager,
    pub records: Arc<RecordingGameRecords>,
}

/// Build a harness whose photos all sit at `(10, 10)`.
pub fn harness() -> Harness {
    harness_with(RoomTimings::default())
}

/// Build a harness with custom room timings.
pub fn harness_with(timings: RoomTimings) -> Harness {
    let records = Arc::new(RecordingGameRecords::new());
    let settings = GameSettings {
        timings,
        ..GameSettings::default()
    };
    let manager = ConnectionManager::new(
        settings,
        Arc::new(StaticPhotoSource::uniform(10)),
        records.clone(),
        Arc::new(FixedClock::default_instant()),
        Box::new(SequenceRng::new((0..32).collect())),
    );
    Harness { manager, records }
}

/// One simulated transport connection.
pub struct Client {
    pub connection: ConnectionId,
    inbox: mpsc::Receiver<ServerMessage>,
}

impl Client {
    /// Open a connection on `harness`.
    pub fn connect(harness: &Harness) -> Self {
        let (tx, inbox) = mpsc::channel(256);
        let connection = harness.manager.connect(tx);
        Self { connection, inbox }
    }

    /// Send one client message through the manager.
    pub async fn send(&self, harness: &Harness, message: ClientMessage) {
        harness.manager.handle(self.connection, message).await;
    }

    /// Drop the connection.
    pub async fn disconnect(&self, harness: &Harness) {
        harness.manager.disconnect(self.connection).await;
    }

    /// Wait for the next message.
    pub async fn recv(&mut self) -> ServerMessage {
        tokio::time::timeout(RECV_TIMEOUT, self.inbox.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("outbound queue closed")
    }

    /// Skip messages until one matches `pred`.
    pub async fn recv_until(&mut self, pred: impl Fn(&ServerMessage) -> bool) -> ServerMessage {
        loop {
            let message = self.recv().await;
            if pred(&message) {
                return message;
            }
        }
    }

    /// Everything queued right now.
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.inbox.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Wait for `joined_room`.
    pub async fn joined(&mut self) -> JoinedRoom {
        match self
            .recv_until(|m| matches!(m, ServerMessage::JoinedRoom(_)))
            .await
        {
            ServerMessage::JoinedRoom(joined) => joined,
            _ => unreachable!(),
        }
    }
}

pub fn create_room(host_name: &str, num_rounds: usize) -> ClientMessage {
    ClientMessage::CreateRoom {
        room_name: Some("Test room".into()),
        host_name: host_name.into(),
        num_rounds: Some(num_rounds),
    }
}

pub fn join_room(room_id: &str, player_name: &str, session_token: Option<&str>) -> ClientMessage {
    ClientMessage::JoinRoom {
        room_id: room_id.into(),
        player_name: player_name.into(),
        session_token: session_token.map(str::to_owned),
    }
}

pub fn guess(latitude: f64, longitude: f64) -> ClientMessage {
    ClientMessage::SubmitGuess {
        latitude,
        longitude,
    }
}

pub fn is_round_started(message: &ServerMessage) -> bool {
    matches!(message, ServerMessage::RoundStarted(_))
}

pub fn is_round_results(message: &ServerMessage) -> bool {
    matches!(message, ServerMessage::RoundResults(_))
}

/// Host `a` and guest `b` in a fresh room, both ready, round 0 running.
/// Returns the clients and their `joined_room` payloads.
pub async fn start_game(
    harness: &Harness,
    num_rounds: usize,
) -> (Client, JoinedRoom, Client, JoinedRoom) {
    let mut a = Client::connect(harness);
    let mut b = Client::connect(harness);
    a.send(harness, create_room("Ada", num_rounds)).await;
    let joined_a = a.joined().await;
    b.send(harness, join_room(joined_a.room_id.as_str(), "Bo", None))
        .await;
    let joined_b = b.joined().await;
    a.send(harness, ClientMessage::PlayerReady { ready: true })
        .await;
    b.send(harness, ClientMessage::PlayerReady { ready: true })
        .await;
    a.send(harness, ClientMessage::StartGame).await;
    a.recv_until(is_round_started).await;
    b.recv_until(is_round_started).await;
    (a, joined_a, b, joined_b)
}

/// Assert that `expected` virtual time has passed since `start`, allowing
/// for timer-wheel rounding.
pub fn assert_elapsed(start: tokio::time::Instant, expected: Duration) {
    let elapsed = start.elapsed();
    let slack = Duration::from_millis(10);
    assert!(
        elapsed + slack >= expected && elapsed <= expected + slack,
        "expected about {expected:?}, got {elapsed:?}"
    );
}
