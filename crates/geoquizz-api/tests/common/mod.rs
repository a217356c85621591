//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use geoquizz_api::routes;
use geoquizz_api::state::AppState;
use geoquizz_rooms::application::connection::ConnectionManager;
use geoquizz_rooms::application::settings::GameSettings;
use geoquizz_rooms::domain::commands::ClientMessage;
use geoquizz_rooms::domain::events::{JoinedRoom, ServerMessage};
use geoquizz_test_support::{FixedClock, RecordingGameRecords, SequenceRng, StaticPhotoSource};

/// Base URL used for join links in tests.
pub const BASE_URL: &str = "https://geoquizz.test";

/// A manager wired to deterministic doubles.
pub fn test_manager() -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::new(
        GameSettings::default(),
        Arc::new(StaticPhotoSource::uniform(10)),
        Arc::new(RecordingGameRecords::new()),
        Arc::new(FixedClock::default_instant()),
        Box::new(SequenceRng::new((0..32).collect())),
    ))
}

/// Build the full app router around `manager`. Uses the same route
/// structure as `main.rs`.
pub fn build_test_app(manager: Arc<ConnectionManager>) -> Router {
    routes::app(AppState::new(manager, BASE_URL))
}

/// Open a room hosted by `host` through the manager, the way a websocket
/// client would. Returns the host's join confirmation.
pub async fn open_room(
    manager: &ConnectionManager,
    host: &str,
) -> (JoinedRoom, mpsc::Receiver<ServerMessage>) {
    let (tx, mut rx) = mpsc::channel(64);
    let connection = manager.connect(tx);
    manager
        .handle(
            connection,
            ClientMessage::CreateRoom {
                room_name: Some("Api room".into()),
                host_name: host.into(),
                num_rounds: Some(3),
            },
        )
        .await;
    match rx.recv().await.unwrap() {
        ServerMessage::JoinedRoom(joined) => (joined, rx),
        other => panic!("expected joined_room, got {other:?}"),
    }
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
