//! Websocket endpoint.
//!
//! Each socket is split in two: a writer task drains the connection's
//! outbound queue into text frames while the reader decodes inbound frames
//! and hands them to the `ConnectionManager`, one at a time.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::{Router, routing::get};
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use geoquizz_rooms::application::connection::ConnectionManager;
use geoquizz_rooms::application::fanout::OUTBOUND_CAPACITY;
use geoquizz_rooms::domain::commands::ClientMessage;
use geoquizz_rooms::domain::events::{INVALID_MESSAGE_CODE, ServerMessage};
use geoquizz_rooms::domain::player::ConnectionId;

use crate::state::AppState;

/// GET /ws
async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let manager = state.manager.clone();
    ws.on_upgrade(move |socket| drive(manager, socket))
}

async fn drive(manager: Arc<ConnectionManager>, socket: WebSocket) {
    let (outbound, inbox) = mpsc::channel(OUTBOUND_CAPACITY);
    let connection = manager.connect(outbound);
    serve(&manager, connection, socket, inbox).await;
}

#[instrument(skip_all, fields(connection = %connection))]
async fn serve(
    manager: &ConnectionManager,
    connection: ConnectionId,
    socket: WebSocket,
    mut inbox: mpsc::Receiver<ServerMessage>,
) {
    info!("websocket connected");
    let (mut sink, stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(message) = inbox.recv().await {
            if sink.send(Message::Text(message.encode().into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    read_frames(manager, connection, stream).await;
    writer.abort();
    info!("websocket disconnected");
}

/// What the reader does with one inbound frame.
#[derive(Debug, PartialEq)]
enum Inbound {
    Deliver(ClientMessage),
    Reject(ServerMessage),
    Skip,
    Close,
}

fn classify(frame: Result<Message, axum::Error>) -> Inbound {
    match frame {
        Ok(Message::Text(text)) => match ClientMessage::decode(text.as_str()) {
            Ok(message) => Inbound::Deliver(message),
            Err(e) => Inbound::Reject(unreadable(e.to_string())),
        },
        Ok(Message::Binary(_)) => {
            Inbound::Reject(unreadable("binary frames are not supported".to_owned()))
        }
        Ok(Message::Ping(_) | Message::Pong(_)) => Inbound::Skip,
        Ok(Message::Close(_)) => Inbound::Close,
        Err(e) => {
            debug!(error = %e, "websocket read failed");
            Inbound::Close
        }
    }
}

/// Feeds frames to the manager until the peer goes away, then reports the
/// disconnect.
async fn read_frames<S>(manager: &ConnectionManager, connection: ConnectionId, mut stream: S)
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match classify(frame) {
            Inbound::Deliver(message) => manager.handle(connection, message).await,
            Inbound::Reject(error) => manager.fanout().send(connection, error),
            Inbound::Skip => {}
            Inbound::Close => break,
        }
    }
    manager.disconnect(connection).await;
}

fn unreadable(message: String) -> ServerMessage {
    ServerMessage::Error {
        message,
        code: INVALID_MESSAGE_CODE.to_owned(),
    }
}

/// Returns the websocket router.
pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}
