//! Read-only room endpoints: info, leaderboard and join link.

use axum::extract::{Path, State};
use axum::{Json, Router, routing::get};
use serde::Serialize;
use tracing::instrument;

use geoquizz_rooms::application::query_handlers;
use geoquizz_rooms::domain::events::{RankingEntry, RoomSnapshot};

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for GET /{code}/join-link.
#[derive(Debug, Serialize)]
pub struct JoinLinkResponse {
    /// Canonical room code.
    pub room_id: String,
    /// Link that opens the client with the room preselected.
    pub url: String,
}

/// GET /{code}
#[instrument(skip(state))]
async fn get_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RoomSnapshot>, ApiError> {
    let snapshot = query_handlers::get_room(state.manager.registry(), &code).await?;
    Ok(Json(snapshot))
}

/// GET /{code}/leaderboard
#[instrument(skip(state))]
async fn get_leaderboard(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Vec<RankingEntry>>, ApiError> {
    let ranking = query_handlers::get_leaderboard(state.manager.registry(), &code).await?;
    Ok(Json(ranking))
}

/// GET /{code}/join-link
#[instrument(skip(state))]
async fn get_join_link(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<JoinLinkResponse>, ApiError> {
    let handle = state.manager.registry().get(&code)?;
    let room_id = handle.code().to_string();
    Ok(Json(JoinLinkResponse {
        url: join_url(&state.public_base_url, &room_id),
        room_id,
    }))
}

fn join_url(base: &str, room_id: &str) -> String {
    format!("{base}/?room={room_id}")
}

/// Returns the router for room queries.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{code}", get(get_room))
        .route("/{code}/leaderboard", get(get_leaderboard))
        .route("/{code}/join-link", get(get_join_link))
}
