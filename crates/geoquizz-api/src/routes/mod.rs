//! Route modules.

pub mod health;
pub mod rooms;
pub mod ws;

use axum::Router;

use crate::state::AppState;

/// Builds the full application router, without middleware layers.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(ws::router())
        .nest("/api/v1/rooms", rooms::router())
        .with_state(state)
}
