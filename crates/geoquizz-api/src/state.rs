//! Shared application state.

use std::sync::Arc;

use geoquizz_rooms::application::connection::ConnectionManager;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Routes websocket connections to room engines.
    pub manager: Arc<ConnectionManager>,
    /// Prefix of generated join links, without a trailing slash.
    pub public_base_url: Arc<str>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>, public_base_url: &str) -> Self {
        Self {
            manager,
            public_base_url: Arc::from(public_base_url.trim_end_matches('/')),
        }
    }
}
