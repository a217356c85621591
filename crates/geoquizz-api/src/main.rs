//! GeoQuizz multiplayer server entry point.

use std::sync::Arc;

use geoquizz_api::config::ServerConfig;
use geoquizz_api::error::AppError;
use geoquizz_api::routes;
use geoquizz_api::state::AppState;
use geoquizz_catalog::{JsonFileGameRecords, JsonPhotoCatalog};
use geoquizz_core::clock::SystemClock;
use geoquizz_core::rng::SystemRng;
use geoquizz_rooms::application::connection::ConnectionManager;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting GeoQuizz multiplayer server");

    let config = ServerConfig::from_env()?;

    let photos = JsonPhotoCatalog::load(&config.photo_catalog, Box::new(SystemRng::new())).await?;
    if photos.is_empty() {
        tracing::warn!(
            path = %config.photo_catalog.display(),
            "photo catalog is empty, room creation will fail"
        );
    }
    let records = JsonFileGameRecords::new(&config.game_records);

    let manager = ConnectionManager::new(
        config.settings,
        Arc::new(photos),
        Arc::new(records),
        Arc::new(SystemClock),
        Box::new(SystemRng::new()),
    );
    let app_state = AppState::new(Arc::new(manager), &config.public_base_url);

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = routes::app(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
