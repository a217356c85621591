//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use geoquizz_rooms::application::settings::GameSettings;

use crate::error::AppError;

/// Everything the server binary needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address.
    pub addr: SocketAddr,
    /// JSON manifest of playable photos.
    pub photo_catalog: PathBuf,
    /// Finished-game history file.
    pub game_records: PathBuf,
    /// Prefix of generated join links.
    pub public_base_url: String,
    /// Engine tunables.
    pub settings: GameSettings,
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable if it is set.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parsed(&lookup, "PORT")?.unwrap_or(3000);
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;

        let mut settings = GameSettings::default();
        if let Some(max_rooms) = parsed::<usize>(&lookup, "MAX_ROOMS")? {
            if max_rooms == 0 {
                return Err(AppError::Config("MAX_ROOMS must be at least 1".into()));
            }
            settings.max_rooms = max_rooms;
        }

        let timings = &mut settings.timings;
        if let Some(seconds) = parsed(&lookup, "COUNTDOWN_SECONDS")? {
            timings.countdown_seconds = seconds;
        }
        if let Some(round) = duration(&lookup, "ROUND_SECONDS")? {
            timings.round = round;
        }
        if let Some(window) = duration(&lookup, "PAUSE_SECONDS")? {
            timings.pause_window = window;
        }
        if let Some(window) = duration(&lookup, "GRACE_SECONDS")? {
            timings.grace_window = window;
        }
        if let Some(timeout) = duration(&lookup, "IDLE_SECONDS")? {
            timings.idle_timeout = timeout;
        }
        timings.auto_advance = duration(&lookup, "AUTO_ADVANCE_SECONDS")?;

        Ok(Self {
            addr,
            photo_catalog: lookup("PHOTO_CATALOG")
                .map_or_else(|| PathBuf::from("data/photos.json"), PathBuf::from),
            game_records: lookup("GAME_RECORDS")
                .map_or_else(|| PathBuf::from("data/games.json"), PathBuf::from),
            public_base_url: lookup("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            settings,
        })
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| AppError::Config(format!("{key} is invalid: {e}")))
        })
        .transpose()
}

/// A positive number of whole seconds.
fn duration(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Duration>, AppError> {
    match parsed::<u64>(lookup, key)? {
        Some(0) => Err(AppError::Config(format!("{key} must be at least 1"))),
        Some(seconds) => Ok(Some(Duration::from_secs(seconds))),
        None => Ok(None),
    }
}
