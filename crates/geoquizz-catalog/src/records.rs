//! JSON-file implementation of the `GameRecordRepository` trait.
//!
//! The history file holds one JSON array of finished games, oldest first.
//! Appends rewrite the whole file through a sibling temporary file so a crash
//! mid-write never leaves a truncated history behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use geoquizz_core::error::GameError;
use geoquizz_core::record::{GameRecord, GameRecordRepository};

/// Append-only game history stored in a single JSON file.
#[derive(Debug)]
pub struct JsonFileGameRecords {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileGameRecords {
    /// Creates a repository backed by `path`. The file is created on the
    /// first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The history file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every recorded game. A missing file is an empty history.
    ///
    /// # Errors
    ///
    /// Returns `GameError::Infrastructure` if the file exists but cannot be
    /// read or parsed.
    pub async fn load_all(&self) -> Result<Vec<GameRecord>, GameError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                GameError::Infrastructure(format!(
                    "malformed game history {}: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(io_error(&self.path, &e)),
        }
    }
}

#[async_trait]
impl GameRecordRepository for JsonFileGameRecords {
    async fn record_game(&self, record: &GameRecord) -> Result<(), GameError> {
        let _guard = self.write_lock.lock().await;

        let mut games = match self.load_all().await {
            Ok(games) => games,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable game history replaced");
                Vec::new()
            }
        };
        games.push(record.clone());

        let body = serde_json::to_vec_pretty(&games)
            .map_err(|e| GameError::Infrastructure(format!("cannot encode game history: {e}")))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, &e))?;
        }
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, body)
            .await
            .map_err(|e| io_error(&staging, &e))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| io_error(&self.path, &e))?;

        debug!(
            path = %self.path.display(),
            room = %record.room_code,
            games = games.len(),
            "game history appended"
        );
        Ok(())
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> GameError {
    GameError::Infrastructure(format!("game history {}: {err}", path.display()))
}
