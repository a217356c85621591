//! Mock `GameRecordRepository` implementations.

use std::sync::Mutex;

use async_trait::async_trait;
use geoquizz_core::error::GameError;
use geoquizz_core::record::{GameRecord, GameRecordRepository};

/// A record sink that keeps every game it is handed.
#[derive(Debug, Default)]
pub struct RecordingGameRecords {
    recorded: Mutex<Vec<GameRecord>>,
}

impl RecordingGameRecords {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded games.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn recorded(&self) -> Vec<GameRecord> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl GameRecordRepository for RecordingGameRecords {
    async fn record_game(&self, record: &GameRecord) -> Result<(), GameError> {
        self.recorded.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// A record sink that always returns an infrastructure error. Useful for
/// checking that persistence failures never reach players.
#[derive(Debug)]
pub struct FailingGameRecords;

#[async_trait]
impl GameRecordRepository for FailingGameRecords {
    async fn record_game(&self, _record: &GameRecord) -> Result<(), GameError> {
        Err(GameError::Infrastructure("disk full".into()))
    }
}
