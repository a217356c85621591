//! JSON-manifest implementation of the `PhotoSource` trait.
//!
//! The manifest is an array of `{ "id", "url", "latitude", "longitude" }`
//! objects. It is read and validated once; every draw shuffles a copy of the
//! catalog and hands out its head.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use geoquizz_core::error::GameError;
use geoquizz_core::geo::Coordinate;
use geoquizz_core::photo::{Photo, PhotoSource};
use geoquizz_core::rng::{DeterministicRng, shuffle};

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    id: String,
    url: String,
    latitude: f64,
    longitude: f64,
}

/// In-memory photo catalog loaded from a JSON manifest.
pub struct JsonPhotoCatalog {
    photos: Vec<Photo>,
    rng: Mutex<Box<dyn DeterministicRng>>,
}

impl std::fmt::Debug for JsonPhotoCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonPhotoCatalog")
            .field("photos", &self.photos.len())
            .finish_non_exhaustive()
    }
}

impl JsonPhotoCatalog {
    /// Reads and validates the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns `GameError::Infrastructure` if the file cannot be read or is
    /// not a JSON array of entries, and `GameError::InvalidInput` if an entry
    /// has an empty id, a duplicate id or an out-of-range coordinate.
    pub async fn load(
        path: impl AsRef<Path>,
        rng: Box<dyn DeterministicRng>,
    ) -> Result<Self, GameError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            GameError::Infrastructure(format!("cannot read photo catalog {}: {e}", path.display()))
        })?;
        let catalog = Self::from_json(&raw, rng)?;
        info!(path = %path.display(), photos = catalog.len(), "photo catalog loaded");
        Ok(catalog)
    }

    /// Parses a manifest held in memory.
    ///
    /// # Errors
    ///
    /// Same as [`JsonPhotoCatalog::load`], minus the read failure.
    pub fn from_json(raw: &str, rng: Box<dyn DeterministicRng>) -> Result<Self, GameError> {
        let entries: Vec<ManifestEntry> = serde_json::from_str(raw)
            .map_err(|e| GameError::Infrastructure(format!("malformed photo catalog: {e}")))?;

        let mut seen = HashSet::new();
        let mut photos = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.id.trim().is_empty() {
                return Err(GameError::InvalidInput("photo with an empty id".to_owned()));
            }
            if !seen.insert(entry.id.clone()) {
                return Err(GameError::InvalidInput(format!(
                    "duplicate photo id {}",
                    entry.id
                )));
            }
            let location = Coordinate::new(entry.latitude, entry.longitude).map_err(|e| {
                GameError::InvalidInput(format!("photo {}: {e}", entry.id))
            })?;
            photos.push(Photo {
                id: entry.id,
                url: entry.url,
                location,
            });
        }

        Ok(Self {
            photos,
            rng: Mutex::new(rng),
        })
    }

    /// Number of photos in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.photos.len()
    }

    /// Whether the catalog has no photos.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }
}

#[async_trait]
impl PhotoSource for JsonPhotoCatalog {
    async fn draw(&self, count: usize) -> Result<Vec<Photo>, GameError> {
        let mut deck = self.photos.clone();
        {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            shuffle(&mut deck, rng.as_mut());
        }
        deck.truncate(count);
        debug!(requested = count, drawn = deck.len(), "photo deck drawn");
        Ok(deck)
    }
}
