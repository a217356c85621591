//! Test photo source handing out a fixed deck in order.

use async_trait::async_trait;
use geoquizz_core::error::GameError;
use geoquizz_core::geo::Coordinate;
use geoquizz_core::photo::{Photo, PhotoSource};

/// Builds a photo with id `photo-{index}` located at `(latitude, longitude)`.
///
/// # Panics
///
/// Panics if the coordinate is out of range.
#[must_use]
pub fn photo_at(index: usize, latitude: f64, longitude: f64) -> Photo {
    Photo {
        id: format!("photo-{index}"),
        url: format!("/photos/{index}.jpg"),
        location: Coordinate::new(latitude, longitude).expect("test coordinate in range"),
    }
}

/// A photo source that always returns the first `count` photos of its deck.
#[derive(Debug, Clone, Default)]
pub struct StaticPhotoSource {
    photos: Vec<Photo>,
}

impl StaticPhotoSource {
    /// Creates a source over `photos`.
    #[must_use]
    pub fn new(photos: Vec<Photo>) -> Self {
        Self { photos }
    }

    /// A source with `count` photos, all located at `(10, 10)`.
    #[must_use]
    pub fn uniform(count: usize) -> Self {
        Self::new((0..count).map(|i| photo_at(i, 10.0, 10.0)).collect())
    }
}

#[async_trait]
impl PhotoSource for StaticPhotoSource {
    async fn draw(&self, count: usize) -> Result<Vec<Photo>, GameError> {
        Ok(self.photos.iter().take(count).cloned().collect())
    }
}
