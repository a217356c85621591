//! Photo source abstraction.
//!
//! Photo discovery and EXIF extraction live outside the engine. A room only
//! needs a deck of photos with their true locations, drawn once at creation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::geo::Coordinate;

/// A geolocated photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    /// Stable photo identifier.
    pub id: String,
    /// Reference the client uses to fetch the image.
    pub url: String,
    /// Where the photo was taken.
    pub location: Coordinate,
}

/// Supplies photo decks to new rooms.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    /// Draw up to `count` distinct photos in play order.
    ///
    /// The result may be shorter than `count` when the catalog is small.
    async fn draw(&self, count: usize) -> Result<Vec<Photo>, GameError>;
}
