//! Great-circle distance and distance-based scoring.

use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// Mean Earth radius in kilometers (IUGG).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// A validated WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in `[-180, 180]`.
    pub longitude: f64,
}

impl Coordinate {
    /// Builds a coordinate, rejecting non-finite or out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InvalidInput` if either component is out of range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GameError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GameError::InvalidInput(format!(
                "latitude {latitude} is outside [-90, 90]"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GameError::InvalidInput(format!(
                "longitude {longitude} is outside [-180, 180]"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Haversine distance to `other` in kilometers.
    #[must_use]
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// Outcome of scoring one guess.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredGuess {
    /// Distance from the true location, rounded to 2 decimals.
    pub distance_km: f64,
    /// Points awarded.
    pub score: u32,
}

/// Maps a guess distance to points.
///
/// Inside `perfect_radius_km` the guess earns `max_score`; beyond `cap_km`
/// it earns nothing; in between the score halves every `half_life_km`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoScorer {
    /// Points for a perfect guess.
    pub max_score: u32,
    /// Distances below this earn `max_score`.
    pub perfect_radius_km: f64,
    /// Distances above this earn zero.
    pub cap_km: f64,
    /// Distance over which the score halves.
    pub half_life_km: f64,
}

impl Default for GeoScorer {
    fn default() -> Self {
        Self {
            max_score: 5000,
            perfect_radius_km: 1.0,
            cap_km: 2000.0,
            half_life_km: 250.0,
        }
    }
}

impl GeoScorer {
    /// Points for a guess `distance_km` away from the truth.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn score_distance(&self, distance_km: f64) -> u32 {
        if distance_km < self.perfect_radius_km {
            return self.max_score;
        }
        if distance_km > self.cap_km {
            return 0;
        }
        let decay = 2f64.powf(-distance_km / self.half_life_km);
        (f64::from(self.max_score) * decay).round() as u32
    }

    /// Scores `guess` against `truth`.
    #[must_use]
    pub fn score(&self, guess: &Coordinate, truth: &Coordinate) -> ScoredGuess {
        let distance_km = guess.distance_km(truth);
        ScoredGuess {
            distance_km: (distance_km * 100.0).round() / 100.0,
            score: self.score_distance(distance_km),
        }
    }
}
