//! Shared test mocks and utilities for the GeoQuizz multiplayer engine.

mod clock;
mod photos;
mod records;
mod rng;

pub use clock::FixedClock;
pub use photos::{StaticPhotoSource, photo_at};
pub use records::{FailingGameRecords, RecordingGameRecords};
pub use rng::{MockRng, SequenceRng};
