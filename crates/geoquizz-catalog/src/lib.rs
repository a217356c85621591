//! GeoQuizz Catalog: file-backed adapters for the room engine's external
//! collaborators.
//!
//! `JsonPhotoCatalog` serves photo decks from a JSON manifest produced by
//! whatever tool extracted the photos' GPS positions. `JsonFileGameRecords`
//! appends finished games to a JSON history file.

pub mod photos;
pub mod records;

pub use photos::JsonPhotoCatalog;
pub use records::JsonFileGameRecords;
