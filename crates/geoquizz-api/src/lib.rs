//! GeoQuizz API: HTTP and websocket surface of the room engine.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
