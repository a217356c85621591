//! GeoQuizz: synchronized multiplayer room engine.
//!
//! Keeps every participant of a room in lock-step: one shared photo per
//! round, one deadline, one ranked result. Each room is an independent actor
//! fed by a bounded command queue; inbound messages, timer firings and
//! disconnect notices for a room are all serialized through that queue.

pub mod application;
pub mod domain;
