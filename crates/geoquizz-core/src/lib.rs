//! GeoQuizz Core: shared domain abstractions.
//!
//! This crate defines the fundamental traits and types that the room engine
//! and its adapters depend on. It contains no infrastructure code.

pub mod clock;
pub mod error;
pub mod geo;
pub mod photo;
pub mod record;
pub mod rng;
