//! Pure room domain: the aggregate, its protocol and the effects it emits.

pub mod aggregates;
pub mod commands;
pub mod effects;
pub mod events;
pub mod player;
pub mod room_code;
