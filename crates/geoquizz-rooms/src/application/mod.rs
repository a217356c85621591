//! Runtime plumbing around the room aggregate.

pub mod connection;
pub mod engine;
pub mod fanout;
pub mod query_handlers;
pub mod registry;
pub mod scheduler;
pub mod settings;
