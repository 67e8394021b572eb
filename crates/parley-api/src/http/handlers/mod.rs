//! REST API handlers.

pub mod chat;
pub mod health;
