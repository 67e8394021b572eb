//! Shared domain types for Parley.
//!
//! This crate contains the domain types used across the workspace: chats,
//! messages, completion requests, the bootstrap marker, configuration, and
//! their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod bootstrap;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
