//! Business logic and port trait definitions for Parley.
//!
//! This crate defines the "ports" (`ChatRepository`, `Bootstrapper`,
//! `CompletionClient`) that the infrastructure layer implements, plus the
//! chat orchestrator and bootstrap runner built on top of them. It depends
//! only on `parley-types` -- never on `parley-infra` or any database/IO crate.

pub mod bootstrap;
pub mod chat;
pub mod llm;
