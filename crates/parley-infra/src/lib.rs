//! Infrastructure layer for Parley.
//!
//! Contains implementations of the port traits defined in `parley-core`:
//! SQLite and PostgreSQL storage and bootstrap coordination, the backend
//! selector (`database::Database`), the OpenAI-compatible completion client,
//! and the configuration loader.

pub mod config;
pub mod database;
pub mod llm;
pub mod postgres;
pub mod sqlite;
