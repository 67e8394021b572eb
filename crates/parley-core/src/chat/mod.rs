//! Chat persistence port and orchestration for Parley.
//!
//! - `repository`: the `ChatRepository` trait implemented by parley-infra
//! - `service`: `ChatOrchestrator`, the start/continue/retry workflows
//! - `prompt`: fixed prompts, input validation and title cleanup

pub mod prompt;
pub mod repository;
pub mod service;
