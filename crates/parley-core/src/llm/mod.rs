//! Completion client abstraction for Parley.
//!
//! `CompletionClient` is the port the orchestrator calls; the OpenAI-compatible
//! HTTP adapter lives in parley-infra.

pub mod client;
