//! Completion client implementations.
//!
//! Contains the concrete [`CompletionClient`] for OpenAI-compatible chat
//! completion APIs, which covers OpenAI itself and the many gateways and
//! local servers that speak the same wire format.
//!
//! [`CompletionClient`]: parley_core::llm::client::CompletionClient

pub mod openai_compat;
