//! Text-generation collaborator boundary.
//!
//! Defines the [`TextGenerator`](generator::TextGenerator) trait the
//! pipeline drives once per chunk, an HTTP chat-completion client for the
//! supported LLM providers, the prompt templates sent to them, and the
//! rate-limiting and retry/backoff layers that absorb transient failures
//! before they reach the pipeline.

pub mod client;
pub mod error;
pub mod generator;
pub mod provider;
pub mod rate_limit;
pub mod retry;
pub mod templates;
