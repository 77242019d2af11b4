//! Narrative layer for GrowthLens.
//!
//! Turns a computed metric set into a short prose summary by calling an
//! OpenAI-style chat-completions endpoint, and degrades to a templated
//! summary whenever the endpoint is slow, unreachable, or returns garbage.
//! This is the only crate that touches the network.

pub mod prompt;
pub mod sanitize;
pub mod service;
pub mod summarizer;

pub use service::{CompletionError, CompletionService, HttpCompletionService, ServiceConfig};
pub use summarizer::{NarrativeResult, Summarizer};
