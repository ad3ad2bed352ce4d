//! Remote tag/summary generation and its local fallback.

pub mod client;
pub mod fallback;
pub mod generator;
pub mod parse;

pub use client::{CompletionBackend, CompletionRequest, LlmClient, LlmConfig, LlmError};
pub use generator::{CallOutcome, GenerationState, Generated, TagGenerator};
