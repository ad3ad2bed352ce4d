//! doctag - document ingestion with AI-generated tags and summaries.
//!
//! Uploaded artifacts are turned into text, tagged and summarized by an
//! OpenAI-compatible model (with deterministic keyword fallbacks), and kept in
//! a small persisted store whose changes fan out to any number of views.

pub mod config;
pub mod extract;
pub mod llm;
pub mod models;
pub mod notify;
pub mod open;
pub mod pipeline;
pub mod storage;
pub mod store;
pub mod utils;
pub mod view;
