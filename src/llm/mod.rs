//! Completion provider clients.
//!
//! - [`LLMClient`] - the trait every provider implements
//! - [`Provider`] - runtime provider selection from the `[llm]` config section
//! - [`DecodingConfig`] - fixed decoding presets per call site
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `openai` - any OpenAI-compatible chat completions endpoint (default)
//! - `ollama` - local Ollama server
//!
//! # Streaming
//!
//! `complete_stream` returns a [`TextStream`] whose fragments concatenate to
//! the complete text.

/// Core LLM client trait, decoding presets and provider selection.
pub mod client;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{DecodingConfig, LLMClient, Provider, TextStream};
