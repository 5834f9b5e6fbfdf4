//! # Mathmatika - Research Orchestration Server
//!
//! Answers research questions by fanning a query out into web searches and
//! LLM synthesis calls, and streams tutoring chat and document-grounded
//! answers as self-delimited frames.
//!
//! ## Overview
//!
//! Mathmatika can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `mathmatika-server` binary
//! 2. **As a library** - Embed the research engine or the stream consumer
//!
//! ### Running a strategy
//!
//! ```rust,ignore
//! use mathmatika::research::{QueryDispatcher, ResearchEngine, RetryPolicy, Strategy, SynthesisInvoker};
//! use mathmatika::search::DuckDuckGoSearch;
//! use mathmatika::types::Query;
//! use std::{sync::Arc, time::Duration};
//!
//! let llm = provider.create_client()?;
//! let engine = ResearchEngine::new(
//!     QueryDispatcher::new(Arc::new(DuckDuckGoSearch::default()), Duration::from_secs(20)),
//!     SynthesisInvoker::new(llm, RetryPolicy::default()),
//! );
//! let query = Query::with_min_length("explain L'Hopital's rule")?;
//! let result = Strategy::MultiAgent.run(&engine, &query).await?;
//! ```
//!
//! ### Consuming a stream
//!
//! ```rust,ignore
//! use mathmatika::client::StreamConsumer;
//!
//! let consumer = StreamConsumer::new("http://127.0.0.1:8000")?;
//! let outcome = consumer
//!     .exchange()
//!     .run("/chat/stream", &request, &mut handler)
//!     .await;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `openai` | OpenAI-compatible chat completions (default) |
//! | `ollama` | Ollama local inference |
//!
//! ## Modules
//!
//! - [`research`] - filter, dispatcher, invoker and the three strategies
//! - [`streaming`] - frame encoding and incremental decoding
//! - [`client`] - stream consumer with cancellation
//! - [`chat`] / [`rag`] - streamed chat and document-grounded Q&A
//! - [`api`] - REST handlers and routes
//! - [`types`] - common types and error handling

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Streamed tutoring chat.
pub mod chat;
/// Command-line interface definitions and output.
pub mod cli;
/// Consumer side of the streaming protocol.
pub mod client;
/// LLM provider clients and abstractions.
pub mod llm;
/// Document upload and grounded Q&A.
pub mod rag;
/// Research strategies and their building blocks.
pub mod research;
/// Web search providers.
pub mod search;
/// Stream frame protocol.
pub mod streaming;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use llm::{LLMClient, Provider};
pub use research::{ResearchEngine, Strategy};
pub use types::{AppError, Result};
pub use utils::config::AppConfig;

use crate::chat::ChatService;
use crate::llm::DecodingConfig;
use crate::rag::{DocumentIndex, LocalDocumentIndex, RagService};
use crate::research::{QueryDispatcher, RetryPolicy, SynthesisInvoker};
use crate::search::{DuckDuckGoSearch, SearchProvider};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration
    pub config: Arc<AppConfig>,
    /// Research strategies
    pub engine: Arc<ResearchEngine>,
    /// Streamed tutoring chat
    pub chat: Arc<ChatService>,
    /// Document indexes and grounded answers
    pub rag: Arc<RagService>,
}

impl AppState {
    /// Wire the services from configuration with the default providers.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let llm = Provider::from_config(&config.llm)?.create_client()?;
        let search: Arc<dyn SearchProvider> = Arc::new(DuckDuckGoSearch::new(&config.search));
        let index: Arc<dyn DocumentIndex> = Arc::new(LocalDocumentIndex::new());
        Self::with_providers(config, llm, search, index)
    }

    /// Wire the services around explicit providers.
    pub fn with_providers(
        config: AppConfig,
        llm: Arc<dyn LLMClient>,
        search: Arc<dyn SearchProvider>,
        index: Arc<dyn DocumentIndex>,
    ) -> Result<Self> {
        tracing::info!(model = %llm.model_name(), "Completion provider ready");
        let invoker = SynthesisInvoker::new(llm, RetryPolicy::from_config(&config.retry));
        let dispatcher = QueryDispatcher::new(search, config.search.timeout());
        let engine = ResearchEngine::new(dispatcher, invoker.clone())
            .with_synthesis_temperature(config.llm.temperature);

        let answer = DecodingConfig {
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
        };
        let chat = ChatService::new(invoker.clone(), answer);
        let rag = RagService::new(index, invoker, config.rag.clone(), answer)?;

        Ok(Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            chat: Arc::new(chat),
            rag: Arc::new(rag),
        })
    }
}
