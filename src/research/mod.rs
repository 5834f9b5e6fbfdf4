//! Research Orchestration
//!
//! Fans a query out into search and synthesis calls against external
//! providers and aggregates the results according to one of three strategies.
//!
//! # Architecture
//!
//! - [`filter`] - Source Quality Filter (pure)
//! - [`dispatcher::QueryDispatcher`] - one search call per sub-query, filtered and capped
//! - [`synthesis::SynthesisInvoker`] - one provider call with retry and step tagging
//! - [`strategy::Strategy`] - `Basic | Deep | MultiAgent`, each with its own aggregation
//!
//! # Usage
//!
//! ```ignore
//! use mathmatika::research::{ResearchEngine, Strategy};
//! use mathmatika::types::Query;
//!
//! let query = Query::with_min_length("explain L'Hopital's rule")?;
//! let result = Strategy::Deep.run(&engine, &query).await?;
//! println!("{} sources", result.source_count());
//! ```
//!
//! # Failure handling
//!
//! Empty searches, failed follow-up steps and failed subagents degrade in
//! place. Only the first synthesis of Basic and Deep, and Multi-Agent's
//! decomposition and integration, end a run in `failed`.

pub mod basic;
pub mod deep;
pub mod dispatcher;
pub mod filter;
pub mod multi_agent;
pub mod phase;
pub mod retry;
pub mod strategy;
pub mod synthesis;

pub use dispatcher::{Dispatch, QueryDispatcher};
pub use filter::{SourceDocument, filter_sources};
pub use multi_agent::{SubagentResult, Subtask, SubtaskLabel};
pub use phase::ResearchPhase;
pub use retry::RetryPolicy;
pub use strategy::{
    BasicResult, DeepResult, MultiAgentResult, ResearchEngine, Strategy, SynthesisResult,
};
pub use synthesis::SynthesisInvoker;
