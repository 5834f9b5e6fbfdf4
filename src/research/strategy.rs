//! Strategy selection, result shapes and the shared engine handle.

use crate::llm::DecodingConfig;
use crate::research::dispatcher::QueryDispatcher;
use crate::research::filter::SourceDocument;
use crate::research::multi_agent::SubagentResult;
use crate::research::synthesis::SynthesisInvoker;
use crate::research::{basic, deep, multi_agent};
use crate::types::{
    AppError, DeepResearchResponse, MultiAgentResearchResponse, Query, ResearchResponse, Result,
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::Instrument;

/// One of the three research pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// One search, one synthesis
    Basic,
    /// Two sequential search+synthesis layers joined by a derived follow-up query
    Deep,
    /// Decompose into three subtasks, research them concurrently, integrate
    MultiAgent,
}

impl Strategy {
    /// HTTP route serving this strategy.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Strategy::Basic => "/research",
            Strategy::Deep => "/deep-research",
            Strategy::MultiAgent => "/multi-agent-research",
        }
    }

    pub async fn run(&self, engine: &ResearchEngine, query: &Query) -> Result<SynthesisResult> {
        let span = tracing::info_span!("research", strategy = %self, query = %query);

        async move {
            match self {
                Strategy::Basic => basic::run(engine, query).await.map(SynthesisResult::Basic),
                Strategy::Deep => deep::run(engine, query).await.map(SynthesisResult::Deep),
                Strategy::MultiAgent => multi_agent::run(engine, query)
                    .await
                    .map(SynthesisResult::MultiAgent),
            }
        }
        .instrument(span)
        .await
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Basic => write!(f, "basic"),
            Strategy::Deep => write!(f, "deep"),
            Strategy::MultiAgent => write!(f, "multi-agent"),
        }
    }
}

impl FromStr for Strategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(Strategy::Basic),
            "deep" => Ok(Strategy::Deep),
            "multi-agent" | "multi_agent" | "multiagent" => Ok(Strategy::MultiAgent),
            other => Err(AppError::InvalidInput(format!(
                "Unknown strategy '{}'. Use: basic, deep, multi-agent",
                other
            ))),
        }
    }
}

/// Dispatcher and invoker shared by all strategies.
#[derive(Clone)]
pub struct ResearchEngine {
    pub(crate) dispatcher: QueryDispatcher,
    pub(crate) invoker: SynthesisInvoker,
    /// Decoding for synthesis steps; the other research calls are fixed at temperature 0
    pub(crate) synthesis: DecodingConfig,
}

impl ResearchEngine {
    pub fn new(dispatcher: QueryDispatcher, invoker: SynthesisInvoker) -> Self {
        Self {
            dispatcher,
            invoker,
            synthesis: DecodingConfig::SYNTHESIS,
        }
    }

    pub fn with_synthesis_temperature(mut self, temperature: f32) -> Self {
        self.synthesis = self.synthesis.with_temperature(temperature);
        self
    }

    pub async fn run(&self, strategy: Strategy, query: &Query) -> Result<SynthesisResult> {
        strategy.run(self, query).await
    }
}

// ============= Result Shapes =============

#[derive(Debug, Clone)]
pub struct BasicResult {
    /// Full synthesis text
    pub response: String,
    pub summary: String,
    pub insights: Vec<String>,
    pub sources: Vec<SourceDocument>,
}

#[derive(Debug, Clone)]
pub struct DeepResult {
    pub initial_synthesis: String,
    pub follow_up_query: String,
    /// Empty when the second layer degraded
    pub follow_up_synthesis: String,
    pub combined_insights: Vec<String>,
    /// Both layers' documents, initial layer first
    pub sources: Vec<SourceDocument>,
}

#[derive(Debug, Clone)]
pub struct MultiAgentResult {
    pub executive_summary: String,
    /// Always one entry per subtask, in decomposition order
    pub subagents: Vec<SubagentResult>,
    pub integrated_insights: Vec<String>,
}

impl MultiAgentResult {
    /// Documents behind the fragments that reached integration.
    pub fn total_sources(&self) -> usize {
        self.subagents
            .iter()
            .filter(|s| s.contributed())
            .map(|s| s.documents.len())
            .sum()
    }
}

#[derive(Debug, Clone)]
pub enum SynthesisResult {
    Basic(BasicResult),
    Deep(DeepResult),
    MultiAgent(MultiAgentResult),
}

impl SynthesisResult {
    /// Number of documents that fed the synthesis.
    pub fn source_count(&self) -> usize {
        match self {
            SynthesisResult::Basic(r) => r.sources.len(),
            SynthesisResult::Deep(r) => r.sources.len(),
            SynthesisResult::MultiAgent(r) => r.total_sources(),
        }
    }
}

impl BasicResult {
    pub fn into_response(self, query: &Query, elapsed: Duration) -> ResearchResponse {
        ResearchResponse {
            query: query.to_string(),
            sources: self.sources.len(),
            response: self.response,
            summary: self.summary,
            insights: self.insights,
            processing_time: elapsed.as_secs_f64(),
        }
    }
}

impl DeepResult {
    pub fn into_response(self, query: &Query, elapsed: Duration) -> DeepResearchResponse {
        DeepResearchResponse {
            query: query.to_string(),
            sources: self.sources.len(),
            initial_synthesis: self.initial_synthesis,
            follow_up_query: self.follow_up_query,
            follow_up_synthesis: self.follow_up_synthesis,
            combined_insights: self.combined_insights,
            processing_time: elapsed.as_secs_f64(),
        }
    }
}

impl MultiAgentResult {
    pub fn into_response(self, query: &Query, elapsed: Duration) -> MultiAgentResearchResponse {
        let total_sources = self.total_sources();
        MultiAgentResearchResponse {
            query: query.to_string(),
            subagents: self.subagents.len(),
            total_sources,
            executive_summary: self.executive_summary,
            subtask_results: self.subagents.into_iter().map(Into::into).collect(),
            integrated_insights: self.integrated_insights,
            processing_time: elapsed.as_secs_f64(),
        }
    }
}

// ============= Output Parsing =============

pub(crate) const MAX_INSIGHTS: usize = 3;

/// Strip a list marker (`-`, `*`, `•`, `1.`, `2)`) from a line, if present.
pub(crate) fn bullet_text(line: &str) -> Option<&str> {
    let line = line.trim();
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
    {
        return Some(rest.trim()).filter(|s| !s.is_empty());
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return Some(rest.trim()).filter(|s| !s.is_empty());
        }
    }
    None
}

/// Text following `marker` (ASCII case-insensitive) up to the earliest of
/// `stop_markers`.
pub(crate) fn section<'a>(text: &'a str, marker: &str, stop_markers: &[&str]) -> Option<&'a str> {
    // ASCII uppercasing keeps byte offsets aligned with `text`.
    let upper = text.to_ascii_uppercase();
    let start = upper.find(&marker.to_ascii_uppercase())? + marker.len();
    let rest_upper = &upper[start..];
    let end = stop_markers
        .iter()
        .filter_map(|m| rest_upper.find(&m.to_ascii_uppercase()))
        .min()
        .unwrap_or(rest_upper.len());
    Some(text[start..start + end].trim())
}

/// Up to [`MAX_INSIGHTS`] bullet lines from `text`.
pub(crate) fn parse_bullets(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(bullet_text)
        .take(MAX_INSIGHTS)
        .map(str::to_string)
        .collect()
}

/// Split a `SUMMARY: ... INSIGHTS: - a - b - c` completion. Falls back to the
/// non-bullet text as summary when the markers are missing.
pub(crate) fn parse_summary_and_insights(text: &str) -> (String, Vec<String>) {
    let summary = section(text, "SUMMARY:", &["INSIGHTS:"])
        .map(str::to_string)
        .unwrap_or_else(|| {
            text.lines()
                .filter(|l| bullet_text(l).is_none())
                .filter(|l| !l.trim().to_uppercase().starts_with("INSIGHTS"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        });

    let insights = match section(text, "INSIGHTS:", &["SUMMARY:"]) {
        Some(block) => parse_bullets(block),
        None => parse_bullets(text),
    };

    (summary, insights)
}
