use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Minimum number of characters (after trimming) for research and grounded queries.
pub const MIN_QUERY_CHARS: usize = 3;

// ============= Query =============

/// A validated, immutable free-text question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query(String);

impl Query {
    /// Build a query from user input. Fails on empty or whitespace-only text.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidInput("Query must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Build a query that must carry at least [`MIN_QUERY_CHARS`] characters.
    pub fn with_min_length(text: impl Into<String>) -> Result<Self> {
        let query = Self::new(text)?;
        if query.0.chars().count() < MIN_QUERY_CHARS {
            return Err(AppError::InvalidInput(format!(
                "Query must be at least {} characters",
                MIN_QUERY_CHARS
            )));
        }
        Ok(query)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============= Research API Types =============

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResearchRequest {
    /// Research query or question
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResearchResponse {
    pub query: String,
    pub response: String,
    pub summary: String,
    pub insights: Vec<String>,
    pub sources: usize,
    /// Wall-clock processing time in seconds
    pub processing_time: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeepResearchResponse {
    pub query: String,
    pub initial_synthesis: String,
    pub follow_up_query: String,
    pub follow_up_synthesis: String,
    pub combined_insights: Vec<String>,
    pub sources: usize,
    pub processing_time: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubtaskReport {
    pub label: String,
    pub query: String,
    pub sources: usize,
    pub fragment: String,
    pub failed: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MultiAgentResearchResponse {
    pub query: String,
    pub executive_summary: String,
    pub subtask_results: Vec<SubtaskReport>,
    pub integrated_insights: Vec<String>,
    pub subagents: usize,
    pub total_sources: usize,
    pub processing_time: f64,
}

// ============= Chat Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
}

// ============= RAG Types =============

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RagQueryRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub index_name: String,
    pub chunks: usize,
}

/// A chunk reference surfaced once at the end of a grounded exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GroundingSource {
    /// Leading excerpt of the chunk
    pub content: String,
    /// Originating document name
    pub source: String,
    /// Chunk ordinal within the document
    pub chunk: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IndexInfo {
    pub name: String,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IndexListResponse {
    pub indexes: Vec<IndexInfo>,
}

// ============= Research Steps =============

/// Strategy step that issued a provider call; attached to permanent failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStep {
    BasicSynthesis,
    InitialSynthesis,
    FollowUpQuery,
    FollowUpSynthesis,
    CombinedInsights,
    Decomposition,
    Subagent,
    Integration,
    Chat,
    GroundedAnswer,
}

impl ResearchStep {
    /// Whether a permanent failure at this step aborts the whole request.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            ResearchStep::FollowUpQuery
                | ResearchStep::FollowUpSynthesis
                | ResearchStep::CombinedInsights
                | ResearchStep::Subagent
        )
    }
}

impl fmt::Display for ResearchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResearchStep::BasicSynthesis => "basic synthesis",
            ResearchStep::InitialSynthesis => "initial synthesis",
            ResearchStep::FollowUpQuery => "follow-up query",
            ResearchStep::FollowUpSynthesis => "follow-up synthesis",
            ResearchStep::CombinedInsights => "combined insights",
            ResearchStep::Decomposition => "decomposition",
            ResearchStep::Subagent => "subagent",
            ResearchStep::Integration => "integration",
            ResearchStep::Chat => "chat",
            ResearchStep::GroundedAnswer => "grounded answer",
        };
        f.write_str(name)
    }
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Provider temporarily unavailable: {0}")]
    Transient(String),

    #[error("Provider call timed out after {0}s")]
    Timeout(u64),

    #[error("Search error: {0}")]
    Search(String),

    #[error("{step} failed: {source}")]
    StepFailed {
        step: ResearchStep,
        #[source]
        source: Box<AppError>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Transient failures are eligible for retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Transient(_) | AppError::Timeout(_))
    }

    /// Tag an error with the step that produced it. Already-tagged errors keep their step.
    pub fn at_step(self, step: ResearchStep) -> Self {
        match self {
            AppError::StepFailed { .. } => self,
            other => AppError::StepFailed {
                step,
                source: Box::new(other),
            },
        }
    }

    /// The step a tagged error originated from.
    pub fn step(&self) -> Option<ResearchStep> {
        match self {
            AppError::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::LLM(_) | AppError::Transient(_) | AppError::Search(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::StepFailed { .. } => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_query_trims_and_rejects_empty() {
        assert_eq!(Query::new("  limits  ").unwrap().as_str(), "limits");
        assert!(Query::new("   ").is_err());
        assert!(Query::with_min_length("ab").is_err());
        assert!(Query::with_min_length("abc").is_ok());
    }

    #[test]
    fn test_step_tagging_keeps_first_step() {
        let err = AppError::LLM("bad prompt".into())
            .at_step(ResearchStep::Decomposition)
            .at_step(ResearchStep::Integration);
        assert_eq!(err.step(), Some(ResearchStep::Decomposition));
        assert!(err.to_string().contains("decomposition failed"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(AppError::Transient("429".into()).is_transient());
        assert!(AppError::Timeout(60).is_transient());
        assert!(!AppError::LLM("400".into()).is_transient());
    }

    #[test]
    fn test_error_status_codes() {
        let resp = AppError::InvalidInput("x".into()).into_response();
        assert_eq!(resp.status(), axum::http::StatusCode::BAD_REQUEST);

        let resp = AppError::LLM("x".into())
            .at_step(ResearchStep::Integration)
            .into_response();
        assert_eq!(resp.status(), axum::http::StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_degradable_steps() {
        assert!(ResearchStep::Subagent.is_degradable());
        assert!(!ResearchStep::Decomposition.is_degradable());
        assert!(!ResearchStep::Integration.is_degradable());
        assert!(!ResearchStep::BasicSynthesis.is_degradable());
    }
}
