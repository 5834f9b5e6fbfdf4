use crate::{
    AppState,
    research::{Strategy, SynthesisResult},
    types::{
        AppError, DeepResearchResponse, MultiAgentResearchResponse, Query, ResearchRequest,
        ResearchResponse, Result,
    },
};
use axum::{Json, extract::State};
use std::time::{Duration, Instant};

/// Validate the query and run `strategy` inside its tracing span.
async fn run_strategy(
    state: &AppState,
    strategy: Strategy,
    payload: ResearchRequest,
) -> Result<(Query, SynthesisResult, Duration)> {
    let start = Instant::now();
    let query = Query::with_min_length(payload.query)?;

    let result = state.engine.run(strategy, &query).await?;
    let elapsed = start.elapsed();

    tracing::info!(
        strategy = %strategy,
        query = %query,
        sources = result.source_count(),
        latency_ms = elapsed.as_millis() as u64,
        "Research completed"
    );
    Ok((query, result, elapsed))
}

fn mismatched(strategy: Strategy) -> AppError {
    AppError::Internal(format!("{} run returned another strategy's result", strategy))
}

/// Answer a question from one web search and one synthesis
#[utoipa::path(
    post,
    path = "/research",
    request_body = ResearchRequest,
    responses(
        (status = 200, description = "Research completed", body = ResearchResponse),
        (status = 400, description = "Invalid input"),
        (status = 502, description = "Synthesis provider failed")
    ),
    tag = "research"
)]
pub async fn research(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Json<ResearchResponse>> {
    match run_strategy(&state, Strategy::Basic, payload).await? {
        (query, SynthesisResult::Basic(result), elapsed) => {
            Ok(Json(result.into_response(&query, elapsed)))
        }
        _ => Err(mismatched(Strategy::Basic)),
    }
}

/// Two-layer research: an initial synthesis, a derived follow-up question and
/// a second synthesis over fresh sources
#[utoipa::path(
    post,
    path = "/deep-research",
    request_body = ResearchRequest,
    responses(
        (status = 200, description = "Deep research completed", body = DeepResearchResponse),
        (status = 400, description = "Invalid input"),
        (status = 502, description = "Initial synthesis failed")
    ),
    tag = "research"
)]
pub async fn deep_research(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Json<DeepResearchResponse>> {
    match run_strategy(&state, Strategy::Deep, payload).await? {
        (query, SynthesisResult::Deep(result), elapsed) => {
            Ok(Json(result.into_response(&query, elapsed)))
        }
        _ => Err(mismatched(Strategy::Deep)),
    }
}

/// Decompose the question into three subtasks researched concurrently, then
/// integrate their findings
#[utoipa::path(
    post,
    path = "/multi-agent-research",
    request_body = ResearchRequest,
    responses(
        (status = 200, description = "Multi-agent research completed", body = MultiAgentResearchResponse),
        (status = 400, description = "Invalid input"),
        (status = 502, description = "Decomposition or integration failed")
    ),
    tag = "research"
)]
pub async fn multi_agent_research(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Json<MultiAgentResearchResponse>> {
    match run_strategy(&state, Strategy::MultiAgent, payload).await? {
        (query, SynthesisResult::MultiAgent(result), elapsed) => {
            Ok(Json(result.into_response(&query, elapsed)))
        }
        _ => Err(mismatched(Strategy::MultiAgent)),
    }
}
