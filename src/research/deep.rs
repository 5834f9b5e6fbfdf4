//! Deep strategy: two sequential search+synthesis layers.
//!
//! The follow-up query depends on the first synthesis, so the layers never
//! overlap. Only the initial synthesis is fatal; every later step degrades.

use crate::llm::DecodingConfig;
use crate::research::filter::{
    DEEP_FOLLOW_UP_CAP, DEEP_INITIAL_CAP, SourceDocument, format_excerpts,
};
use crate::research::phase::{PhaseTracker, ResearchPhase};
use crate::research::strategy::{
    DeepResult, ResearchEngine, Strategy, parse_bullets, parse_summary_and_insights,
};
use crate::types::{Query, ResearchStep, Result};

/// Template used when the follow-up query can't be derived.
pub fn fallback_follow_up(query: &str) -> String {
    format!("{}: open problems and recent advances", query)
}

fn initial_prompt(query: &str, documents: &[SourceDocument]) -> String {
    crate::research::basic::synthesis_prompt(query, documents)
}

fn follow_up_query_prompt(query: &str, initial: &str) -> String {
    format!(
        r#"Original research question: {query}

Initial findings:
{initial}

What single web search query would best fill the most important gap in these findings?
Reply with the search query only, on one line, without quotes or explanation."#
    )
}

fn follow_up_synthesis_prompt(
    query: &str,
    initial: &str,
    follow_up_query: &str,
    documents: &[SourceDocument],
) -> String {
    let context = if documents.is_empty() {
        "No additional sources were found.".to_string()
    } else {
        format_excerpts(documents)
    };

    format!(
        r#"Research question: {query}

Layer 1 findings:
{initial}

Layer 2 search: {follow_up_query}
Layer 2 sources:
{context}

Write a deeper 3-5 sentence analysis that builds on the layer 1 findings using the layer 2 sources. Do not repeat layer 1. Use LaTeX for mathematical expressions."#
    )
}

fn combined_insights_prompt(query: &str, initial: &str, follow_up: &str) -> String {
    format!(
        r#"Research question: {query}

Initial synthesis:
{initial}

Follow-up synthesis:
{follow_up}

Merge both syntheses into exactly three key insights, one per line, each starting with "- "."#
    )
}

/// First usable line of a follow-up query completion.
fn clean_follow_up(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .split_once(':')
        .filter(|(head, _)| head.to_ascii_lowercase().contains("query"))
        .map(|(_, tail)| tail.trim())
        .unwrap_or(line);
    let line = line.trim_matches(|c| c == '"' || c == '\'' || c == '`').trim();
    (!line.is_empty()).then(|| line.to_string())
}

pub async fn run(engine: &ResearchEngine, query: &Query) -> Result<DeepResult> {
    let mut phase = PhaseTracker::new(Strategy::Deep);
    let initial = engine
        .dispatcher
        .dispatch(query.as_str(), DEEP_INITIAL_CAP)
        .await;

    phase.advance(ResearchPhase::Synthesizing)?;
    let initial_synthesis = engine
        .invoker
        .invoke(
            ResearchStep::InitialSynthesis,
            &initial_prompt(query.as_str(), &initial.documents),
            engine.synthesis,
        )
        .await
        .map_err(|e| phase.fail(e))?;

    phase.advance(ResearchPhase::Refining)?;

    let follow_up_query = engine
        .invoker
        .invoke_or_degrade(
            ResearchStep::FollowUpQuery,
            &follow_up_query_prompt(query.as_str(), &initial_synthesis),
            DecodingConfig::FOLLOW_UP,
        )
        .await?
        .and_then(|raw| clean_follow_up(&raw))
        .unwrap_or_else(|| fallback_follow_up(query.as_str()));

    let follow_up = engine
        .dispatcher
        .dispatch(&follow_up_query, DEEP_FOLLOW_UP_CAP)
        .await;

    let follow_up_synthesis = engine
        .invoker
        .invoke_or_degrade(
            ResearchStep::FollowUpSynthesis,
            &follow_up_synthesis_prompt(
                query.as_str(),
                &initial_synthesis,
                &follow_up_query,
                &follow_up.documents,
            ),
            engine.synthesis,
        )
        .await?;

    let combined_insights = match &follow_up_synthesis {
        None => parse_summary_and_insights(&initial_synthesis).1,
        Some(follow_up_text) => {
            let merged = engine
                .invoker
                .invoke_or_degrade(
                    ResearchStep::CombinedInsights,
                    &combined_insights_prompt(query.as_str(), &initial_synthesis, follow_up_text),
                    DecodingConfig::SYNTHESIS.with_temperature(0.0),
                )
                .await?
                .map(|text| parse_bullets(&text))
                .filter(|insights| !insights.is_empty());
            merged.unwrap_or_else(|| local_insights(&initial_synthesis, follow_up_text))
        }
    };

    phase.advance(ResearchPhase::Complete)?;

    // Second-layer documents count only when their synthesis was kept.
    let mut sources = initial.documents;
    if follow_up_synthesis.is_some() {
        sources.extend(follow_up.documents);
    }

    Ok(DeepResult {
        initial_synthesis,
        follow_up_query,
        follow_up_synthesis: follow_up_synthesis.unwrap_or_default(),
        combined_insights,
        sources,
    })
}

/// Bullets from both layers, initial first.
fn local_insights(initial: &str, follow_up: &str) -> Vec<String> {
    let mut insights = parse_summary_and_insights(initial).1;
    insights.extend(parse_bullets(follow_up));
    insights.truncate(crate::research::strategy::MAX_INSIGHTS);
    insights
}
