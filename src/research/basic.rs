//! Basic strategy: one dispatch, one synthesis.

use crate::research::filter::{BASIC_CAP, SourceDocument, format_excerpts};
use crate::research::phase::{PhaseTracker, ResearchPhase};
use crate::research::strategy::{
    BasicResult, MAX_INSIGHTS, ResearchEngine, Strategy, parse_summary_and_insights,
};
use crate::types::{Query, ResearchStep, Result};

pub(crate) fn synthesis_prompt(query: &str, documents: &[SourceDocument]) -> String {
    let context = if documents.is_empty() {
        "No web sources were found for this question. Answer from general knowledge and say that no sources were available.".to_string()
    } else {
        format!("Sources:\n{}", format_excerpts(documents))
    };

    format!(
        r#"Research question: {query}

{context}

Respond in exactly this format:
SUMMARY: a 2-3 sentence answer to the question, grounded in the sources.
INSIGHTS:
- first key insight
- second key insight
- third key insight

Use LaTeX for mathematical expressions."#
    )
}

pub async fn run(engine: &ResearchEngine, query: &Query) -> Result<BasicResult> {
    let mut phase = PhaseTracker::new(Strategy::Basic);
    let dispatch = engine.dispatcher.dispatch(query.as_str(), BASIC_CAP).await;

    phase.advance(ResearchPhase::Synthesizing)?;
    let prompt = synthesis_prompt(query.as_str(), &dispatch.documents);
    let response = engine
        .invoker
        .invoke(ResearchStep::BasicSynthesis, &prompt, engine.synthesis)
        .await
        .map_err(|e| phase.fail(e))?;

    let (summary, insights) = parse_summary_and_insights(&response);
    if let Some(missing) = insight_shortfall(&insights) {
        tracing::warn!(
            query = %query,
            insights = insights.len(),
            missing,
            "Synthesis returned fewer insights than requested"
        );
    }
    phase.advance(ResearchPhase::Complete)?;

    Ok(BasicResult {
        response,
        summary,
        insights,
        sources: dispatch.documents,
    })
}

/// How many insights the synthesis fell short of [`MAX_INSIGHTS`], if any.
fn insight_shortfall(insights: &[String]) -> Option<usize> {
    MAX_INSIGHTS
        .checked_sub(insights.len())
        .filter(|missing| *missing > 0)
}
