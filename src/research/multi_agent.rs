//! Multi-Agent strategy: decompose, research concurrently, integrate.
//!
//! A lead call splits the query into exactly three subtasks. Each subtask runs
//! its own dispatch and synthesis in a separate task; all three are joined
//! unconditionally before integration. A failed subtask keeps its slot with
//! an empty fragment and contributes no sources.

use crate::llm::DecodingConfig;
use crate::research::dispatcher::QueryDispatcher;
use crate::research::filter::{SUBAGENT_CAP, SourceDocument, format_excerpts};
use crate::research::phase::{PhaseTracker, ResearchPhase};
use crate::research::strategy::{
    MultiAgentResult, ResearchEngine, Strategy, bullet_text, parse_bullets, section,
};
use crate::research::synthesis::SynthesisInvoker;
use crate::types::{AppError, Query, ResearchStep, Result, SubtaskReport};
use std::collections::HashMap;
use std::fmt;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubtaskLabel {
    Fundamentals,
    RecentDevelopments,
    Applications,
}

impl SubtaskLabel {
    pub const ALL: [SubtaskLabel; 3] = [
        SubtaskLabel::Fundamentals,
        SubtaskLabel::RecentDevelopments,
        SubtaskLabel::Applications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubtaskLabel::Fundamentals => "fundamentals",
            SubtaskLabel::RecentDevelopments => "recent-developments",
            SubtaskLabel::Applications => "applications",
        }
    }

    /// Line marker the lead agent is asked to use.
    fn marker(&self) -> &'static str {
        match self {
            SubtaskLabel::Fundamentals => "FUNDAMENTALS:",
            SubtaskLabel::RecentDevelopments => "RECENT:",
            SubtaskLabel::Applications => "APPLICATIONS:",
        }
    }

    fn fallback_query(&self, query: &str) -> String {
        match self {
            SubtaskLabel::Fundamentals => format!("{} fundamentals and key concepts", query),
            SubtaskLabel::RecentDevelopments => format!("{} recent developments", query),
            SubtaskLabel::Applications => format!("{} practical applications", query),
        }
    }
}

impl fmt::Display for SubtaskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subtask {
    pub label: SubtaskLabel,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct SubagentResult {
    pub subtask: Subtask,
    /// At most two; empty when the unit failed
    pub documents: Vec<SourceDocument>,
    pub fragment: String,
    pub failed: bool,
}

impl SubagentResult {
    fn failed(subtask: Subtask) -> Self {
        Self {
            subtask,
            documents: Vec::new(),
            fragment: String::new(),
            failed: true,
        }
    }

    pub fn contributed(&self) -> bool {
        !self.failed && !self.fragment.trim().is_empty()
    }
}

impl From<SubagentResult> for SubtaskReport {
    fn from(result: SubagentResult) -> Self {
        SubtaskReport {
            label: result.subtask.label.to_string(),
            query: result.subtask.query,
            sources: result.documents.len(),
            fragment: result.fragment,
            failed: result.failed,
        }
    }
}

fn decomposition_prompt(query: &str) -> String {
    format!(
        r#"You are the lead researcher. Split the research question below into three focused web search queries.

Question: {query}

Reply in exactly this format, one line each:
FUNDAMENTALS: <search query about the core concepts and definitions>
RECENT: <search query about recent developments>
APPLICATIONS: <search query about practical applications>"#
    )
}

fn subagent_prompt(query: &str, subtask: &Subtask, documents: &[SourceDocument]) -> String {
    let context = if documents.is_empty() {
        "No web sources were found; rely on general knowledge and say so.".to_string()
    } else {
        format_excerpts(documents)
    };

    format!(
        r#"You are a research subagent focusing on {label} for the question: {query}

Your search: {subquery}

Sources:
{context}

Write a focused 2-4 sentence finding for your area only. Use LaTeX for mathematical expressions."#,
        label = subtask.label,
        subquery = subtask.query,
    )
}

fn integration_prompt(query: &str, results: &[SubagentResult]) -> String {
    let findings = results
        .iter()
        .filter(|r| r.contributed())
        .map(|r| format!("[{}] {}", r.subtask.label, r.fragment.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"You are the lead researcher integrating your subagents' findings.

Question: {query}

Findings:
{findings}

Respond in exactly this format:
EXECUTIVE SUMMARY: a 3-4 sentence answer that integrates the findings.
INSIGHTS:
- first integrated insight
- second integrated insight
- third integrated insight"#
    )
}

/// Parse the lead agent's reply into exactly three subtasks, in label order.
/// Labels the reply omits fall back to a template query.
pub fn parse_subtasks(query: &str, reply: &str) -> Vec<Subtask> {
    SubtaskLabel::ALL
        .iter()
        .map(|label| {
            let derived = reply.lines().find_map(|line| {
                let line = bullet_text(line).unwrap_or(line).trim();
                let upper = line.to_ascii_uppercase();
                upper
                    .starts_with(label.marker())
                    .then(|| line[label.marker().len()..].trim())
                    .filter(|q| !q.is_empty())
                    .map(str::to_string)
            });
            Subtask {
                label: *label,
                query: derived.unwrap_or_else(|| label.fallback_query(query)),
            }
        })
        .collect()
}

async fn run_subagent(
    dispatcher: QueryDispatcher,
    invoker: SynthesisInvoker,
    decoding: DecodingConfig,
    query: String,
    subtask: Subtask,
) -> Result<SubagentResult> {
    let dispatch = dispatcher.dispatch(&subtask.query, SUBAGENT_CAP).await;
    let fragment = invoker
        .invoke_or_degrade(
            ResearchStep::Subagent,
            &subagent_prompt(&query, &subtask, &dispatch.documents),
            decoding,
        )
        .await?;

    Ok(match fragment {
        Some(fragment) => SubagentResult {
            subtask,
            documents: dispatch.documents,
            fragment,
            failed: false,
        },
        None => SubagentResult::failed(subtask),
    })
}

/// Run all subtasks concurrently and settle every slot, success or not.
async fn fan_out(
    engine: &ResearchEngine,
    query: &Query,
    subtasks: &[Subtask],
) -> Vec<SubagentResult> {
    let mut set = JoinSet::new();
    let mut slots: HashMap<tokio::task::Id, usize> = HashMap::new();

    for (index, subtask) in subtasks.iter().enumerate() {
        let handle = set.spawn(run_subagent(
            engine.dispatcher.clone(),
            engine.invoker.clone(),
            engine.synthesis,
            query.to_string(),
            subtask.clone(),
        ));
        slots.insert(handle.id(), index);
    }

    let mut results: Vec<Option<SubagentResult>> = vec![None; subtasks.len()];

    while let Some(joined) = set.join_next_with_id().await {
        match joined {
            Ok((id, Ok(result))) => {
                if let Some(&index) = slots.get(&id) {
                    tracing::info!(
                        label = %result.subtask.label,
                        documents = result.documents.len(),
                        failed = result.failed,
                        "Subagent finished"
                    );
                    results[index] = Some(result);
                }
            }
            Ok((id, Err(e))) => {
                if let Some(&index) = slots.get(&id) {
                    tracing::warn!(label = %subtasks[index].label, error = %e, "Subagent failed");
                }
            }
            Err(join_error) => {
                if let Some(&index) = slots.get(&join_error.id()) {
                    tracing::warn!(label = %subtasks[index].label, error = %join_error, "Subagent task aborted");
                }
            }
        }
    }

    results
        .into_iter()
        .zip(subtasks)
        .map(|(slot, subtask)| slot.unwrap_or_else(|| SubagentResult::failed(subtask.clone())))
        .collect()
}

pub async fn run(engine: &ResearchEngine, query: &Query) -> Result<MultiAgentResult> {
    let mut phase = PhaseTracker::new(Strategy::MultiAgent);

    phase.advance(ResearchPhase::Synthesizing)?;
    let reply = engine
        .invoker
        .invoke(
            ResearchStep::Decomposition,
            &decomposition_prompt(query.as_str()),
            DecodingConfig::DECOMPOSITION,
        )
        .await
        .map_err(|e| phase.fail(e))?;

    let subtasks = parse_subtasks(query.as_str(), &reply);
    let subagents = fan_out(engine, query, &subtasks).await;

    phase.advance(ResearchPhase::Integrating)?;
    let contributed = subagents.iter().filter(|r| r.contributed()).count();
    if contributed == 0 {
        return Err(phase.fail(
            AppError::LLM("no subagent produced a finding".to_string())
                .at_step(ResearchStep::Integration),
        ));
    }
    tracing::info!(contributed, total = subagents.len(), "Integrating subagent findings");

    let integrated = engine
        .invoker
        .invoke(
            ResearchStep::Integration,
            &integration_prompt(query.as_str(), &subagents),
            engine.synthesis,
        )
        .await
        .map_err(|e| phase.fail(e))?;

    let executive_summary = section(&integrated, "EXECUTIVE SUMMARY:", &["INSIGHTS:"])
        .map(str::to_string)
        .unwrap_or_else(|| {
            integrated
                .lines()
                .filter(|l| bullet_text(l).is_none())
                .filter(|l| !l.trim().to_ascii_uppercase().starts_with("INSIGHTS"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        });
    let integrated_insights = match section(&integrated, "INSIGHTS:", &["EXECUTIVE SUMMARY:"]) {
        Some(block) => parse_bullets(block),
        None => parse_bullets(&integrated),
    };

    phase.advance(ResearchPhase::Complete)?;

    Ok(MultiAgentResult {
        executive_summary,
        subagents,
        integrated_insights,
    })
}
