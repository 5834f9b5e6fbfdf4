//! Client-side subcommands: `ask`, `research` and `config`.

use crate::cli::output::Output;
use crate::client::{ExchangeOutcome, StreamConsumer, StreamError, StreamHandler};
use crate::research::Strategy;
use crate::types::{
    ChatRequest, DeepResearchResponse, GroundingSource, MultiAgentResearchResponse,
    RagQueryRequest, ResearchRequest, ResearchResponse,
};
use crate::utils::config::AppConfig;
use anyhow::{Context, bail};
use std::path::Path;

/// Prints fragments as they arrive and the grounding sources at the end.
pub struct TerminalPrinter<'a> {
    output: &'a Output,
    fragments: usize,
}

impl<'a> TerminalPrinter<'a> {
    pub fn new(output: &'a Output) -> Self {
        Self {
            output,
            fragments: 0,
        }
    }
}

impl StreamHandler for TerminalPrinter<'_> {
    fn on_content(&mut self, fragment: &str) {
        self.fragments += 1;
        self.output.fragment(fragment);
    }

    fn on_complete(&mut self, _text: &str, sources: &[GroundingSource]) {
        self.output.newline();
        if !sources.is_empty() {
            self.output.subheader("Sources");
            for source in sources {
                self.output
                    .list_item(&format!("{} (chunk {})", source.source, source.chunk));
            }
        }
    }

    fn on_error(&mut self, error: &StreamError) {
        if self.fragments > 0 {
            self.output.newline();
        }
        self.output.error(&error.to_string());
    }
}

/// Base URL of the server described by `config`.
pub fn server_url(config: &AppConfig, server: Option<String>) -> String {
    server.unwrap_or_else(|| {
        let host = match config.server.host.as_str() {
            "0.0.0.0" => "127.0.0.1",
            host => host,
        };
        format!("http://{}:{}", host, config.server.port)
    })
}

/// Stream a chat answer (or a grounded answer when `index` is set). Ctrl-C
/// cancels the exchange.
pub async fn ask(
    base_url: &str,
    message: String,
    index: Option<String>,
    output: &Output,
) -> anyhow::Result<()> {
    let consumer = StreamConsumer::new(base_url)?;
    let exchange = consumer.exchange();

    let token = exchange.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let mut printer = TerminalPrinter::new(output);
    let outcome = match index {
        Some(index_name) => {
            let request = RagQueryRequest {
                query: message,
                index_name: Some(index_name),
            };
            exchange
                .run("/rag/query/stream", &request, &mut printer)
                .await
        }
        None => {
            let request = ChatRequest {
                message,
                conversation_history: Vec::new(),
            };
            exchange.run("/chat/stream", &request, &mut printer).await
        }
    };

    match outcome {
        ExchangeOutcome::Completed { .. } => Ok(()),
        ExchangeOutcome::Cancelled => {
            output.newline();
            output.warning("Cancelled");
            Ok(())
        }
        ExchangeOutcome::Failed(e) => Err(e.into()),
    }
}

/// Run one single-shot strategy against a running server and print the result.
pub async fn research(
    base_url: &str,
    query: String,
    strategy: Strategy,
    output: &Output,
) -> anyhow::Result<()> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), strategy.endpoint());
    output.info(&format!("Running {} research...", strategy));

    let response = reqwest::Client::new()
        .post(&url)
        .json(&ResearchRequest { query })
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    let status = response.status();
    if !status.is_success() {
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let message = body["error"].as_str().unwrap_or("request failed");
        bail!("HTTP {}: {}", status.as_u16(), message);
    }

    match strategy {
        Strategy::Basic => print_basic(&response.json().await?, output),
        Strategy::Deep => print_deep(&response.json().await?, output),
        Strategy::MultiAgent => print_multi_agent(&response.json().await?, output),
    }
    Ok(())
}

fn print_insights(insights: &[String], output: &Output) {
    if !insights.is_empty() {
        output.subheader("Insights");
        for insight in insights {
            output.list_item(insight);
        }
    }
}

fn print_basic(response: &ResearchResponse, output: &Output) {
    output.header(&response.query);
    output.paragraph(&response.response);
    print_insights(&response.insights, output);
    output.newline();
    output.kv("sources", &response.sources.to_string());
    output.kv("time", &format!("{:.1}s", response.processing_time));
}

fn print_deep(response: &DeepResearchResponse, output: &Output) {
    output.header(&response.query);
    output.paragraph(&response.initial_synthesis);
    output.subheader(&format!("Follow-up: {}", response.follow_up_query));
    if response.follow_up_synthesis.is_empty() {
        output.warning("The follow-up layer produced no synthesis");
    } else {
        output.paragraph(&response.follow_up_synthesis);
    }
    print_insights(&response.combined_insights, output);
    output.newline();
    output.kv("sources", &response.sources.to_string());
    output.kv("time", &format!("{:.1}s", response.processing_time));
}

fn print_multi_agent(response: &MultiAgentResearchResponse, output: &Output) {
    output.header(&response.query);
    output.paragraph(&response.executive_summary);
    for subtask in &response.subtask_results {
        output.subheader(&format!("{}: {}", subtask.label, subtask.query));
        if subtask.failed {
            output.warning("Subagent failed");
        } else {
            output.paragraph(&subtask.fragment);
        }
    }
    print_insights(&response.integrated_insights, output);
    output.newline();
    output.kv("subagents", &response.subagents.to_string());
    output.kv("sources", &response.total_sources.to_string());
    output.kv("time", &format!("{:.1}s", response.processing_time));
}

/// Print the effective configuration, optionally validating it.
pub fn show_config(
    path: &Path,
    config: &AppConfig,
    validate: bool,
    output: &Output,
) -> anyhow::Result<()> {
    output.header("Configuration");
    output.kv("file", &path.display().to_string());
    if !path.exists() {
        output.warning("File not found, showing defaults");
    }

    output.subheader("server");
    output.kv("bind", &config.bind_address());
    output.kv("log_level", &config.server.log_level);
    output.kv("log_format", &config.server.log_format);
    output.kv("cors_origins", &config.server.cors_origins.join(", "));
    output.kv("max_upload_bytes", &config.server.max_upload_bytes.to_string());

    output.subheader("llm");
    output.kv("provider", &config.llm.provider);
    output.kv("api_base", &config.llm.api_base);
    output.kv("api_key_env", &config.llm.api_key_env);
    output.kv("model", &config.llm.model);
    output.kv("temperature", &config.llm.temperature.to_string());
    output.kv("max_tokens", &config.llm.max_tokens.to_string());

    output.subheader("retry");
    output.kv("max_attempts", &config.retry.max_attempts.to_string());
    output.kv(
        "backoff",
        &format!(
            "{}ms x{} up to {}ms",
            config.retry.initial_backoff_ms, config.retry.multiplier, config.retry.max_backoff_ms
        ),
    );
    output.kv("call_timeout", &format!("{}s", config.retry.call_timeout_secs));

    output.subheader("search");
    output.kv("timeout", &format!("{}s", config.search.timeout_secs));
    output.kv("fetch_pages", &config.search.fetch_pages.to_string());
    output.kv("fetch_concurrency", &config.search.fetch_concurrency.to_string());

    output.subheader("rag");
    output.kv("default_index", &config.rag.default_index);
    output.kv(
        "chunking",
        &format!("{} chars, {} overlap", config.rag.chunk_size, config.rag.chunk_overlap),
    );
    output.kv("top_k", &config.rag.top_k.to_string());

    if validate {
        output.newline();
        config.validate()?;
        output.success("Configuration is valid");
    }
    Ok(())
}
