//! OpenAI-compatible chat completions client.
//!
//! Works against any endpoint that speaks the `/chat/completions` dialect
//! (OpenAI, Cerebras, Groq, vLLM). Streaming responses are read with the same
//! frame decoder the stream consumer uses.
//!
//! Requests go straight through `reqwest` rather than a typed SDK so the raw
//! HTTP status is available: 408, 429 and 5xx map to [`AppError::Transient`]
//! and are retried, every other failure is permanent.

use crate::llm::client::{DecodingConfig, LLMClient, TextStream};
use crate::streaming::SseDecoder;
use crate::types::{AppError, ChatMessage, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DONE_SENTINEL: &str = "[DONE]";

pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIClient {
    pub fn new(api_key: String, api_base: String, model: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn request_body<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        decoding: &DecodingConfig,
        stream: bool,
    ) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            max_tokens: decoding.max_tokens,
            temperature: decoding.temperature,
            stream,
        }
    }

    async fn send(&self, body: &CompletionRequest<'_>) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(map_http_error(status, &text))
    }
}

/// Rate limiting, request timeouts and server-side failures are worth retrying.
fn map_http_error(status: reqwest::StatusCode, body: &str) -> AppError {
    let code = status.as_u16();
    let message = format!("HTTP {}: {}", code, body);
    if code == 429 || code == 408 || status.is_server_error() {
        AppError::Transient(message)
    } else {
        AppError::LLM(message)
    }
}

fn map_transport_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        AppError::Transient(format!("Provider unreachable: {}", err))
    } else {
        AppError::LLM(format!("Provider request failed: {}", err))
    }
}

/// Extract the text fragment from one streamed chunk. `Ok(None)` for role-only
/// or empty deltas.
fn parse_stream_chunk(data: &str) -> Result<Option<String>> {
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| AppError::LLM(format!("Malformed stream chunk: {}", e)))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty()))
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        decoding: &DecodingConfig,
    ) -> Result<String> {
        let body = self.request_body(messages, decoding, false);
        let response = self.send(&body).await?;

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLM(format!("Malformed completion response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::LLM("No response from provider".to_string()))
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        decoding: &DecodingConfig,
    ) -> Result<TextStream> {
        let body = self.request_body(messages, decoding, true);
        let response = self.send(&body).await?;
        let mut bytes = response.bytes_stream();

        let output = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(AppError::Transient(format!("Stream interrupted: {}", e)));
                        return;
                    }
                };
                for data in decoder.feed(&chunk) {
                    let data = match data {
                        Ok(data) => data,
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping undecodable provider frame");
                            continue;
                        }
                    };
                    if data.trim() == DONE_SENTINEL {
                        return;
                    }
                    match parse_stream_chunk(&data) {
                        Ok(Some(fragment)) => yield Ok(fragment),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
        };

        Ok(Box::new(Box::pin(output)))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
