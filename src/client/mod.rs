//! Stream Consumer Adapter
//!
//! Owns one streamed exchange end to end: issues the request, feeds every
//! transport delivery through a [`FrameDecoder`], accumulates the answer and
//! drives a caller-supplied [`StreamHandler`].
//!
//! ```ignore
//! let consumer = StreamConsumer::new("http://127.0.0.1:8000")?;
//! let exchange = consumer.exchange();
//! let token = exchange.cancel_token();
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     token.cancel();
//! });
//! let outcome = exchange.run("/chat/stream", &request, &mut printer).await;
//! ```
//!
//! Guarantees:
//! - `on_content` receives each new fragment, never the accumulation
//! - the text passed to `on_complete` is exactly the concatenation of those fragments
//! - after cancellation no callback fires, whatever is still buffered
//! - `on_error` fires at most once and ends the exchange
//! - malformed frames are logged and skipped

use crate::streaming::{FrameDecoder, StreamFrame};
use crate::types::{AppError, GroundingSource, Result};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Why an exchange ended without completing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StreamError {
    #[error("connection failed: {0}")]
    Transport(String),
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// An `error` frame sent by the server
    #[error("{0}")]
    Server(String),
    #[error("stream closed before completion")]
    Incomplete,
}

/// Caller callbacks for one exchange.
pub trait StreamHandler {
    /// A new text fragment, in arrival order.
    fn on_content(&mut self, fragment: &str);

    /// The full accumulated text and any grounding sources, once, on `done`.
    fn on_complete(&mut self, text: &str, sources: &[GroundingSource]);

    fn on_error(&mut self, error: &StreamError);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeOutcome {
    Completed {
        text: String,
        sources: Vec<GroundingSource>,
    },
    Cancelled,
    Failed(StreamError),
}

/// Client-side state of one exchange. The exchange ends at the first `done`
/// or `error` frame, so no frame is applied after a terminal one.
#[derive(Debug, Default)]
struct StreamState {
    decoder: FrameDecoder,
    text: String,
    sources: Vec<GroundingSource>,
}

/// Reusable HTTP side of the adapter.
#[derive(Clone)]
pub struct StreamConsumer {
    http: reqwest::Client,
    base_url: String,
}

impl StreamConsumer {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// A new exchange with its own cancellation token.
    pub fn exchange(&self) -> Exchange {
        Exchange {
            id: Uuid::new_v4(),
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token: CancellationToken::new(),
        }
    }
}

/// One request/response streaming exchange.
pub struct Exchange {
    id: Uuid,
    http: reqwest::Client,
    base_url: String,
    token: CancellationToken,
}

impl Exchange {
    /// Correlates this exchange's log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// POST `body` as JSON to `path` and consume the streamed response.
    pub async fn run<B, H>(self, path: &str, body: &B, handler: &mut H) -> ExchangeOutcome
    where
        B: Serialize + ?Sized,
        H: StreamHandler,
    {
        let url = format!("{}{}", self.base_url, path);
        let request = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(body)
            .send();

        let response = tokio::select! {
            biased;
            _ = self.token.cancelled() => return ExchangeOutcome::Cancelled,
            response = request => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => return fail(handler, StreamError::Transport(e.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return fail(
                handler,
                StreamError::Status {
                    status: status.as_u16(),
                    body,
                },
            );
        }

        tracing::debug!(exchange = %self.id, url = %url, "Stream opened");
        let deliveries = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StreamError::Transport(e.to_string())));
        let outcome = drive(Box::pin(deliveries), handler, &self.token).await;
        if outcome == ExchangeOutcome::Cancelled {
            tracing::debug!(exchange = %self.id, "Stream cancelled");
        }
        outcome
    }
}

fn fail<H: StreamHandler>(handler: &mut H, error: StreamError) -> ExchangeOutcome {
    tracing::warn!(error = %error, "Stream exchange failed");
    handler.on_error(&error);
    ExchangeOutcome::Failed(error)
}

/// Feed transport deliveries through the decoder and dispatch callbacks until
/// `done`, an error, the end of the transport, or cancellation.
pub async fn drive<S, C, H>(
    mut deliveries: S,
    handler: &mut H,
    token: &CancellationToken,
) -> ExchangeOutcome
where
    S: Stream<Item = std::result::Result<C, StreamError>> + Unpin,
    C: AsRef<[u8]>,
    H: StreamHandler,
{
    let mut state = StreamState::default();

    loop {
        let delivery = tokio::select! {
            biased;
            _ = token.cancelled() => return ExchangeOutcome::Cancelled,
            delivery = deliveries.next() => delivery,
        };

        let chunk = match delivery {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => return fail(handler, e),
            None => {
                let dropped = state.decoder.finish();
                if dropped > 0 {
                    tracing::debug!(bytes = dropped, "Discarding incomplete trailing frame");
                }
                return fail(handler, StreamError::Incomplete);
            }
        };

        for decoded in state.decoder.feed(chunk.as_ref()) {
            if token.is_cancelled() {
                return ExchangeOutcome::Cancelled;
            }

            let frame = match decoded {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed stream frame");
                    continue;
                }
            };

            if let Some(outcome) = apply_frame(&mut state, frame, handler, token) {
                return outcome;
            }
        }
    }
}

/// Returns the outcome when the frame ends the exchange.
fn apply_frame<H: StreamHandler>(
    state: &mut StreamState,
    frame: StreamFrame,
    handler: &mut H,
    token: &CancellationToken,
) -> Option<ExchangeOutcome> {
    if let Some(message) = frame.error {
        return Some(fail(handler, StreamError::Server(message)));
    }

    if let Some(fragment) = frame.content.filter(|f| !f.is_empty()) {
        state.text.push_str(&fragment);
        handler.on_content(&fragment);
    }

    // Side-data replaces rather than accumulates.
    if let Some(sources) = frame.sources {
        state.sources = sources;
    }

    if frame.done {
        if token.is_cancelled() {
            return Some(ExchangeOutcome::Cancelled);
        }
        handler.on_complete(&state.text, &state.sources);
        return Some(ExchangeOutcome::Completed {
            text: std::mem::take(&mut state.text),
            sources: std::mem::take(&mut state.sources),
        });
    }

    None
}
