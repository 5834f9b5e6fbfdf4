//! Wire frames for streamed synthesis output.
//!
//! Each frame is one `data: <json>` line followed by a blank line. The JSON
//! payload carries any of the optional keys `content`, `sources`, `error`
//! and `done`.

use crate::types::GroundingSource;
use axum::response::sse::Event;
use serde::{Deserialize, Serialize};

/// Prefix marker that opens every frame.
pub const DATA_PREFIX: &str = "data:";

/// Frame terminator (an empty line after the data line).
pub const FRAME_TERMINATOR: &str = "\n\n";

/// What a frame means to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Content,
    Sources,
    Error,
    Done,
}

/// One streamed event payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamFrame {
    /// Incremental text fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Grounding references, sent once per exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<GroundingSource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Authoritative terminal marker
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub done: bool,
}

impl StreamFrame {
    pub fn content(fragment: impl Into<String>) -> Self {
        Self {
            content: Some(fragment.into()),
            ..Default::default()
        }
    }

    pub fn sources(sources: Vec<GroundingSource>) -> Self {
        Self {
            sources: Some(sources),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn done() -> Self {
        Self {
            done: true,
            ..Default::default()
        }
    }

    /// Dominant kind of this frame. Errors win over termination, termination
    /// over side-data, side-data over content.
    pub fn kind(&self) -> FrameKind {
        if self.error.is_some() {
            FrameKind::Error
        } else if self.done {
            FrameKind::Done
        } else if self.sources.is_some() {
            FrameKind::Sources
        } else {
            FrameKind::Content
        }
    }

    fn payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize stream frame");
            r#"{"error":"frame serialization failed"}"#.to_string()
        })
    }

    /// Self-delimited text form: prefix, JSON payload, terminator.
    pub fn encode(&self) -> String {
        format!("{} {}{}", DATA_PREFIX, self.payload(), FRAME_TERMINATOR)
    }

    /// Server-sent event carrying this frame; axum adds prefix and terminator.
    pub fn to_event(&self) -> Event {
        Event::default().data(self.payload())
    }
}
