//! Streaming Transport Protocol
//!
//! Long-running synthesis output is delivered as a sequence of self-delimited
//! frames over a `text/event-stream` response:
//!
//! ```text
//! data: {"content":"The derivative "}
//!
//! data: {"content":"of x^2 is 2x."}
//!
//! data: {"done":true}
//!
//! ```
//!
//! - [`frame`] - the frame payload and its server-side encoding
//! - [`decoder`] - the client-side incremental decoder

pub mod decoder;
pub mod frame;

pub use decoder::{DecoderState, FrameDecoder, FrameError, SseDecoder};
pub use frame::{FrameKind, StreamFrame};

use futures::{Stream, StreamExt};

/// Turn a provider fragment stream into content frames. On success the
/// `closing` frames follow the content, then `done`; the first failure
/// yields a single `error` frame instead and ends the stream.
pub fn frames_from_fragments<S>(
    fragments: S,
    error_prefix: &'static str,
    closing: Vec<StreamFrame>,
) -> impl Stream<Item = StreamFrame> + Send
where
    S: Stream<Item = crate::types::Result<String>> + Send + Unpin + 'static,
{
    async_stream::stream! {
        let mut fragments = fragments;
        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(text) if text.is_empty() => continue,
                Ok(text) => yield StreamFrame::content(text),
                Err(e) => {
                    tracing::warn!(error = %e, "Fragment stream failed");
                    yield StreamFrame::error(format!("{}: {}", error_prefix, e));
                    return;
                }
            }
        }
        for frame in closing {
            yield frame;
        }
        yield StreamFrame::done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppError;
    use futures::stream;

    #[tokio::test]
    async fn test_fragments_close_with_done() {
        let fragments = stream::iter(vec![Ok("a".to_string()), Ok(String::new()), Ok("b".into())]);
        let frames: Vec<StreamFrame> = frames_from_fragments(fragments, "Streaming error", vec![])
            .collect()
            .await;
        assert_eq!(
            frames,
            vec![
                StreamFrame::content("a"),
                StreamFrame::content("b"),
                StreamFrame::done()
            ]
        );
    }

    #[tokio::test]
    async fn test_closing_frames_precede_done() {
        let fragments = stream::iter(vec![Ok("answer".to_string())]);
        let closing = vec![StreamFrame::sources(vec![])];
        let frames: Vec<StreamFrame> = frames_from_fragments(fragments, "Query error", closing)
            .collect()
            .await;
        let kinds: Vec<FrameKind> = frames.iter().map(StreamFrame::kind).collect();
        assert_eq!(kinds, vec![FrameKind::Content, FrameKind::Sources, FrameKind::Done]);
    }

    #[tokio::test]
    async fn test_failure_emits_single_error_and_stops() {
        let fragments = stream::iter(vec![
            Ok("a".to_string()),
            Err(AppError::Transient("connection reset".into())),
            Ok("never".to_string()),
        ]);
        let frames: Vec<StreamFrame> = frames_from_fragments(fragments, "Streaming error", vec![])
            .collect()
            .await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].kind(), FrameKind::Error);
        assert!(frames[1].error.as_deref().unwrap().starts_with("Streaming error"));
    }
}
