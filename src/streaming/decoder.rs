//! Incremental decoder for `data:`-prefixed, blank-line-terminated frames.
//!
//! Transport deliveries may split a frame anywhere, including inside a
//! multi-byte UTF-8 sequence. The decoder keeps the undecoded tail as raw
//! bytes and only surfaces a frame once its terminator has been seen, then
//! keeps scanning the remainder of the buffer in the same pass.
//!
//! [`SseDecoder`] yields the raw `data` text of each frame and is shared with
//! the completion-provider client. [`FrameDecoder`] layers JSON decoding of
//! [`StreamFrame`] payloads on top.

use super::frame::{DATA_PREFIX, StreamFrame};

/// Decoder position relative to the buffered bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderState {
    /// The buffer holds no complete frame
    #[default]
    AwaitingTerminator,
    /// A terminator is buffered and the frame before it can be extracted
    FrameReady,
}

/// A frame whose payload could not be decoded. The exchange carries on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,
    #[error("malformed frame payload: {message}")]
    MalformedPayload { message: String, raw: String },
}

/// Raw frame splitter.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    state: DecoderState,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one transport delivery; returns the data text of every frame it completed.
    ///
    /// Frames with no `data:` line (keep-alive comments, bare `event:` lines)
    /// produce nothing.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<String, FrameError>> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            match self.state {
                DecoderState::AwaitingTerminator => {
                    if find_terminator(&self.buffer).is_some() {
                        self.state = DecoderState::FrameReady;
                    } else {
                        break;
                    }
                }
                DecoderState::FrameReady => {
                    if let Some((end, terminator_len)) = find_terminator(&self.buffer) {
                        let block: Vec<u8> = self.buffer.drain(..end + terminator_len).collect();
                        if let Some(frame) = extract_data(&block[..end]) {
                            frames.push(frame);
                        }
                    }
                    self.state = DecoderState::AwaitingTerminator;
                }
            }
        }

        frames
    }

    /// Drop any incomplete tail, returning how many bytes were discarded.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.state = DecoderState::AwaitingTerminator;
        dropped
    }
}

/// Earliest frame terminator: `\n\n` or `\r\n\r\n`. Returns (offset, length).
fn find_terminator(buffer: &[u8]) -> Option<(usize, usize)> {
    (0..buffer.len()).find_map(|i| {
        let rest = &buffer[i..];
        if rest.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else if rest.starts_with(b"\n\n") {
            Some((i, 2))
        } else {
            None
        }
    })
}

fn extract_data(block: &[u8]) -> Option<Result<String, FrameError>> {
    let text = match std::str::from_utf8(block) {
        Ok(text) => text,
        Err(_) => return Some(Err(FrameError::InvalidUtf8)),
    };

    let data_lines: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(Ok(data_lines.join("\n")))
    }
}

/// Decoder for [`StreamFrame`] payloads.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    inner: SseDecoder,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DecoderState {
        self.inner.state()
    }

    pub fn pending(&self) -> usize {
        self.inner.pending()
    }

    /// Feed one delivery; malformed frames come back as errors in place.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<StreamFrame, FrameError>> {
        self.inner
            .feed(chunk)
            .into_iter()
            .map(|data| {
                let data = data?;
                serde_json::from_str::<StreamFrame>(&data).map_err(|e| {
                    FrameError::MalformedPayload {
                        message: e.to_string(),
                        raw: data,
                    }
                })
            })
            .collect()
    }

    pub fn finish(&mut self) -> usize {
        self.inner.finish()
    }
}
