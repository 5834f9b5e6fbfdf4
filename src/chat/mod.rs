//! Streamed tutoring chat.

use crate::llm::DecodingConfig;
use crate::research::synthesis::SynthesisInvoker;
use crate::streaming::{StreamFrame, frames_from_fragments};
use crate::types::{AppError, ChatMessage, ChatRequest, ResearchStep, Result};
use futures::{Stream, StreamExt};

pub const TUTOR_SYSTEM_PROMPT: &str = r#"You are a helpful mathematics tutor and research assistant. Provide clear, accurate explanations and help students understand mathematical concepts.

IMPORTANT: Always use LaTeX for mathematical expressions:
- Inline math: $x^2 + 5x + 6$
- Display math: $$\frac{-b \pm \sqrt{b^2-4ac}}{2a}$$
- Use proper LaTeX syntax for all equations, formulas, and mathematical symbols."#;

const ERROR_PREFIX: &str = "Streaming error";

pub struct ChatService {
    invoker: SynthesisInvoker,
    decoding: DecodingConfig,
}

impl ChatService {
    pub fn new(invoker: SynthesisInvoker, decoding: DecodingConfig) -> Self {
        Self { invoker, decoding }
    }

    /// System prompt, then the prior turns in order, then the new message.
    pub fn build_messages(request: &ChatRequest) -> Result<Vec<ChatMessage>> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::InvalidInput("Message must not be empty".to_string()));
        }

        let mut messages = Vec::with_capacity(request.conversation_history.len() + 2);
        messages.push(ChatMessage::system(TUTOR_SYSTEM_PROMPT));
        messages.extend(request.conversation_history.iter().cloned());
        messages.push(ChatMessage::user(message));
        Ok(messages)
    }

    /// Answer as `content` frames closed by `done`, or a single `error` frame.
    pub fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
    ) -> impl Stream<Item = StreamFrame> + Send + 'static + use<> {
        let invoker = self.invoker.clone();
        let decoding = self.decoding;

        async_stream::stream! {
            let fragments = match invoker
                .invoke_stream(ResearchStep::Chat, &messages, decoding)
                .await
            {
                Ok(fragments) => fragments,
                Err(e) => {
                    yield StreamFrame::error(format!("{}: {}", ERROR_PREFIX, e));
                    return;
                }
            };

            let mut frames = Box::pin(frames_from_fragments(fragments, ERROR_PREFIX, Vec::new()));
            while let Some(frame) = frames.next().await {
                yield frame;
            }
        }
    }
}
