//! Synthesis Invoker
//!
//! Wraps one completion-provider call with a fixed decoding configuration,
//! the retry policy and step tagging. Callers decide whether a tagged
//! failure degrades in place or aborts the request.

use crate::llm::{DecodingConfig, LLMClient, TextStream};
use crate::research::retry::{RetryPolicy, with_retry};
use crate::types::{ChatMessage, ResearchStep, Result};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct SynthesisInvoker {
    llm: Arc<dyn LLMClient>,
    policy: RetryPolicy,
}

impl SynthesisInvoker {
    pub fn new(llm: Arc<dyn LLMClient>, policy: RetryPolicy) -> Self {
        Self { llm, policy }
    }

    /// Complete text for a single user prompt.
    pub async fn invoke(
        &self,
        step: ResearchStep,
        prompt: &str,
        decoding: DecodingConfig,
    ) -> Result<String> {
        self.invoke_messages(step, &[ChatMessage::user(prompt)], decoding)
            .await
    }

    /// Complete text at a step whose failure the caller absorbs.
    ///
    /// A failure or blank completion at a [degradable](ResearchStep::is_degradable)
    /// step yields `Ok(None)`; at any other step errors propagate unchanged.
    pub async fn invoke_or_degrade(
        &self,
        step: ResearchStep,
        prompt: &str,
        decoding: DecodingConfig,
    ) -> Result<Option<String>> {
        match self.invoke(step, prompt, decoding).await {
            Ok(text) if step.is_degradable() && text.trim().is_empty() => {
                tracing::warn!(step = %step, "Blank completion, continuing without it");
                Ok(None)
            }
            Ok(text) => Ok(Some(text)),
            Err(e) if step.is_degradable() => {
                tracing::warn!(step = %step, error = %e, "Step degraded");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Complete text for a conversation.
    pub async fn invoke_messages(
        &self,
        step: ResearchStep,
        messages: &[ChatMessage],
        decoding: DecodingConfig,
    ) -> Result<String> {
        let started = Instant::now();
        let result = with_retry(&self.policy, || self.llm.complete(messages, &decoding)).await;

        match result {
            Ok(text) => {
                tracing::debug!(
                    step = %step,
                    latency_ms = started.elapsed().as_millis() as u64,
                    chars = text.len(),
                    "Synthesis complete"
                );
                Ok(text)
            }
            Err(e) => {
                tracing::warn!(step = %step, error = %e, "Synthesis failed");
                Err(e.at_step(step))
            }
        }
    }

    /// Incremental fragments for a conversation. Only opening the stream is
    /// retried; a failure mid-stream surfaces as an error item.
    pub async fn invoke_stream(
        &self,
        step: ResearchStep,
        messages: &[ChatMessage],
        decoding: DecodingConfig,
    ) -> Result<TextStream> {
        with_retry(&self.policy, || self.llm.complete_stream(messages, &decoding))
            .await
            .map_err(|e| {
                tracing::warn!(step = %step, error = %e, "Failed to open synthesis stream");
                e.at_step(step)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FlakyClient {
        failures_before_success: u32,
        permanent: bool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LLMClient for FlakyClient {
        async fn complete(&self, _: &[ChatMessage], _: &DecodingConfig) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.permanent {
                return Err(AppError::LLM("context length exceeded".into()));
            }
            if n < self.failures_before_success {
                Err(AppError::Transient("429".into()))
            } else {
                Ok("summary".into())
            }
        }

        async fn complete_stream(&self, _: &[ChatMessage], _: &DecodingConfig) -> Result<TextStream> {
            Err(AppError::LLM("no streaming".into()))
        }

        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
            call_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_absorbed() {
        let client = Arc::new(FlakyClient {
            failures_before_success: 2,
            permanent: false,
            calls: AtomicU32::new(0),
        });
        let invoker = SynthesisInvoker::new(client.clone(), policy());
        let text = invoker
            .invoke(ResearchStep::BasicSynthesis, "p", DecodingConfig::SYNTHESIS)
            .await
            .unwrap();
        assert_eq!(text, "summary");
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_tagged_with_step() {
        let client = Arc::new(FlakyClient {
            failures_before_success: 0,
            permanent: true,
            calls: AtomicU32::new(0),
        });
        let invoker = SynthesisInvoker::new(client.clone(), policy());
        let err = invoker
            .invoke(ResearchStep::Decomposition, "p", DecodingConfig::DECOMPOSITION)
            .await
            .unwrap_err();
        assert_eq!(err.step(), Some(ResearchStep::Decomposition));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_degradable_step_absorbs_failure() {
        let client = Arc::new(FlakyClient {
            failures_before_success: 0,
            permanent: true,
            calls: AtomicU32::new(0),
        });
        let invoker = SynthesisInvoker::new(client, policy());

        let degraded = invoker
            .invoke_or_degrade(ResearchStep::FollowUpSynthesis, "p", DecodingConfig::SYNTHESIS)
            .await
            .unwrap();
        assert!(degraded.is_none());

        let err = invoker
            .invoke_or_degrade(ResearchStep::Integration, "p", DecodingConfig::SYNTHESIS)
            .await
            .unwrap_err();
        assert_eq!(err.step(), Some(ResearchStep::Integration));
    }

    #[tokio::test]
    async fn test_stream_open_failure_is_tagged() {
        let client = Arc::new(FlakyClient {
            failures_before_success: 0,
            permanent: false,
            calls: AtomicU32::new(0),
        });
        let invoker = SynthesisInvoker::new(client, policy());
        let err = invoker
            .invoke_stream(ResearchStep::Chat, &[], DecodingConfig::CHAT)
            .await
            .err()
            .unwrap();
        assert_eq!(err.step(), Some(ResearchStep::Chat));
    }
}
