//! LLM Client abstractions and provider management
//!
//! This module provides a unified interface for the completion provider:
//! - **OpenAI-compatible**: chat completions over HTTP (OpenAI, Cerebras, Groq, vLLM)
//! - **Ollama**: local inference, behind the `ollama` feature

use crate::types::{AppError, ChatMessage, Result};
use crate::utils::config::LlmConfig;
use async_trait::async_trait;
use futures::Stream;
use std::sync::Arc;

/// Incremental completion output. Fragments concatenate to the full completion.
pub type TextStream = Box<dyn Stream<Item = Result<String>> + Send + Unpin>;

/// Decoding configuration attached to every provider call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodingConfig {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl DecodingConfig {
    /// Chat and grounded answers
    pub const CHAT: DecodingConfig = DecodingConfig {
        max_tokens: 1500,
        temperature: 0.2,
    };

    /// Research synthesis (summaries, subagent fragments, integration)
    pub const SYNTHESIS: DecodingConfig = DecodingConfig {
        max_tokens: 800,
        temperature: 0.2,
    };

    /// Deriving a single follow-up search query
    pub const FOLLOW_UP: DecodingConfig = DecodingConfig {
        max_tokens: 64,
        temperature: 0.0,
    };

    /// Lead-agent decomposition into subtasks
    pub const DECOMPOSITION: DecodingConfig = DecodingConfig {
        max_tokens: 256,
        temperature: 0.0,
    };

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Generic LLM client trait for provider abstraction
///
/// All completion providers implement this trait, allowing for easy swapping
/// between providers without changing the research engines.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a complete response for a conversation
    async fn complete(&self, messages: &[ChatMessage], decoding: &DecodingConfig)
    -> Result<String>;

    /// Stream a response for a conversation, fragment by fragment
    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        decoding: &DecodingConfig,
    ) -> Result<TextStream>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;

    /// Generate a completion from a single user prompt
    async fn generate(&self, prompt: &str, decoding: &DecodingConfig) -> Result<String> {
        self.complete(&[ChatMessage::user(prompt)], decoding).await
    }
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI-compatible chat completions endpoint
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "csk-...".to_string(),
    ///     api_base: "https://api.cerebras.ai/v1".to_string(),
    ///     model: "llama-4-scout-17b-16e-instruct".to_string(),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
    },

    /// Ollama local LLM provider
    Ollama { base_url: String, model: String },
}

impl Provider {
    /// Resolve the provider described by the `[llm]` config section.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider name is unknown or the API key
    /// environment variable is not set.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        match config.provider.as_str() {
            "openai" => {
                let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                    AppError::InvalidInput(format!(
                        "Environment variable '{}' must be set for the openai provider",
                        config.api_key_env
                    ))
                })?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: config.api_base.clone(),
                    model: config.model.clone(),
                })
            }
            "ollama" => Ok(Provider::Ollama {
                base_url: config.api_base.clone(),
                model: config.model.clone(),
            }),
            other => Err(AppError::InvalidInput(format!(
                "Unknown LLM provider '{}'. Use: openai, ollama",
                other
            ))),
        }
    }

    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's feature is not compiled in.
    pub fn create_client(&self) -> Result<Arc<dyn LLMClient>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
            } => Ok(Arc::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
            )?)),

            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Arc::new(
                super::ollama::OllamaClient::new(base_url.clone(), model.clone()),
            )),

            #[allow(unreachable_patterns)]
            other => Err(AppError::InvalidInput(format!(
                "{} provider support is not compiled in; enable the '{}' feature",
                other.name(),
                other.name().to_lowercase()
            ))),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llm_config(provider: &str, key_env: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            api_key_env: key_env.to_string(),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_provider_name() {
        let openai = Provider::OpenAI {
            api_key: "".to_string(),
            api_base: "".to_string(),
            model: "".to_string(),
        };
        assert_eq!(openai.name(), "OpenAI");

        let ollama = Provider::Ollama {
            base_url: "".to_string(),
            model: "".to_string(),
        };
        assert_eq!(ollama.name(), "Ollama");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = Provider::from_config(&llm_config("bard", "UNUSED")).unwrap_err();
        assert!(err.to_string().contains("Unknown LLM provider"));
    }

    #[test]
    fn test_openai_requires_key_env() {
        let err = Provider::from_config(&llm_config(
            "openai",
            "MATHMATIKA_TEST_KEY_THAT_IS_NEVER_SET",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("MATHMATIKA_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let provider = Provider::from_config(&llm_config("ollama", "UNUSED")).unwrap();
        assert_eq!(provider.name(), "Ollama");
    }

    #[test]
    fn test_decoding_presets_are_bounded() {
        assert_eq!(DecodingConfig::CHAT.max_tokens, 1500);
        assert_eq!(DecodingConfig::DECOMPOSITION.temperature, 0.0);
        let tuned = DecodingConfig::SYNTHESIS.with_temperature(0.0);
        assert_eq!(tuned.temperature, 0.0);
        assert_eq!(tuned.max_tokens, DecodingConfig::SYNTHESIS.max_tokens);
    }
}
