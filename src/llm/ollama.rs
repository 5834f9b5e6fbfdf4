use crate::llm::client::{DecodingConfig, LLMClient, TextStream};
use crate::types::{AppError, ChatMessage, MessageRole, Result};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage as OllamaMessage, request::ChatMessageRequest},
    models::ModelOptions,
};

const DEFAULT_PORT: u16 = 11434;

pub struct OllamaClient {
    client: Ollama,
    model: String,
}

/// Split `http://host:port` into the (`http://host`, port) pair ollama-rs expects.
fn split_base_url(base_url: &str) -> (String, u16) {
    let (scheme, rest) = match base_url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", base_url),
    };
    let rest = rest.trim_end_matches('/');
    match rest.rsplit_once(':') {
        Some((host, port)) => (
            format!("{}://{}", scheme, host),
            port.parse().unwrap_or(DEFAULT_PORT),
        ),
        None => (format!("{}://{}", scheme, rest), DEFAULT_PORT),
    }
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        let (host, port) = split_base_url(&base_url);
        Self {
            client: Ollama::new(host, port),
            model,
        }
    }

    fn request(&self, messages: &[ChatMessage], decoding: &DecodingConfig) -> ChatMessageRequest {
        let messages = messages
            .iter()
            .map(|m| match m.role {
                MessageRole::System => OllamaMessage::system(m.content.clone()),
                MessageRole::User => OllamaMessage::user(m.content.clone()),
                MessageRole::Assistant => OllamaMessage::assistant(m.content.clone()),
            })
            .collect();

        let options = ModelOptions::default()
            .temperature(decoding.temperature)
            .num_predict(decoding.max_tokens as i32);

        ChatMessageRequest::new(self.model.clone(), messages).options(options)
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        decoding: &DecodingConfig,
    ) -> Result<String> {
        let response = self
            .client
            .send_chat_messages(self.request(messages, decoding))
            .await
            .map_err(|e| AppError::Transient(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        decoding: &DecodingConfig,
    ) -> Result<TextStream> {
        let mut stream_response = self
            .client
            .send_chat_messages_stream(self.request(messages, decoding))
            .await
            .map_err(|e| AppError::Transient(format!("Ollama stream error: {}", e)))?;

        let output_stream = stream! {
            while let Some(chunk_result) = stream_response.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        let content = chunk.message.content;
                        if !content.is_empty() {
                            yield Ok(content);
                        }
                    }
                    Err(_) => {
                        yield Err(AppError::LLM("Stream chunk error".to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Box::new(Box::pin(output_stream)))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_parsing_full() {
        assert_eq!(
            split_base_url("http://localhost:11434"),
            ("http://localhost".to_string(), 11434)
        );
    }

    #[test]
    fn test_url_parsing_no_port() {
        assert_eq!(
            split_base_url("http://localhost/"),
            ("http://localhost".to_string(), 11434)
        );
    }

    #[test]
    fn test_url_parsing_custom_port_without_scheme() {
        assert_eq!(
            split_base_url("192.168.1.100:8080"),
            ("http://192.168.1.100".to_string(), 8080)
        );
    }
}
