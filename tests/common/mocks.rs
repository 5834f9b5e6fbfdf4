//! Mock implementations for testing.
//!
//! This module provides mock completion and search providers that can be
//! used across different test files without duplication.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream;
use mathmatika::llm::{DecodingConfig, LLMClient, TextStream};
use mathmatika::search::{RawDocument, SearchProvider};
use mathmatika::types::{AppError, ChatMessage, Result};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// Mock LLM client with scripted replies.
///
/// A call is matched against rules by substring of its prompt (every message
/// joined with newlines); the first matching rule wins, otherwise the default
/// reply is returned. Every prompt is recorded.
///
/// # Examples
///
/// ```ignore
/// let llm = MockLLMClient::new("fallback")
///     .respond_to("Research question:", "SUMMARY: ...")
///     .fail_on("focusing on recent-developments");
/// ```
pub struct MockLLMClient {
    rules: Vec<(String, Reply)>,
    default_reply: String,
    calls: Mutex<Vec<String>>,
}

impl MockLLMClient {
    /// Create a mock that answers every call with `default_reply`.
    pub fn new(default_reply: &str) -> Self {
        Self {
            rules: Vec::new(),
            default_reply: default_reply.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer prompts containing `needle` with `reply`.
    pub fn respond_to(mut self, needle: &str, reply: &str) -> Self {
        self.rules
            .push((needle.to_string(), Reply::Text(reply.to_string())));
        self
    }

    /// Fail prompts containing `needle` with a permanent provider error.
    pub fn fail_on(mut self, needle: &str) -> Self {
        self.rules.push((
            needle.to_string(),
            Reply::Fail(format!("mock failure for '{}'", needle)),
        ));
        self
    }

    /// Every prompt seen so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_containing(&self, needle: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.contains(needle)).count()
    }

    fn reply_for(&self, messages: &[ChatMessage]) -> Result<String> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.calls.lock().push(prompt.clone());

        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Reply::Text(self.default_reply.clone()));

        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Fail(message) => Err(AppError::LLM(message)),
        }
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _decoding: &DecodingConfig,
    ) -> Result<String> {
        self.reply_for(messages)
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        _decoding: &DecodingConfig,
    ) -> Result<TextStream> {
        let reply = self.reply_for(messages)?;
        let fragments: Vec<Result<String>> = reply
            .split_inclusive(' ')
            .map(|f| Ok(f.to_string()))
            .collect();
        Ok(Box::new(stream::iter(fragments)))
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Mock search provider returning canned documents per query.
pub struct MockSearchProvider {
    results: HashMap<String, Vec<RawDocument>>,
    default_results: Vec<RawDocument>,
    failing: bool,
    queries: Mutex<Vec<String>>,
}

impl MockSearchProvider {
    /// Return `documents` for every query.
    pub fn new(documents: Vec<RawDocument>) -> Self {
        Self {
            results: HashMap::new(),
            default_results: documents,
            failing: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// A provider that fails every search.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new(Vec::new())
        }
    }

    /// Return `documents` for exactly `query`.
    pub fn with_results(mut self, query: &str, documents: Vec<RawDocument>) -> Self {
        self.results.insert(query.to_string(), documents);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<RawDocument>> {
        self.queries.lock().push(query.to_string());
        if self.failing {
            return Err(AppError::Search("mock search outage".to_string()));
        }
        let documents = self
            .results
            .get(query)
            .unwrap_or(&self.default_results);
        Ok(documents.iter().take(max_results).cloned().collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A document whose content is `chars` characters long.
pub fn document(tag: &str, chars: usize) -> RawDocument {
    let sentence = format!("{} is discussed here. ", tag);
    let content: String = sentence.chars().cycle().take(chars).collect();
    RawDocument::new(content, format!("https://{}.example/article", tag), tag)
}

/// A single-page PDF showing `text` in Helvetica. `text` must not contain
/// parentheses or backslashes.
pub fn pdf_document(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>".to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = pdf.len();
    let mut trailer = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        trailer.push_str(&format!("{:010} 00000 n \n", offset));
    }
    trailer.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));
    pdf.extend_from_slice(trailer.as_bytes());
    pdf
}
