//! Document upload and grounded question answering.

use crate::llm::DecodingConfig;
use crate::rag::chunker::TextChunker;
use crate::rag::extract::{DocumentKind, extract_text};
use crate::rag::index::{DocumentIndex, IndexedChunk};
use crate::research::synthesis::SynthesisInvoker;
use crate::streaming::{StreamFrame, frames_from_fragments};
use crate::types::{
    AppError, ChatMessage, GroundingSource, IndexInfo, Query, ResearchStep, Result,
    UploadResponse,
};
use crate::utils::config::RagConfig;
use futures::{Stream, StreamExt};
use std::sync::Arc;

/// Characters of a chunk echoed back in a `sources` frame.
pub const SOURCE_PREVIEW_CHARS: usize = 200;

const MAX_INDEX_NAME_LEN: usize = 64;

const GROUNDED_SYSTEM_PROMPT: &str = r#"You are a helpful AI assistant that answers questions based on the provided context from uploaded documents.

IMPORTANT Instructions:
- Always use the provided context to answer questions
- If the context doesn't contain the answer, say so clearly
- Use LaTeX for mathematical expressions: inline $x^2$, display $$\frac{a}{b}$$
- Be concise but thorough in your explanations"#;

pub struct RagService {
    index: Arc<dyn DocumentIndex>,
    invoker: SynthesisInvoker,
    chunker: TextChunker,
    config: RagConfig,
    decoding: DecodingConfig,
}

impl RagService {
    pub fn new(
        index: Arc<dyn DocumentIndex>,
        invoker: SynthesisInvoker,
        config: RagConfig,
        decoding: DecodingConfig,
    ) -> Result<Self> {
        let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap)?;
        Ok(Self {
            index,
            invoker,
            chunker,
            config,
            decoding,
        })
    }

    pub fn default_index(&self) -> &str {
        &self.config.default_index
    }

    /// Extract, chunk and store a document in `index_name` (or the default index).
    pub async fn upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        index_name: Option<String>,
    ) -> Result<UploadResponse> {
        let index_name = resolve_index_name(index_name, &self.config.default_index)?;

        let kind = DocumentKind::from_filename(filename)?;
        let text = extract_text(kind, filename, bytes).await?;

        let chunks = self.chunker.chunk(&text);
        if chunks.is_empty() {
            return Err(AppError::InvalidInput(format!("'{}' contains no text", filename)));
        }

        let stored = self.index.upsert(&index_name, filename, chunks).await?;
        tracing::info!(filename = %filename, index = %index_name, chunks = stored, "Indexed document");

        Ok(UploadResponse {
            success: true,
            message: format!("Successfully indexed {} chunks from {}", stored, filename),
            filename: filename.to_string(),
            index_name,
            chunks: stored,
        })
    }

    pub async fn list_indexes(&self) -> Vec<IndexInfo> {
        self.index.list().await
    }

    /// Grounded answer as frames: `content`*, one `sources`, `done`; or a
    /// single `error` frame.
    pub fn stream_query(
        &self,
        query: Query,
        index_name: Option<String>,
    ) -> impl Stream<Item = StreamFrame> + Send + 'static + use<> {
        let index = self.index.clone();
        let invoker = self.invoker.clone();
        let decoding = self.decoding;
        let top_k = self.config.top_k;
        let index_name = index_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.config.default_index.clone());

        async_stream::stream! {
            if !index.exists(&index_name).await {
                yield StreamFrame::error(format!(
                    "Index {} not found. Please upload a document first.",
                    index_name
                ));
                return;
            }

            let chunks = match index.query(&index_name, query.as_str(), top_k).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    yield StreamFrame::error(format!("Query error: {}", e));
                    return;
                }
            };
            if chunks.is_empty() {
                yield StreamFrame::error("No relevant documents found.");
                return;
            }
            tracing::debug!(index = %index_name, chunks = chunks.len(), "Retrieved grounding chunks");

            let messages = grounded_messages(query.as_str(), &chunks);
            let fragments = match invoker
                .invoke_stream(ResearchStep::GroundedAnswer, &messages, decoding)
                .await
            {
                Ok(fragments) => fragments,
                Err(e) => {
                    yield StreamFrame::error(format!("Query error: {}", e));
                    return;
                }
            };

            let sources = chunks.iter().map(grounding_source).collect();
            let mut frames = Box::pin(frames_from_fragments(
                fragments,
                "Query error",
                vec![StreamFrame::sources(sources)],
            ));
            while let Some(frame) = frames.next().await {
                yield frame;
            }
        }
    }
}

fn resolve_index_name(requested: Option<String>, default: &str) -> Result<String> {
    let name = requested
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| default.to_string());

    let valid = name.len() <= MAX_INDEX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !valid {
        return Err(AppError::InvalidInput(format!(
            "Invalid index name '{}': use at most {} lowercase letters, digits, '-' or '_'",
            name, MAX_INDEX_NAME_LEN
        )));
    }
    Ok(name)
}

fn grounded_messages(query: &str, chunks: &[IndexedChunk]) -> Vec<ChatMessage> {
    let context = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    vec![
        ChatMessage::system(GROUNDED_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Context from documents:\n{}\n\nQuestion: {}\n\nPlease answer the question based on the context above.",
            context, query
        )),
    ]
}

fn grounding_source(chunk: &IndexedChunk) -> GroundingSource {
    let content = match chunk.content.char_indices().nth(SOURCE_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &chunk.content[..cut]),
        None => chunk.content.clone(),
    };
    GroundingSource {
        content,
        source: chunk.source.clone(),
        chunk: chunk.chunk,
    }
}
