//! Vector index provider contract and the in-process implementation.

use crate::rag::bm25::Bm25Index;
use crate::types::{AppError, IndexInfo, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A retrieved chunk with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub content: String,
    /// Originating document name
    pub source: String,
    /// Ordinal of the chunk within its document
    pub chunk: usize,
}

/// Named collections of document chunks, queryable by text.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Append a document's chunks to `index`, creating it if needed. Returns
    /// the number of chunks stored.
    async fn upsert(&self, index: &str, source: &str, chunks: Vec<String>) -> Result<usize>;

    /// Best `top_k` chunks for `query`, best first.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] when the index does not exist.
    async fn query(&self, index: &str, query: &str, top_k: usize) -> Result<Vec<IndexedChunk>>;

    async fn exists(&self, index: &str) -> bool;

    async fn list(&self) -> Vec<IndexInfo>;
}

struct Collection {
    chunks: Vec<IndexedChunk>,
    ranking: Bm25Index,
    created_at: DateTime<Utc>,
}

impl Collection {
    fn new() -> Self {
        Self {
            chunks: Vec::new(),
            ranking: Bm25Index::new(),
            created_at: Utc::now(),
        }
    }
}

/// BM25-ranked in-memory index store.
#[derive(Default)]
pub struct LocalDocumentIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl LocalDocumentIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentIndex for LocalDocumentIndex {
    async fn upsert(&self, index: &str, source: &str, chunks: Vec<String>) -> Result<usize> {
        let mut collections = self.collections.write();
        let collection = collections.entry(index.to_string()).or_insert_with(|| {
            tracing::info!(index = %index, "Creating document index");
            Collection::new()
        });

        let stored = chunks.len();
        for (ordinal, content) in chunks.into_iter().enumerate() {
            collection.ranking.add(&content);
            collection.chunks.push(IndexedChunk {
                content,
                source: source.to_string(),
                chunk: ordinal,
            });
        }
        Ok(stored)
    }

    async fn query(&self, index: &str, query: &str, top_k: usize) -> Result<Vec<IndexedChunk>> {
        let collections = self.collections.read();
        let collection = collections.get(index).ok_or_else(|| {
            AppError::NotFound(format!(
                "Index {} not found. Please upload a document first.",
                index
            ))
        })?;

        Ok(collection
            .ranking
            .search(query, top_k)
            .into_iter()
            .filter_map(|(ordinal, _)| collection.chunks.get(ordinal).cloned())
            .collect())
    }

    async fn exists(&self, index: &str) -> bool {
        self.collections.read().contains_key(index)
    }

    async fn list(&self) -> Vec<IndexInfo> {
        let mut indexes: Vec<IndexInfo> = self
            .collections
            .read()
            .iter()
            .map(|(name, collection)| IndexInfo {
                name: name.clone(),
                chunk_count: collection.chunks.len(),
                created_at: collection.created_at,
            })
            .collect();
        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        indexes
    }
}
