//! Query Dispatcher
//!
//! One search call per logical sub-query, filtered and capped. Search
//! failures and timeouts degrade to an empty document set.

use crate::research::filter::{SourceDocument, filter_sources};
use crate::search::SearchProvider;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Documents retained for one sub-query.
#[derive(Debug, Clone, Default)]
pub struct Dispatch {
    pub documents: Vec<SourceDocument>,
    pub latency: Duration,
}

#[derive(Clone)]
pub struct QueryDispatcher {
    search: Arc<dyn SearchProvider>,
    timeout: Duration,
}

impl QueryDispatcher {
    pub fn new(search: Arc<dyn SearchProvider>, timeout: Duration) -> Self {
        Self { search, timeout }
    }

    /// Search for `query` and keep at most `cap` documents that pass the filter.
    pub async fn dispatch(&self, query: &str, cap: usize) -> Dispatch {
        let started = Instant::now();
        // Over-fetch so undersized results don't starve the cap.
        let requested = cap.saturating_mul(2).max(cap);

        let search = self.search.search(query, requested);
        let raw = match tokio::time::timeout(self.timeout, search).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                tracing::warn!(
                    query = %query,
                    provider = self.search.name(),
                    error = %e,
                    "Search failed, continuing without sources"
                );
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    query = %query,
                    provider = self.search.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Search timed out, continuing without sources"
                );
                Vec::new()
            }
        };

        let candidates = raw.len();
        let documents = filter_sources(raw, cap);
        let latency = started.elapsed();

        tracing::info!(
            query = %query,
            candidates,
            documents = documents.len(),
            latency_ms = latency.as_millis() as u64,
            "Dispatched sub-query"
        );

        Dispatch { documents, latency }
    }
}
