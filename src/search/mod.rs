//! Web search provider contract and the DuckDuckGo implementation.
//!
//! The search provider is an external collaborator: it returns ranked raw
//! documents for a text query. Quality filtering happens downstream in
//! [`crate::research::filter`].

use crate::types::{AppError, Result};
use crate::utils::config::SearchConfig;
use async_trait::async_trait;
use futures::StreamExt;

/// A ranked search hit before quality filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub content: String,
    pub url: String,
    pub title: String,
}

impl RawDocument {
    pub fn new(
        content: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            url: url.into(),
            title: title.into(),
        }
    }
}

/// Returns ranked documents for a text query, best first.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<RawDocument>>;

    fn name(&self) -> &str;
}

/// DuckDuckGo search powered by daedra, optionally fetching each hit's page body.
pub struct DuckDuckGoSearch {
    fetch_pages: bool,
    fetch_concurrency: usize,
}

impl DuckDuckGoSearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            fetch_pages: config.fetch_pages,
            fetch_concurrency: config.fetch_concurrency.max(1),
        }
    }

    /// Page text for a hit, or its snippet when the page can't be fetched.
    async fn fetch_content(url: String, snippet: String) -> String {
        let args = daedra::VisitPageArgs {
            url: url.clone(),
            include_images: false,
            selector: None,
        };

        match daedra::tools::fetch::fetch_page(&args).await {
            Ok(page) => {
                let content = page.content.to_string();
                if content.trim().is_empty() {
                    snippet
                } else {
                    content
                }
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Page fetch failed, using snippet");
                snippet
            }
        }
    }
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new(&SearchConfig::default())
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<RawDocument>> {
        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: max_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let hits: Vec<(String, String, String)> = response
            .data
            .iter()
            .take(max_results)
            .map(|r| (r.title.to_string(), r.url.to_string(), r.description.to_string()))
            .collect();

        if !self.fetch_pages {
            return Ok(hits
                .into_iter()
                .map(|(title, url, snippet)| RawDocument::new(snippet, url, title))
                .collect());
        }

        // `buffered` keeps the search provider's rank order.
        let documents = futures::stream::iter(hits)
            .map(|(title, url, snippet)| async move {
                let content = Self::fetch_content(url.clone(), snippet).await;
                RawDocument::new(content, url, title)
            })
            .buffered(self.fetch_concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(documents)
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_concurrency_is_at_least_one() {
        let config = SearchConfig {
            fetch_concurrency: 0,
            ..SearchConfig::default()
        };
        let search = DuckDuckGoSearch::new(&config);
        assert_eq!(search.fetch_concurrency, 1);
        assert_eq!(search.name(), "duckduckgo");
    }
}
