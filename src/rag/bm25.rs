//! Okapi BM25 ranking over the chunks of one index.

use std::collections::{HashMap, HashSet};

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Lexical index keyed by chunk ordinal.
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    /// Chunk ordinal -> term frequencies
    term_counts: Vec<HashMap<String, usize>>,
    /// Chunk ordinal -> token count
    lengths: Vec<usize>,
    /// Term -> chunk ordinals containing it
    postings: HashMap<String, HashSet<usize>>,
    total_tokens: usize,
}

/// Lowercased alphanumeric terms longer than one character.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.chars().count() > 1)
        .map(String::from)
        .collect()
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Index the next chunk; returns its ordinal.
    pub fn add(&mut self, content: &str) -> usize {
        let ordinal = self.lengths.len();
        let tokens = tokenize(content);

        let mut counts: HashMap<String, usize> = HashMap::new();
        for token in &tokens {
            *counts.entry(token.clone()).or_insert(0) += 1;
        }
        for term in counts.keys() {
            self.postings.entry(term.clone()).or_default().insert(ordinal);
        }

        self.total_tokens += tokens.len();
        self.lengths.push(tokens.len());
        self.term_counts.push(counts);
        ordinal
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.len() as f32;
        let df = self.postings.get(term).map_or(0, HashSet::len) as f32;
        if df == 0.0 {
            return 0.0;
        }
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn score(&self, ordinal: usize, terms: &[String], avg_len: f32) -> f32 {
        let counts = &self.term_counts[ordinal];
        let len = self.lengths[ordinal] as f32;
        terms
            .iter()
            .map(|term| {
                let tf = counts.get(term).copied().unwrap_or(0) as f32;
                if tf == 0.0 {
                    return 0.0;
                }
                let norm = K1 * (1.0 - B + B * len / avg_len);
                self.idf(term) * tf * (K1 + 1.0) / (tf + norm)
            })
            .sum()
    }

    /// Top `k` chunk ordinals with a positive score, best first; ties keep
    /// document order.
    pub fn search(&self, query: &str, k: usize) -> Vec<(usize, f32)> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut terms = tokenize(query);
        terms.sort();
        terms.dedup();

        let candidates: HashSet<usize> = terms
            .iter()
            .filter_map(|t| self.postings.get(t))
            .flatten()
            .copied()
            .collect();

        let avg_len = (self.total_tokens as f32 / self.len() as f32).max(1.0);
        let mut scored: Vec<(usize, f32)> = candidates
            .into_iter()
            .map(|ordinal| (ordinal, self.score(ordinal, &terms, avg_len)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }
}
