//! Source Quality Filter
//!
//! Drops undersized search results and truncates oversized ones. Lengths are
//! measured in characters, not bytes.

use crate::search::RawDocument;

/// Documents shorter than this are treated as boilerplate.
pub const MIN_SOURCE_CHARS: usize = 200;

/// Retained documents are truncated to this many characters.
pub const MAX_SOURCE_CHARS: usize = 1000;

/// Per-call-site document caps.
pub const BASIC_CAP: usize = 5;
pub const DEEP_INITIAL_CAP: usize = 6;
pub const DEEP_FOLLOW_UP_CAP: usize = 4;
pub const SUBAGENT_CAP: usize = 2;

/// A search result that passed the quality filter.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// Between [`MIN_SOURCE_CHARS`] and [`MAX_SOURCE_CHARS`] characters
    pub content: String,
    pub url: String,
    pub title: String,
    /// Zero-based position in the provider's ranking
    pub rank: usize,
}

impl SourceDocument {
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Keep documents of at least [`MIN_SOURCE_CHARS`], truncated to
/// [`MAX_SOURCE_CHARS`], in input order, at most `cap` of them.
pub fn filter_sources(raw: Vec<RawDocument>, cap: usize) -> Vec<SourceDocument> {
    raw.into_iter()
        .enumerate()
        .filter(|(_, doc)| doc.content.chars().count() >= MIN_SOURCE_CHARS)
        .take(cap)
        .map(|(rank, doc)| SourceDocument {
            content: truncate_chars(&doc.content, MAX_SOURCE_CHARS),
            url: doc.url,
            title: doc.title,
            rank,
        })
        .collect()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Numbered excerpt block used as synthesis context.
pub fn format_excerpts(documents: &[SourceDocument]) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("[{}] {} ({})\n{}", i + 1, doc.title, doc.url, doc.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn doc(chars: usize, tag: &str) -> RawDocument {
        RawDocument::new("é".repeat(chars), format!("https://{}.example", tag), tag)
    }

    #[rstest]
    #[case(199, 0)]
    #[case(200, 1)]
    #[case(1000, 1)]
    #[case(5000, 1)]
    fn test_length_boundaries(#[case] chars: usize, #[case] retained: usize) {
        let out = filter_sources(vec![doc(chars, "a")], 5);
        assert_eq!(out.len(), retained);
        for d in &out {
            assert!(d.char_len() >= MIN_SOURCE_CHARS && d.char_len() <= MAX_SOURCE_CHARS);
        }
    }

    #[test]
    fn test_truncation_keeps_prefix() {
        let content = format!("{}{}", "a".repeat(1000), "b".repeat(50));
        let out = filter_sources(vec![RawDocument::new(content, "u", "t")], 1);
        assert_eq!(out[0].content, "a".repeat(1000));
    }

    #[rstest]
    #[case(BASIC_CAP)]
    #[case(DEEP_INITIAL_CAP)]
    #[case(DEEP_FOLLOW_UP_CAP)]
    #[case(SUBAGENT_CAP)]
    fn test_cap_is_respected(#[case] cap: usize) {
        let raw = (0..10).map(|i| doc(300, &i.to_string())).collect();
        assert_eq!(filter_sources(raw, cap).len(), cap);
    }

    #[test]
    fn test_rank_order_is_preserved() {
        let raw = vec![doc(300, "a"), doc(50, "b"), doc(300, "c"), doc(10, "d"), doc(400, "e")];
        let out = filter_sources(raw, 5);
        let titles: Vec<&str> = out.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "c", "e"]);
        let ranks: Vec<usize> = out.iter().map(|d| d.rank).collect();
        assert_eq!(ranks, vec![0, 2, 4]);
    }

    #[test]
    fn test_excerpts_are_numbered() {
        let out = filter_sources(vec![doc(200, "a"), doc(200, "b")], 2);
        let text = format_excerpts(&out);
        assert!(text.starts_with("[1] a"));
        assert!(text.contains("[2] b"));
    }
}
