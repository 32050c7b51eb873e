//! Field-weighted lexical relevance scoring.
//!
//! A chunk's score is the sum of two components:
//!
//! | Component | Title | Section | Content |
//! |-----------|-------|---------|---------|
//! | Whole-query phrase, per occurrence | 10 | 5 | 1 |
//! | Query word (> 2 chars), per field present in | 3 | 2 | 1 |
//!
//! Matching is case-insensitive and literal: the query is never compiled
//! as a pattern, so characters such as `*`, `(`, or `\` match themselves.
//! The whole-query phrase is the query with surrounding whitespace trimmed.
//! A score of `0` means "not a match".

use serde::Serialize;

use crate::models::DocumentChunk;

pub const TITLE_PHRASE_WEIGHT: u32 = 10;
pub const SECTION_PHRASE_WEIGHT: u32 = 5;
pub const CONTENT_PHRASE_WEIGHT: u32 = 1;

pub const TITLE_WORD_BONUS: u32 = 3;
pub const SECTION_WORD_BONUS: u32 = 2;
pub const CONTENT_WORD_BONUS: u32 = 1;

/// Query words must be longer than this many characters to earn a bonus.
pub const MIN_WORD_CHARS: usize = 2;

/// Per-component score for one chunk, useful for `--explain` style output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    /// Weighted occurrence count of the whole query.
    pub phrase: u32,
    /// Sum of per-word presence bonuses.
    pub words: u32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.phrase + self.words
    }
}

/// Lowercased query words eligible for presence bonuses.
pub fn query_words(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .filter(|w| w.chars().count() > MIN_WORD_CHARS)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Score a chunk against a query. The phrase component matches
/// `query.trim()` literally.
pub fn score(chunk: &DocumentChunk, query: &str) -> u32 {
    explain(chunk, query).total()
}

/// Score a chunk against a query, keeping the two components apart.
///
/// The phrase is `query.trim()`, lowercased and matched literally, so
/// leading or trailing spaces never stop a phrase match.
pub fn explain(chunk: &DocumentChunk, query: &str) -> ScoreBreakdown {
    let phrase = query.trim().to_lowercase();
    if phrase.is_empty() {
        return ScoreBreakdown::default();
    }

    let title = chunk.title.to_lowercase();
    let section = chunk.section.to_lowercase();
    let content = chunk.content.to_lowercase();

    let phrase_score = occurrences(&title, &phrase) * TITLE_PHRASE_WEIGHT
        + occurrences(&section, &phrase) * SECTION_PHRASE_WEIGHT
        + occurrences(&content, &phrase) * CONTENT_PHRASE_WEIGHT;

    let mut word_score = 0;
    for word in query_words(&phrase) {
        if title.contains(&word) {
            word_score += TITLE_WORD_BONUS;
        }
        if section.contains(&word) {
            word_score += SECTION_WORD_BONUS;
        }
        if content.contains(&word) {
            word_score += CONTENT_WORD_BONUS;
        }
    }

    ScoreBreakdown {
        phrase: phrase_score,
        words: word_score,
    }
}

/// Non-overlapping literal occurrences of `needle` in `haystack`.
fn occurrences(haystack: &str, needle: &str) -> u32 {
    haystack.matches(needle).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_chunk(title: &str, section: &str, content: &str) -> DocumentChunk {
        DocumentChunk {
            id: "doc.md:0".to_string(),
            source: "doc.md".to_string(),
            title: title.to_string(),
            section: section.to_string(),
            content: content.to_string(),
            hash: String::new(),
        }
    }

    #[test]
    fn test_title_match_outranks_content_match() {
        let in_title = make_chunk("Deployment", "Intro", "How the pieces fit together.");
        let in_content = make_chunk("Guide", "Intro", "Deployment: how the pieces fit together.");
        assert!(score(&in_title, "deployment") > score(&in_content, "deployment"));
    }

    #[test]
    fn test_phrase_weights() {
        let c = make_chunk("Setup", "Setup", "setup then setup again");
        let b = explain(&c, "setup");
        assert_eq!(b.phrase, 10 + 5 + 2);
        assert_eq!(b.words, 3 + 2 + 1);
        assert_eq!(score(&c, "setup"), 23);
    }

    #[test]
    fn test_word_bonus_is_presence_not_frequency() {
        let c = make_chunk("Other", "Other", "cache cache cache cache");
        let b = explain(&c, "cache layer");
        assert_eq!(b.phrase, 0);
        assert_eq!(b.words, CONTENT_WORD_BONUS);
    }

    #[test]
    fn test_short_words_earn_no_bonus() {
        let c = make_chunk("Go to it", "", "go to it now");
        let b = explain(&c, "go to");
        assert_eq!(b.words, 0);
        // The phrase itself still matches.
        assert_eq!(b.phrase, TITLE_PHRASE_WEIGHT + CONTENT_PHRASE_WEIGHT);
    }

    #[test]
    fn test_case_insensitive() {
        let c = make_chunk("API Reference", "", "Calls the API.");
        assert_eq!(score(&c, "api"), score(&c, "API"));
        assert!(score(&c, "Api") > 0);
    }

    #[test]
    fn test_empty_and_whitespace_query_scores_zero() {
        let c = make_chunk("Anything", "Anything", "anything at all");
        assert_eq!(score(&c, ""), 0);
        assert_eq!(score(&c, "   \t\n"), 0);
    }

    #[test]
    fn test_special_characters_match_literally() {
        let c = make_chunk("Regex", "", "Use a.*b or (foo|bar) with care; [x] too.");
        assert_eq!(explain(&c, "a.*b").phrase, 1);
        assert_eq!(explain(&c, "(foo|bar)").phrase, 1);
        assert_eq!(explain(&c, "[x]").phrase, 1);
        assert_eq!(explain(&c, "a+b").phrase, 0);
    }

    #[test]
    fn test_phrase_ignores_surrounding_whitespace() {
        let c = make_chunk("Quick Start", "", "A quick start for new users.");
        assert_eq!(explain(&c, "  quick start\n"), explain(&c, "quick start"));
        assert_eq!(explain(&c, " quick start ").phrase, 11);
    }

    #[test]
    fn test_no_match_is_zero() {
        let c = make_chunk("Install", "Linux", "apt install things");
        assert_eq!(score(&c, "kubernetes"), 0);
    }

    #[test]
    fn test_query_words_filter() {
        assert_eq!(query_words("a an the Rust"), vec!["the", "rust"]);
        assert!(query_words("   ").is_empty());
    }
}
