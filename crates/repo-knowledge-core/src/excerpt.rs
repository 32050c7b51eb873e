//! Query-focused excerpts and short summaries for search results.

use crate::score::query_words;

/// Maximum number of matching sentences kept in an excerpt.
pub const EXCERPT_MAX_SENTENCES: usize = 3;
/// Characters kept when no sentence matches the query.
pub const EXCERPT_FALLBACK_CHARS: usize = 300;
/// Characters kept in a summary before truncation.
pub const SUMMARY_MAX_CHARS: usize = 150;

/// Pick the sentences of `content` that mention the query.
///
/// Sentences are split on `.`, `!`, or `?` followed by whitespace. A
/// sentence is kept when it contains at least one query word longer than
/// two characters. Up to three sentences are joined with `". "` and closed
/// with a period. When nothing matches, the first 300 characters are
/// returned; `...` is appended only when that cut actually drops content, so
/// shorter content comes back unchanged.
pub fn extract_excerpt(content: &str, query: &str) -> String {
    let words = query_words(query);

    let matching: Vec<&str> = if words.is_empty() {
        Vec::new()
    } else {
        split_sentences(content)
            .into_iter()
            .filter(|sentence| {
                let lower = sentence.to_lowercase();
                words.iter().any(|w| lower.contains(w.as_str()))
            })
            .take(EXCERPT_MAX_SENTENCES)
            .collect()
    };

    if matching.is_empty() {
        return truncate_chars(content, EXCERPT_FALLBACK_CHARS);
    }

    format!("{}.", matching.join(". "))
}

/// First paragraph of `content`, stripped of heading markers, at most 150
/// characters (plus `...` when truncated).
pub fn extract_summary(content: &str) -> String {
    let mut paragraph: Vec<&str> = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            if paragraph.is_empty() {
                continue;
            }
            break;
        }
        paragraph.push(line);
    }

    let joined = paragraph.join("\n");
    let stripped = joined.trim_start_matches('#').trim();
    truncate_chars(stripped, SUMMARY_MAX_CHARS)
}

/// Split text into trimmed, non-empty sentences without their terminators.
fn split_sentences(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if !is_terminator(c) {
            i += 1;
            continue;
        }

        let mut j = i;
        while j < chars.len() && is_terminator(chars[j].1) {
            j += 1;
        }
        if j < chars.len() && chars[j].1.is_whitespace() {
            sentences.push(&text[start..pos]);
            while j < chars.len() && chars[j].1.is_whitespace() {
                j += 1;
            }
            start = chars.get(j).map(|(p, _)| *p).unwrap_or(text.len());
        }
        i = j;
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
        .into_iter()
        .map(|s| s.trim().trim_end_matches(is_terminator).trim_end())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Keep the first `max` characters, appending `...` if anything was cut.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_keeps_matching_sentences() {
        let content = "Install the CLI first. Then run it! Configure the cache? Done.";
        let excerpt = extract_excerpt(content, "install cache");
        assert_eq!(excerpt, "Install the CLI first. Configure the cache.");
    }

    #[test]
    fn test_excerpt_limits_to_three_sentences() {
        let content = "Rust one. Rust two. Rust three. Rust four.";
        assert_eq!(extract_excerpt(content, "rust"), "Rust one. Rust two. Rust three.");
    }

    #[test]
    fn test_excerpt_fallback_truncates() {
        let content = "x".repeat(400);
        let excerpt = extract_excerpt(&content, "nothing");
        assert_eq!(excerpt.len(), 303);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn test_excerpt_fallback_short_content_untouched() {
        assert_eq!(extract_excerpt("Short text here.", "absent"), "Short text here.");
    }

    #[test]
    fn test_excerpt_ignores_short_query_words() {
        let content = "An ox ran. Cattle grazed.";
        // "ox" is too short to count as a query word.
        assert_eq!(extract_excerpt(content, "ox"), content);
    }

    #[test]
    fn test_sentence_split_requires_whitespace() {
        let sentences = split_sentences("Version 1.2.3 is out. See docs/v1.2 now");
        assert_eq!(sentences, vec!["Version 1.2.3 is out", "See docs/v1.2 now"]);
    }

    #[test]
    fn test_summary_first_paragraph_without_markers() {
        let content = "# Getting Started\nInstall it.\n\nSecond paragraph.";
        assert_eq!(extract_summary(content), "Getting Started\nInstall it.");
    }

    #[test]
    fn test_summary_truncates() {
        let content = format!("## {}", "word ".repeat(60));
        let summary = extract_summary(&content);
        assert!(summary.ends_with("..."));
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS + 3);
        assert!(!summary.starts_with('#'));
    }
}
