//! Heading-aware markdown chunker.
//!
//! Splits a markdown document into [`DocumentChunk`]s in a single forward
//! pass over its lines. Level-1 and level-2 headings start new chunks so
//! that each chunk stays on one topic, and a line-count ceiling bounds
//! chunks when a section runs long.
//!
//! # Algorithm
//!
//! 1. `# ` heading: flush the accumulator (attributed to the previous
//!    title/section), restart it with the heading line, and set both
//!    `title` and `section` to the heading text.
//! 2. `## ` heading: flush only if more than `split_threshold` lines have
//!    accumulated since the last split; always update `section` and append
//!    the heading line.
//! 3. Any other line: append; flush when the line count reaches
//!    `max_lines`. Title and section carry forward unchanged.
//! 4. Flush whatever remains at end of input.
//! 5. Drop every chunk whose trimmed content is `min_length` characters or
//!    shorter.
//!
//! # Example
//!
//! ```rust
//! use repo_knowledge_core::chunk::{chunk_markdown, ChunkerOptions};
//!
//! let doc = "# Guide\nThis guide walks through installing and configuring the tool.\n";
//! let chunks = chunk_markdown(doc, "docs/guide.md", "guide.md", &ChunkerOptions::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].title, "Guide");
//! assert_eq!(chunks[0].id, "docs/guide.md:0");
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::DocumentChunk;

/// Default line ceiling for a single chunk.
pub const DEFAULT_MAX_LINES: usize = 50;
/// Lines that must accumulate before a level-2 heading forces a split.
pub const DEFAULT_SPLIT_THRESHOLD: usize = 5;
/// Chunks at or below this many characters are discarded as noise.
pub const DEFAULT_MIN_LENGTH: usize = 50;

/// Tuning knobs for [`chunk_markdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerOptions {
    /// A chunk is emitted once it holds this many lines.
    pub max_lines: usize,
    /// A `## ` heading splits only when more lines than this have accumulated.
    pub split_threshold: usize,
    /// Minimum trimmed length (in characters, exclusive) for a chunk to survive.
    pub min_length: usize,
}

impl Default for ChunkerOptions {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
            min_length: DEFAULT_MIN_LENGTH,
        }
    }
}

/// A chunk body with the heading context it was emitted under.
struct RawChunk {
    text: String,
    title: String,
    section: String,
}

/// Line accumulator for one document's chunking pass.
struct Accumulator {
    buf: String,
    lines: usize,
    title: String,
    section: String,
    emitted: Vec<RawChunk>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            buf: String::new(),
            lines: 0,
            title: String::new(),
            section: String::new(),
            emitted: Vec::new(),
        }
    }

    fn push_line(&mut self, line: &str) {
        self.buf.push_str(line);
        self.buf.push('\n');
        self.lines += 1;
    }

    fn has_content(&self) -> bool {
        !self.buf.trim().is_empty()
    }

    /// Emit the buffer (if non-blank) under the current heading context and reset it.
    fn flush(&mut self) {
        if self.has_content() {
            self.emitted.push(RawChunk {
                text: self.buf.trim().to_string(),
                title: self.title.clone(),
                section: self.section.clone(),
            });
        }
        self.buf.clear();
        self.lines = 0;
    }
}

/// Split markdown `content` into heading-aware chunks.
///
/// * `source_id`: path of the file; becomes [`DocumentChunk::source`] and
///   the prefix of every chunk id.
/// * `display_name`: used as the title until a level-1 heading is seen.
///
/// Chunk ids are `"<source_id>:<ordinal>"` where the ordinal counts only
/// chunks that survive the length filter, so identical input always yields
/// identical ids.
pub fn chunk_markdown(
    content: &str,
    source_id: &str,
    display_name: &str,
    options: &ChunkerOptions,
) -> Vec<DocumentChunk> {
    let max_lines = options.max_lines.max(1);
    let mut acc = Accumulator::new();

    for line in content.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if let Some(heading) = line.strip_prefix("# ") {
            acc.flush();
            acc.push_line(line);
            acc.title = heading.trim().to_string();
            acc.section = acc.title.clone();
        } else if let Some(heading) = line.strip_prefix("## ") {
            if acc.has_content() && acc.lines > options.split_threshold {
                acc.flush();
            }
            acc.section = heading.trim().to_string();
            acc.push_line(line);
        } else {
            acc.push_line(line);
            if acc.lines >= max_lines {
                acc.flush();
            }
        }
    }
    acc.flush();

    acc.emitted
        .into_iter()
        .filter(|raw| raw.text.chars().count() > options.min_length)
        .enumerate()
        .map(|(ordinal, raw)| {
            let title = if raw.title.is_empty() {
                display_name.to_string()
            } else {
                raw.title
            };
            make_chunk(source_id, ordinal, title, raw.section, raw.text)
        })
        .collect()
}

/// Build a [`DocumentChunk`] with its positional id and SHA-256 content hash.
fn make_chunk(
    source_id: &str,
    ordinal: usize,
    title: String,
    section: String,
    content: String,
) -> DocumentChunk {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    DocumentChunk {
        id: format!("{}:{}", source_id, ordinal),
        source: source_id.to_string(),
        title,
        section,
        content,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc: &str) -> Vec<DocumentChunk> {
        chunk_markdown(doc, "docs/test.md", "test.md", &ChunkerOptions::default())
    }

    fn body_line(i: usize) -> String {
        format!("Body line number {} with a little unique text.", i)
    }

    #[test]
    fn test_every_chunk_exceeds_min_length() {
        let mut doc = String::from("# Title\n\n## Empty\n## Also empty\n");
        for i in 0..80 {
            doc.push_str(&body_line(i));
            doc.push('\n');
        }
        doc.push_str("## Tail\nok\n");
        let chunks = chunk(&doc);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.content.trim().chars().count() > DEFAULT_MIN_LENGTH);
        }
    }

    #[test]
    fn test_short_level2_section_does_not_split() {
        // H1 + 3 body lines, H2 + 2 body lines, H2 + 10 body lines.
        let mut doc = String::from("# Overview\n");
        for i in 0..3 {
            doc.push_str(&format!("{}\n", body_line(i)));
        }
        doc.push_str("## First\n");
        for i in 3..5 {
            doc.push_str(&format!("{}\n", body_line(i)));
        }
        doc.push_str("## Second\n");
        for i in 5..15 {
            doc.push_str(&format!("{}\n", body_line(i)));
        }

        let chunks = chunk(&doc);
        assert_eq!(chunks.len(), 2);

        assert!(chunks[0].content.starts_with("# Overview"));
        assert!(chunks[0].content.contains("## First"));
        assert!(!chunks[0].content.contains("## Second"));
        assert_eq!(chunks[0].title, "Overview");
        assert_eq!(chunks[0].section, "First");

        assert!(chunks[1].content.starts_with("## Second"));
        assert_eq!(chunks[1].title, "Overview");
        assert_eq!(chunks[1].section, "Second");
    }

    #[test]
    fn test_headingless_document_splits_on_line_ceiling() {
        let doc = (0..120).map(body_line).collect::<Vec<_>>().join("\n");
        let chunks = chunk(&doc);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content.lines().count(), 50);
        assert_eq!(chunks[1].content.lines().count(), 50);
        assert_eq!(chunks[2].content.lines().count(), 20);
        assert!(chunks[1].content.starts_with(&body_line(50)));
        assert!(chunks[2].content.starts_with(&body_line(100)));
        for c in &chunks {
            assert_eq!(c.title, "test.md");
            assert_eq!(c.section, "");
        }
    }

    #[test]
    fn test_size_split_keeps_heading_context() {
        let mut doc = String::from("# Reference\n## Options\n");
        for i in 0..60 {
            doc.push_str(&format!("{}\n", body_line(i)));
        }
        let chunks = chunk(&doc);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].title, "Reference");
        assert_eq!(chunks[1].section, "Options");
    }

    #[test]
    fn test_level1_heading_flushes_with_previous_context() {
        let doc = format!(
            "# One\n{}\n{}\n# Two\n{}\n{}\n",
            body_line(1),
            body_line(2),
            body_line(3),
            body_line(4)
        );
        let chunks = chunk(&doc);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].title, "One");
        assert!(!chunks[0].content.contains("# Two"));
        assert_eq!(chunks[1].title, "Two");
        assert_eq!(chunks[1].section, "Two");
        assert!(chunks[1].content.starts_with("# Two"));
    }

    #[test]
    fn test_back_to_back_headings_yield_dropped_heading_chunk() {
        let doc = format!("# Lonely\n# Next\n{}\n{}\n", body_line(1), body_line(2));
        let chunks = chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].title, "Next");
    }

    #[test]
    fn test_deeper_headings_are_body_lines() {
        let doc = format!("# Top\n### Deep\n{}\n", body_line(1));
        let chunks = chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, "Top");
        assert!(chunks[0].content.contains("### Deep"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let doc = format!("# Windows\r\n{}\r\n## Part\r\n{}\r\n", body_line(1), body_line(2));
        let chunks = chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].title, "Windows");
        assert_eq!(chunks[0].section, "Part");
    }

    #[test]
    fn test_ids_are_positional_and_deterministic() {
        let doc = (0..120).map(body_line).collect::<Vec<_>>().join("\n");
        let a = chunk(&doc);
        let b = chunk(&doc);
        assert_eq!(a, b);
        for (i, c) in a.iter().enumerate() {
            assert_eq!(c.id, format!("docs/test.md:{}", i));
            assert_eq!(c.source, "docs/test.md");
        }
    }

    #[test]
    fn test_empty_document() {
        assert!(chunk("").is_empty());
        assert!(chunk("\n\n   \n").is_empty());
    }

    #[test]
    fn test_min_length_counts_characters() {
        // 26 three-byte chars: 78 bytes but only 26 characters.
        let doc = "語".repeat(26);
        assert!(chunk(&doc).is_empty());
    }

    #[test]
    fn test_custom_max_lines() {
        let doc = (0..20).map(body_line).collect::<Vec<_>>().join("\n");
        let opts = ChunkerOptions {
            max_lines: 10,
            ..ChunkerOptions::default()
        };
        let chunks = chunk_markdown(&doc, "a.md", "a.md", &opts);
        assert_eq!(chunks.len(), 2);
    }
}
