//! Text chunking with overlap for embedding.

use crate::models::{ChunkingConfig, TextChunk};

/// Sentence-terminating characters, Western and full-width.
const SENTENCE_ENDS: &[char] = &['.', '!', '?', '。', '！', '？'];

/// Splits normalized text into ordered, bounded, overlapping segments.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Target chunk size in characters.
    chunk_size: usize,
    /// Overlap size in characters.
    overlap: usize,
}

impl TextChunker {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1) as usize,
            overlap: config.chunk_overlap as usize,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&ChunkingConfig::default())
    }

    /// Chunk text into overlapping segments.
    ///
    /// Whitespace runs are collapsed to single spaces and the text is
    /// trimmed before windowing. Window ends prefer the last sentence
    /// terminator after the window start, then the last space, then a
    /// hard cut at the window boundary. Empty segments are dropped;
    /// indices are assigned contiguously from 0.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let normalized = normalize_whitespace(text);

        if normalized.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = normalized.chars().collect();
        let total = chars.len();

        if total <= self.chunk_size {
            return vec![TextChunk {
                text: normalized,
                index: 0,
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut index = 0u32;

        while start < total {
            let mut end = start + self.chunk_size;

            // Not at the end of the text: try to break at a sentence or
            // word boundary inside the window.
            if end < total {
                if let Some(boundary) = rfind_after(&chars, start, end, |c| {
                    SENTENCE_ENDS.contains(&c)
                }) {
                    end = boundary + 1;
                } else if let Some(boundary) = rfind_after(&chars, start, end, |c| c == ' ') {
                    end = boundary;
                }
            }

            let slice_end = end.min(total);
            let segment: String = chars[start..slice_end].iter().collect();
            let segment = segment.trim();
            if !segment.is_empty() {
                chunks.push(TextChunk {
                    text: segment.to_string(),
                    index,
                });
                index += 1;
            }

            if end >= total {
                break;
            }

            // max(start + 1, end - overlap): forward progress is
            // guaranteed even when overlap >= chunk size, at the cost of
            // re-embedding nearly duplicate windows in that regime.
            start = (start + 1).max(end.saturating_sub(self.overlap));
        }

        chunks
    }
}

/// Collapse whitespace runs to single spaces and trim.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Last position in `(start, end]` whose character satisfies `pred`,
/// scanning backward from `end`. `end` must be a valid index.
fn rfind_after(
    chars: &[char],
    start: usize,
    end: usize,
    pred: impl Fn(char) -> bool,
) -> Option<usize> {
    let mut pos = end;
    while pos > start {
        if pred(chars[pos]) {
            return Some(pos);
        }
        pos -= 1;
    }
    None
}
