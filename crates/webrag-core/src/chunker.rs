//! Overlapping character-window chunker with a sentence-boundary heuristic.
//!
//! Input whitespace is collapsed to single spaces before segmentation, so every
//! offset refers to the normalized text. Windows are measured in characters,
//! never bytes, so multi-byte input is never split inside a code point.

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::Chunk;

/// A window is only shortened to a sentence boundary found past this share
/// of `chunk_size`, expressed in tenths.
const SNAP_THRESHOLD_TENTHS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, overlap: 200 }
    }
}

impl ChunkingConfig {
    /// Rejects configurations where the window could not advance.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than zero".to_string()));
        }
        if overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

/// Validate `chunk_size`/`overlap` and split `text`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(chunk(text, &ChunkingConfig::new(chunk_size, overlap)?))
}

/// Split `text` into ordered, overlapping chunks.
///
/// Empty or whitespace-only input yields no chunks.
pub fn chunk(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = normalized.chars().collect();
    let len = chars.len();
    let size = config.chunk_size;
    let overlap = config.overlap;
    // Smallest cursor step a snapped window may cause: half the nominal stride.
    let min_step = (size - overlap).div_ceil(2);

    let mut chunks = Vec::with_capacity(len / (size - overlap) + 1);
    let mut start = 0usize;
    while start < len {
        let mut end = start + size;
        if end >= len {
            push_chunk(&mut chunks, &chars, start, len);
            break;
        }

        if let Some(pos) = last_sentence_break(&chars[start..end]) {
            let snapped = start + pos + 2;
            if pos * 10 > size * SNAP_THRESHOLD_TENTHS && snapped.saturating_sub(overlap) >= start + min_step {
                end = snapped;
            }
        }
        push_chunk(&mut chunks, &chars, start, end);
        start = end - overlap;
    }
    debug!(chars = len, chunks = chunks.len(), "chunked text");
    chunks
}

/// Collapse every whitespace run to one space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Position of the last ". " that lies entirely inside `window`.
fn last_sentence_break(window: &[char]) -> Option<usize> {
    window.windows(2).rposition(|pair| pair[0] == '.' && pair[1] == ' ')
}

fn push_chunk(chunks: &mut Vec<Chunk>, chars: &[char], start: usize, end: usize) {
    let slice = &chars[start..end];
    let leading = slice.iter().take_while(|c| c.is_whitespace()).count();
    let text: String = slice.iter().collect();
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    chunks.push(Chunk { text: text.to_string(), start_offset: start + leading });
}
