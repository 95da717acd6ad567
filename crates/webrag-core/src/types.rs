//! Domain types shared by the chunker, the index and the orchestrator.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A slice of normalized source text that is embedded and indexed on its own.
///
/// - `text`: trimmed chunk payload, never empty
/// - `start_offset`: character offset of `text` inside the normalized input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub start_offset: usize,
}

/// A single nearest-neighbour match.
///
/// `position` is the insertion index of the entry in the corpus and
/// `distance` the squared Euclidean distance to the query; lower is better.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub position: usize,
    pub distance: f32,
    pub text: Arc<str>,
}
