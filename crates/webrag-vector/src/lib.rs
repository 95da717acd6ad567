//! webrag-vector
//!
//! In-memory, append-only vector index with exact Euclidean k-NN search.
//! Vectors live in one contiguous row-major buffer next to their texts; a
//! single `RwLock` guards both so a reader never sees a vector without its
//! text. Searches share the read lock; appends take the write lock only for
//! the copy.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use webrag_core::error::{Error, Result};
use webrag_core::traits::VectorIndexer;
use webrag_core::types::SearchHit;

pub mod search;

pub use search::{squared_l2, top_k_nearest};

#[derive(Default)]
struct Corpus {
    vectors: Vec<f32>,
    texts: Vec<Arc<str>>,
}

pub struct FlatIndex {
    dim: usize,
    corpus: RwLock<Corpus>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidConfig("index dimension must be greater than zero".to_string()));
        }
        Ok(Self { dim, corpus: RwLock::new(Corpus::default()) })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.corpus.read().unwrap_or_else(PoisonError::into_inner).texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one entry per `(vector, text)` pair, in order.
    ///
    /// The whole call is rejected before anything is written if the lengths
    /// differ or any vector has the wrong dimension.
    pub fn add(&self, vectors: &[Vec<f32>], texts: &[String]) -> Result<()> {
        if vectors.len() != texts.len() {
            return Err(Error::LengthMismatch { vectors: vectors.len(), texts: texts.len() });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: bad.len() });
        }
        if vectors.is_empty() {
            return Ok(());
        }

        let flat: Vec<f32> = vectors.iter().flatten().copied().collect();
        let shared: Vec<Arc<str>> = texts.iter().map(|t| Arc::from(t.as_str())).collect();

        let mut corpus = self.corpus.write().unwrap_or_else(PoisonError::into_inner);
        corpus.vectors.reserve(flat.len());
        corpus.texts.reserve(shared.len());
        corpus.vectors.extend_from_slice(&flat);
        corpus.texts.extend(shared);
        debug!(added = texts.len(), total = corpus.texts.len(), "appended to index");
        Ok(())
    }

    /// Texts of the `k` nearest entries, closest first.
    ///
    /// An empty index yields an empty result; `k` larger than the corpus is
    /// clamped.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Arc<str>>> {
        Ok(self.search_hits(query, k)?.into_iter().map(|hit| hit.text).collect())
    }

    pub fn search_hits(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
        }
        let corpus = self.corpus.read().unwrap_or_else(PoisonError::into_inner);
        let k = k.min(corpus.texts.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        let hits = top_k_nearest(query, &corpus.vectors, k)
            .into_iter()
            .map(|(position, distance)| SearchHit { position, distance, text: Arc::clone(&corpus.texts[position]) })
            .collect();
        Ok(hits)
    }
}

impl VectorIndexer for FlatIndex {
    fn dim(&self) -> usize { Self::dim(self) }
    fn len(&self) -> usize { Self::len(self) }
    fn add(&self, vectors: &[Vec<f32>], texts: &[String]) -> Result<()> { Self::add(self, vectors, texts) }
    fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> { Self::search_hits(self, query_vec, k) }
}
