use async_trait::async_trait;

use crate::types::SearchHit;

/// Maps texts to fixed-length vectors of dimension `dim()`.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Append-only store answering k-nearest-neighbour queries.
///
/// Implementations must return hits ordered by ascending distance with ties
/// resolved by insertion order, and clamp `k` to the corpus size.
pub trait VectorIndexer: Send + Sync {
    fn dim(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn add(&self, vectors: &[Vec<f32>], texts: &[String]) -> crate::Result<()>;
    fn search_vec(&self, query_vec: &[f32], k: usize) -> crate::Result<Vec<SearchHit>>;
}

/// Turns retrieved context and a question into answer text.
#[async_trait]
pub trait AnswerComposer: Send + Sync {
    async fn compose(&self, context: &str, question: &str) -> anyhow::Result<String>;
}

/// Fetches readable text for a URL. Returns an empty string when the remote
/// side answers with a non-success status.
#[async_trait]
pub trait TextFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> anyhow::Result<String>;
}
