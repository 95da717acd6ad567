use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use webrag_core::chunker::{chunk, ChunkingConfig};
use webrag_core::error::{Error, Result};
use webrag_core::traits::{AnswerComposer, Embedder, VectorIndexer};
use webrag_vector::FlatIndex;

/// Returned by `answer` when the corpus has nothing to offer.
pub const NO_KNOWLEDGE_SENTINEL: &str = "No knowledge has been ingested yet.";

const CONTEXT_SEPARATOR: &str = "\n\n";

/// Chunker -> embedder -> index on ingest; embedder -> index -> composer on query.
///
/// Cloning is cheap: every collaborator sits behind an `Arc`, so clones share
/// one corpus.
pub struct RetrievalOrchestrator<VI: VectorIndexer = FlatIndex> {
    index: Arc<VI>,
    embedder: Arc<dyn Embedder>,
    composer: Arc<dyn AnswerComposer>,
    chunking: ChunkingConfig,
    context_size: usize,
}

impl<VI: VectorIndexer> Clone for RetrievalOrchestrator<VI> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            embedder: Arc::clone(&self.embedder),
            composer: Arc::clone(&self.composer),
            chunking: self.chunking,
            context_size: self.context_size,
        }
    }
}

impl<VI: VectorIndexer + 'static> RetrievalOrchestrator<VI> {
    pub fn new(index: Arc<VI>, embedder: Arc<dyn Embedder>, composer: Arc<dyn AnswerComposer>) -> Result<Self> {
        if index.dim() != embedder.dim() {
            return Err(Error::DimensionMismatch { expected: index.dim(), actual: embedder.dim() });
        }
        Ok(Self { index, embedder, composer, chunking: ChunkingConfig::default(), context_size: 3 })
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_context_size(mut self, context_size: usize) -> Self {
        self.context_size = context_size;
        self
    }

    pub fn index(&self) -> &Arc<VI> {
        &self.index
    }

    pub fn context_size(&self) -> usize {
        self.context_size
    }

    /// Chunk, embed and append `raw_text`. Returns the number of chunks added.
    ///
    /// Nothing reaches the index unless every chunk was embedded.
    pub fn ingest(&self, raw_text: &str) -> Result<usize> {
        let start = Instant::now();
        let texts: Vec<String> = chunk(raw_text, &self.chunking).into_iter().map(|c| c.text).collect();
        if texts.is_empty() {
            return Err(Error::EmptyContent);
        }

        let vectors = self.embed(&texts)?;
        self.index.add(&vectors, &texts)?;
        info!(chunks = texts.len(), corpus = self.index.len(), elapsed_ms = start.elapsed().as_millis(), "ingested text");
        Ok(texts.len())
    }

    /// Ranked chunk texts for `question`, closest first.
    pub fn retrieve(&self, question: &str, k: usize) -> Result<Vec<Arc<str>>> {
        let mut vectors = self.embed(&[question.to_string()])?;
        let query = vectors.pop().ok_or_else(|| Error::Embed("embedder returned no vector for the question".to_string()))?;
        let hits = self.index.search_vec(&query, k)?;
        debug!(k, hits = hits.len(), "retrieved context");
        Ok(hits.into_iter().map(|h| h.text).collect())
    }

    pub async fn answer(&self, question: &str) -> Result<String> {
        self.answer_with(question, self.context_size).await
    }

    /// Retrieve `context_size` chunks and hand them to the composer.
    ///
    /// Embedding runs on the blocking pool. An empty corpus answers with
    /// [`NO_KNOWLEDGE_SENTINEL`] without calling the composer.
    pub async fn answer_with(&self, question: &str, context_size: usize) -> Result<String> {
        let this = self.clone();
        let owned = question.to_string();
        let context = tokio::task::spawn_blocking(move || this.retrieve(&owned, context_size))
            .await
            .map_err(|e| Error::Operation(format!("retrieval task failed: {e}")))??;

        if context.is_empty() {
            return Ok(NO_KNOWLEDGE_SENTINEL.to_string());
        }
        let joined = context.iter().map(|t| &**t).collect::<Vec<_>>().join(CONTEXT_SEPARATOR);

        let start = Instant::now();
        let answer = self
            .composer
            .compose(&joined, question)
            .await
            .map_err(|e| Error::Compose(format!("{e:#}")))?;
        info!(context_chunks = context.len(), elapsed_ms = start.elapsed().as_millis(), "composed answer");
        Ok(answer)
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.embedder.embed_batch(texts).map_err(|e| Error::Embed(format!("{e:#}")))?;
        if vectors.len() != texts.len() {
            return Err(Error::Embed(format!("embedder returned {} vectors for {} texts", vectors.len(), texts.len())));
        }
        Ok(vectors)
    }
}
