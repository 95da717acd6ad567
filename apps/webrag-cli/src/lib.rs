//! webrag-cli
//!
//! Wiring shared by the `webrag-server` and `webrag` binaries.

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use webrag_core::config::Settings;
use webrag_embed::get_default_embedder;
use webrag_rag::{OllamaComposer, RetrievalOrchestrator};
use webrag_vector::FlatIndex;

pub mod server;

/// Install the global subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Embedder, empty index and Ollama composer assembled from `settings`.
pub fn build_orchestrator(settings: &Settings) -> Result<RetrievalOrchestrator> {
    let embedder: Arc<dyn webrag_core::traits::Embedder> = Arc::from(get_default_embedder(&settings.embedding)?);
    let index = Arc::new(FlatIndex::new(embedder.dim())?);
    let composer = Arc::new(OllamaComposer::from_settings(&settings.ollama)?);
    let orchestrator = RetrievalOrchestrator::new(index, embedder, composer)?
        .with_chunking(settings.chunking.to_config()?)
        .with_context_size(settings.retrieval.context_size);
    Ok(orchestrator)
}
