//! webrag-rag
//!
//! Query-time orchestration plus the network adapters it talks to: an Ollama
//! answer composer and an HTML page fetcher.

pub mod compose;
pub mod fetch;
pub mod orchestrator;

pub use compose::{build_prompt, OllamaComposer};
pub use fetch::{HtmlExtractor, HttpFetcher};
pub use orchestrator::{RetrievalOrchestrator, NO_KNOWLEDGE_SENTINEL};
