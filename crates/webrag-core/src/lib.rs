//! webrag-core
//!
//! Shared domain types, the collaborator traits, the typed error, the
//! configuration loader and the text chunker.

pub mod chunker;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use chunker::{chunk_text, ChunkingConfig};
pub use error::{Error, Result};
