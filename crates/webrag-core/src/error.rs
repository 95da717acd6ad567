use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Chunking produced nothing worth indexing.
    #[error("No content could be extracted from the input")]
    EmptyContent,

    #[error("Length mismatch: {vectors} vectors for {texts} texts")]
    LengthMismatch { vectors: usize, texts: usize },

    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding failed: {0}")]
    Embed(String),

    #[error("Answer composition failed: {0}")]
    Compose(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
