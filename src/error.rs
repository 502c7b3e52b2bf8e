use std::path::PathBuf;
use thiserror::Error;

/// Everything that can abort a pre-build run.
///
/// The variants only exist to keep messages precise; callers treat any of
/// them as the same failure and do not attempt recovery.
#[derive(Error, Debug)]
pub enum PrebuildError {
    #[error("failed to clone {url}: {message}")]
    Clone { url: String, message: String },

    #[error("docs path '{}' not found in {url}", .path.display())]
    DocsPathMissing { url: String, path: PathBuf },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid chunking configuration: {0}")]
    ChunkConfig(#[from] text_splitter::ChunkConfigError),

    #[error("unknown embedding model '{0}'")]
    UnknownModel(String),

    #[error("failed to load embedding model '{name}': {message}")]
    ModelLoad { name: String, message: String },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector store error: {0}")]
    Store(#[from] lancedb::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("embedding dimension mismatch for collection '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("chunk metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("no document chunks to index")]
    NoChunks,

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PrebuildError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PrebuildError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PrebuildError>;
