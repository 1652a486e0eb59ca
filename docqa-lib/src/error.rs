//! Error types for docqa

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for docqa operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in docqa operations
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load or run the embedding model
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The uploaded document could not be turned into text
    #[error("failed to process PDF: {0}")]
    Extraction(String),

    /// The chunk set could not be turned into an index
    #[error("index build error: {0}")]
    IndexBuild(String),

    /// Nothing has been built for this index yet
    #[error("no index found at {}; upload a document first", .0.display())]
    IndexNotFound(PathBuf),

    /// Persisted index data is unreadable or belongs to something else
    #[error("index at {} is corrupt: {reason}", path.display())]
    IndexCorrupt { path: PathBuf, reason: String },

    /// Token exchange with the identity service failed
    #[error("failed to get IAM token: {message}")]
    Credential {
        status: Option<u16>,
        message: String,
    },

    /// The generation endpoint answered with a non-success status
    #[error("Error: {status} - {body}")]
    Upstream { status: u16, body: String },

    /// An outbound call exceeded its time budget
    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// Connection-level failure talking to an upstream service
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid input provided
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Filesystem failure reading or writing an index
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether repeating the failed call could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::UpstreamTimeout(_) => true,
            Error::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::IndexCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
