//! Error types for document store adapters.

use thiserror::Error;

/// Errors that can occur when talking to a document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Authentication failed or no usable token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Credential material could not be loaded.
    #[error("credentials error: {0}")]
    Credentials(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document not found.
    #[error("document not found: {path}")]
    NotFound { path: String },

    /// The store refused a write.
    #[error("write rejected for {path}: {reason}")]
    Rejected { path: String, reason: String },

    /// Invalid response from server.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Error status returned by the Firestore API.
    #[error("API error ({status}): {message}")]
    Api { status: String, message: String },

    /// The configured endpoint cannot carry a request path.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Malformed collection or document path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Batch exceeds the store's per-commit limit.
    #[error("batch of {size} writes exceeds limit of {max}")]
    BatchTooLarge { size: usize, max: usize },
}
