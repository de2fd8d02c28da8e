/// Error types for the field-data library
use thiserror::Error;

/// Main error type for field-data operations
#[derive(Error, Debug)]
pub enum VegError {
    /// An import or update targeted a project that is not in the store
    #[error("Project with id {0} not found")]
    ProjectNotFound(String),

    /// Fetching a remote CSV sheet or photo returned a non-success status
    #[error("Failed to fetch {path}: {status}")]
    Fetch { path: String, status: String },

    /// Reading a local file failed
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP request failed
    #[cfg(feature = "api")]
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The image upload endpoint rejected the file
    #[error("Image upload failed: {status} - {detail}")]
    Upload { status: u16, detail: String },
}

/// Type alias for Results using VegError
pub type Result<T> = std::result::Result<T, VegError>;
