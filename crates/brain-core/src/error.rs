use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single call to the brain server.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a readable envelope.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered with `status: "error"`.
    #[error("{0}")]
    Application(String),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Client-side rejection of a persona document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("Unsupported file type. Use .txt or .pdf")]
    UnsupportedExtension(String),
}
