//! Error types for the directory boundary.

use thiserror::Error;

/// Result type alias for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors that can occur while talking to the directory service.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("log in to inventory api failed: {0}")]
    InventoryLogin(String),

    #[error("log in to tagging api failed: {0}")]
    TaggingLogin(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("category not found: {0}")]
    CategoryNotFound(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("logout failed: {0}")]
    Logout(String),
}
