//! Tagging pipeline error types.
//!
//! Each variant names the stage that failed; the rendered message is what
//! the caller receives in the response body.

use thiserror::Error;

use vmtier_core::{ConfigError, EventError};
use vmtier_directory::DirectoryError;

/// Result type alias for a single invocation.
pub type TaggingResult<T> = Result<T, TaggingError>;

/// Errors from the configuration fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no config info in vm {0}")]
    ConfigUnavailable(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// A failed invocation, wrapped with the stage it failed in.
#[derive(Debug, Error)]
pub enum TaggingError {
    #[error("parsing cloud event data: {0}")]
    Event(#[from] EventError),

    #[error("loading of vcconfig: {0}")]
    Config(#[from] ConfigError),

    #[error("connecting to vSphere: {0}")]
    Connect(#[source] DirectoryError),

    #[error("retrieving VM configuration: {0}")]
    Fetch(#[from] FetchError),

    #[error("selecting tag: {0}")]
    Resolve(#[source] DirectoryError),

    #[error("tagging managed reference object: {0}")]
    Apply(#[source] DirectoryError),
}
