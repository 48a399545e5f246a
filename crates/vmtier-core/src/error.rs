//! Error types for event parsing and connection parameter loading.

use thiserror::Error;

/// Result type alias for alarm event validation.
pub type EventResult<T> = Result<T, EventError>;

/// Result type alias for connection parameter loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors produced while turning a raw payload into an `AlarmNotification`.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("unmarshalling json: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("{0}")]
    IncompleteEvent(&'static str),
}

/// Errors produced while loading connection parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("loading {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unmarshalling {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("required field(s) missing in config, including {0}")]
    Validation(&'static str),
}
