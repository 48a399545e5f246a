//! vmtier-core — alarm events, tier policy, and connection parameters.
//!
//! Pure building blocks for the tagging pipeline:
//!
//! - [`event`]: validate a raw alarm payload and decide whether it is
//!   actionable (a CPU or memory alarm that went red).
//! - [`tier`]: compute the next CPU or memory tier name.
//! - [`config`]: load and validate `vcconfig.toml`.

pub mod config;
pub mod error;
pub mod event;
pub mod tier;
pub mod types;

pub use config::{ConnectionParams, ParamsSource, TomlFileSource, VcConfig, DEFAULT_CONFIG_PATH};
pub use error::{ConfigError, ConfigResult, EventError, EventResult};
pub use types::*;
