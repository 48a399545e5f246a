//! vcconfig.toml connection parameters.
//!
//! The file is mounted from the secret store and re-read on every
//! invocation so rotated credentials apply without a restart:
//!
//! ```toml
//! [VCenter]
//! Server = "vcenter.example.com"
//! User = "administrator@vsphere.local"
//! Password = "..."
//! Insecure = true
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Well-known location of the mounted vcconfig secret.
pub const DEFAULT_CONFIG_PATH: &str = "/var/openfaas/secrets/vcconfig";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VcConfig {
    #[serde(rename = "VCenter")]
    pub vcenter: ConnectionParams,
}

/// Server address and credentials for the directory service.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionParams {
    #[serde(rename = "Server", default)]
    pub server: String,
    #[serde(rename = "User", default)]
    pub user: String,
    #[serde(rename = "Password", default)]
    pub password: String,
    /// Skip TLS certificate verification.
    #[serde(rename = "Insecure", default)]
    pub insecure: bool,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("server", &self.server)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("insecure", &self.insecure)
            .finish()
    }
}

impl ConnectionParams {
    /// Ensure the bare minimum of information is present.
    ///
    /// Multiple fields may be missing; the first one in
    /// server/user/password order is reported.
    pub fn validate(&self) -> ConfigResult<()> {
        let required = [
            ("vcenter server", &self.server),
            ("vcenter user", &self.user),
            ("vcenter password", &self.password),
        ];

        match required.iter().find(|(_, value)| value.is_empty()) {
            Some((field, _)) => Err(ConfigError::Validation(*field)),
            None => Ok(()),
        }
    }
}

impl VcConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let origin = path.display().to_string();
        debug!(path = %path.display(), "loading vcconfig");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Load {
            path: origin.clone(),
            source,
        })?;
        Self::from_toml_str(&content, &origin)
    }

    fn from_toml_str(content: &str, origin: &str) -> ConfigResult<Self> {
        let config: VcConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        config.vcenter.validate()?;
        Ok(config)
    }
}

/// Where connection parameters come from.
///
/// Implementations are consulted once per invocation.
pub trait ParamsSource: Send + Sync {
    fn load(&self) -> ConfigResult<ConnectionParams>;
}

/// Reads a vcconfig TOML file from disk on every `load`.
#[derive(Debug, Clone)]
pub struct TomlFileSource {
    path: PathBuf,
}

impl TomlFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for TomlFileSource {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}

impl ParamsSource for TomlFileSource {
    fn load(&self) -> ConfigResult<ConnectionParams> {
        VcConfig::from_file(&self.path).map(|cfg| cfg.vcenter)
    }
}

/// Fixed parameters, validated on every `load` like a file would be.
impl ParamsSource for ConnectionParams {
    fn load(&self) -> ConfigResult<ConnectionParams> {
        self.validate()?;
        Ok(self.clone())
    }
}
