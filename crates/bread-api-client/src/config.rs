/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed client configuration and local data locations
[POS]:    Configuration layer - command-line front end setup
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::{BreadError, ClientConfig, Result};

/// On-disk configuration; every field is optional
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub token_fetch_timeout_secs: Option<u64>,
    pub share_token_fetch_errors: Option<bool>,
    /// Where keys, the token store, and preferences live
    pub data_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BreadError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| BreadError::Config(format!("Invalid configuration: {e}")))
    }

    /// Overlay the file's values on the defaults
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Some(scheme) = &self.scheme {
            config.scheme = scheme.clone();
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.token_fetch_timeout_secs {
            config.token_fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(share) = self.share_token_fetch_errors {
            config.share_token_fetch_errors = share;
        }
        config
    }

    /// Configured data directory, else `<platform data dir>/bread-api`
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("bread-api")
        })
    }
}
