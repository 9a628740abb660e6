//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux/macOS: `$XDG_CONFIG_HOME/filepush/config.toml`, falling back to
//!   `~/.config/filepush/config.toml`
//! - Windows: `%APPDATA%/filepush/config.toml`

use std::path::{Path, PathBuf};

use filepush_channel::DigestAlgorithm;
use filepush_protocol::{DEFAULT_CLIENT_TIMEOUT_MILLIS, DEFAULT_SERVER_TIMEOUT_MILLIS};
use serde::{Deserialize, Serialize};

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Accept timeout for `serve` in milliseconds (0 = wait forever).
    #[serde(default = "default_server_timeout")]
    pub server_timeout_ms: u64,

    /// Connect timeout for `send` in milliseconds (0 = wait forever).
    #[serde(default = "default_client_timeout")]
    pub client_timeout_ms: u64,

    /// Address `serve` and `listen` bind to (empty = all IPv4 interfaces).
    #[serde(default)]
    pub bind_host: String,

    #[serde(default)]
    pub digest_algorithm: DigestAlgorithm,

    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_server_timeout() -> u64 {
    DEFAULT_SERVER_TIMEOUT_MILLIS
}

fn default_client_timeout() -> u64 {
    DEFAULT_CLIENT_TIMEOUT_MILLIS
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_timeout_ms: default_server_timeout(),
            client_timeout_ms: default_client_timeout(),
            bind_host: String::new(),
            digest_algorithm: DigestAlgorithm::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Loads configuration from `path` (or the default location).
    ///
    /// A missing file yields the defaults; nothing is written.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = resolve(path)?;

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Saves the configuration, returning the path written.
    pub fn save(&self, path: Option<&Path>) -> anyhow::Result<PathBuf> {
        let path = resolve(path)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, self.to_toml()?)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(path)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Explicit path if given, otherwise the platform default.
pub fn resolve(path: Option<&Path>) -> anyhow::Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => config_path(),
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")
            .map_err(|_| anyhow::anyhow!("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("filepush").join("config.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let base = match std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = std::env::var_os("HOME")
                    .ok_or_else(|| anyhow::anyhow!("neither XDG_CONFIG_HOME nor HOME is set"))?;
                PathBuf::from(home).join(".config")
            }
        };
        Ok(base.join("filepush").join("config.toml"))
    }
}
