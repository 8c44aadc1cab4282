//! Daemon configuration management.
//!
//! Handles config directory resolution (CLI flag > `VEILD_CONFIG_DIR`
//! > `/etc/veild`) and loading of `config.toml`. The resolved config
//! directory is stored in a process-wide global via [`set_config_dir`]
//! at startup so all path helpers agree on it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::vpn::TunnelPaths;

/// Process-wide resolved config directory, set once at startup.
static CONFIG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Stores the resolved config directory for the lifetime of the process.
///
/// Must be called exactly once from `main()` after resolving the
/// directory. Subsequent calls are ignored (first write wins).
pub fn set_config_dir(dir: PathBuf) {
    let _ = CONFIG_DIR.set(dir);
}

/// Returns the config directory set at startup, or falls back to
/// default resolution.
#[must_use]
pub fn get_config_dir() -> PathBuf {
    CONFIG_DIR
        .get()
        .cloned()
        .unwrap_or_else(|| resolve_config_dir(None))
}

/// Resolve the config directory: CLI flag > environment > default.
#[must_use]
pub fn resolve_config_dir(cli_override: Option<&PathBuf>) -> PathBuf {
    if let Some(dir) = cli_override {
        return dir.clone();
    }
    if let Ok(env_dir) = std::env::var(constants::CONFIG_DIR_ENV) {
        if !env_dir.is_empty() {
            return PathBuf::from(env_dir);
        }
    }
    PathBuf::from(constants::DEFAULT_CONFIG_DIR)
}

/// Daemon settings.
///
/// All fields have compiled-in defaults (sourced from `constants` so
/// there is exactly one source of truth); users can override any
/// subset via `config.toml` in the config directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Path of the userspace tunnel binary.
    pub wireguard_binary: String,
    /// Path of the tunnel configuration tool.
    pub wg_tool: String,
    /// Path of the platform DNS configuration script.
    pub dns_script: String,
    /// Remote tunnel port.
    pub tunnel_port: u16,
    /// Latency probe timeout in seconds.
    pub ping_timeout: u64,
    /// Program IPv6 tunnel addressing and routes.
    pub enable_ipv6: bool,
    /// Minimum log level (`"debug"`, `"info"`, `"warning"`, `"error"`).
    pub log_level: String,
    /// Maximum number of log entries kept in memory.
    pub max_log_entries: usize,
    /// Session-assigned client tunnel address (from the account
    /// session collaborator).
    pub wg_client_ip: Option<String>,
    /// Session-assigned client private key.
    pub wg_private_key: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            wireguard_binary: constants::DEFAULT_WIREGUARD_BINARY.to_string(),
            wg_tool: constants::DEFAULT_WG_TOOL.to_string(),
            dns_script: constants::DEFAULT_DNS_SCRIPT.to_string(),
            tunnel_port: constants::DEFAULT_TUNNEL_PORT,
            ping_timeout: constants::DEFAULT_PING_TIMEOUT,
            enable_ipv6: false,
            log_level: "info".to_string(),
            max_log_entries: constants::DEFAULT_MAX_LOG_ENTRIES,
            wg_client_ip: None,
            wg_private_key: None,
        }
    }
}

impl DaemonConfig {
    /// External binary paths for the tunnel lifecycle.
    #[must_use]
    pub fn tunnel_paths(&self, config_dir: &Path) -> TunnelPaths {
        TunnelPaths {
            wireguard_binary: PathBuf::from(&self.wireguard_binary),
            wg_tool: PathBuf::from(&self.wg_tool),
            dns_script: PathBuf::from(&self.dns_script),
            config_dir: config_dir.to_path_buf(),
        }
    }

    /// Location of the server catalog snapshot.
    #[must_use]
    pub fn servers_path(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(constants::SERVERS_FILE_NAME)
    }
}

/// Errors loading the daemon configuration
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: String,
        source: std::io::Error,
    },
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to read '{path}': {source}"),
            Self::Parse { path, source } => write!(f, "invalid config '{path}': {source}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

/// Load `config.toml` from the config directory, falling back to
/// defaults when the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file exists but cannot be read or
/// parsed. A malformed file is an error, not a silent fallback, so a
/// typo cannot quietly change daemon behavior.
pub fn load_config(config_dir: &Path) -> Result<DaemonConfig, ConfigError> {
    let path = config_dir.join(constants::CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(DaemonConfig::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        source: e,
    })
}
