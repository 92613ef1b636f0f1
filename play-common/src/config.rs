//! Configuration loading and setting resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (merged with the CLI layer by the binary's argument parser)
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Question types the allocator is applied to unless configured otherwise
pub const DEFAULT_ALLOWED_QUESTION_TYPES: [&str; 6] = ["K", "X", "F", "S", "M", "L"];

/// Contents of `config.toml`
///
/// Every field is optional; absent fields fall through to [`CompiledDefaults`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Absolute directory holding `<survey>/files` pools
    pub pool_root: Option<PathBuf>,
    /// Public URL prefix equivalent to `pool_root`
    pub public_url_prefix: Option<String>,
    /// SQLite database file
    pub database_path: Option<PathBuf>,
    /// HTTP listen address
    pub bind_addr: Option<String>,
    /// Host question types the allocator is applied to
    pub allowed_question_types: Option<Vec<String>>,
    /// Seconds without a request after which a session's state is dropped
    pub session_idle_secs: Option<u64>,
    /// Seconds a dropped session is still remembered as having taken its counter step
    pub session_retention_secs: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default tracing filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// OS-dependent fallback values
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub pool_root: PathBuf,
    pub public_url_prefix: String,
    pub database_path: PathBuf,
    pub bind_addr: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let data_dir = default_data_dir();
        Self {
            pool_root: data_dir.join("surveys"),
            public_url_prefix: "/upload/surveys".to_string(),
            database_path: data_dir.join("play.db"),
            bind_addr: "127.0.0.1:5730".to_string(),
        }
    }
}

/// Get OS-dependent default data folder path
fn default_data_dir() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/play (or /var/lib/play for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("play"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/play"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("play"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/play"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("play"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\play"))
    } else {
        PathBuf::from("./play_data")
    }
}

/// Get default configuration file path for the platform
///
/// On Linux, `~/.config/play/config.toml` is preferred when it exists, then
/// `/etc/play/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("play").join("config.toml"));

    if cfg!(target_os = "linux") {
        if let Some(path) = &user_config {
            if path.exists() {
                return user_config;
            }
        }
        let system_config = PathBuf::from("/etc/play/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    user_config
}

/// Load `config.toml`
///
/// A missing file is not an error: defaults apply and a warning is logged.
/// A file that exists but does not parse is a [`Error::Config`].
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(TomlConfig::default());
        }
        Err(e) => {
            warn!("Config file {} unreadable ({}), using defaults", path.display(), e);
            return Ok(TomlConfig::default());
        }
    };

    let config = toml::from_str::<TomlConfig>(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config file {}", path.display());
    Ok(config)
}

/// Pick the highest-priority value for one setting
///
/// `cli` carries both the command-line argument and its environment variable.
pub fn resolve_setting<T: std::fmt::Debug>(
    name: &str,
    cli: Option<T>,
    toml: Option<T>,
    default: T,
) -> T {
    if let Some(value) = cli {
        debug!("{} = {:?} (command line / environment)", name, value);
        return value;
    }
    if let Some(value) = toml {
        debug!("{} = {:?} (config file)", name, value);
        return value;
    }
    debug!("{} = {:?} (default)", name, default);
    default
}
