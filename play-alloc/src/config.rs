//! Configuration resolution for play-alloc
//!
//! Provides multi-tier configuration resolution with CLI/ENV → TOML → default priority.

use std::path::PathBuf;
use std::time::Duration;

use crate::session::{DEFAULT_IDLE_TIMEOUT, DEFAULT_RETENTION};
use play_common::config::{
    resolve_setting, CompiledDefaults, TomlConfig, DEFAULT_ALLOWED_QUESTION_TYPES,
};

/// Values supplied on the command line or through `PLAY_*` environment variables
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub pool_root: Option<PathBuf>,
    pub public_url_prefix: Option<String>,
    pub database_path: Option<PathBuf>,
    pub bind_addr: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub pool_root: PathBuf,
    pub public_url_prefix: String,
    pub database_path: PathBuf,
    pub bind_addr: String,
    pub allowed_question_types: Vec<String>,
    /// Session contexts without a request for this long are dropped
    pub session_idle_timeout: Duration,
    /// How long a dropped session is remembered as having advanced the counter
    pub session_retention: Duration,
}

impl Config {
    pub fn resolve(cli: CliOverrides, toml: TomlConfig) -> Self {
        Self::resolve_with_defaults(cli, toml, CompiledDefaults::for_current_platform())
    }

    pub fn resolve_with_defaults(
        cli: CliOverrides,
        toml: TomlConfig,
        defaults: CompiledDefaults,
    ) -> Self {
        let allowed_question_types = toml.allowed_question_types.unwrap_or_else(|| {
            DEFAULT_ALLOWED_QUESTION_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect()
        });

        Self {
            pool_root: resolve_setting("pool_root", cli.pool_root, toml.pool_root, defaults.pool_root),
            public_url_prefix: resolve_setting(
                "public_url_prefix",
                cli.public_url_prefix,
                toml.public_url_prefix,
                defaults.public_url_prefix,
            ),
            database_path: resolve_setting(
                "database_path",
                cli.database_path,
                toml.database_path,
                defaults.database_path,
            ),
            bind_addr: resolve_setting("bind_addr", cli.bind_addr, toml.bind_addr, defaults.bind_addr),
            allowed_question_types,
            session_idle_timeout: toml
                .session_idle_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_IDLE_TIMEOUT),
            session_retention: toml
                .session_retention_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETENTION),
        }
    }
}
