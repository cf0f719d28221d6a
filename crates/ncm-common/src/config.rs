//! ---
//! ncm_section: "01-core-functionality"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Shared primitives and utilities for the NCM runtime."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("target/baselines")
}

fn default_poll_fallback_secs() -> u64 {
    1
}

/// Primary configuration object for the NCM runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Logging sink configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Baseline artifact storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Service-platform client configuration.
    #[serde(default)]
    pub platform: PlatformConfig,
    /// Job engine tunables.
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Logging sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory receiving the rolling daily log file.
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    /// Optional file prefix overriding the service name.
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Stdout log format.
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            file_prefix: None,
            format: default_log_format(),
        }
    }
}

/// Where persisted baseline artifacts live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory; `design/` and `operation/` subdirectories are created below it.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

/// Service-platform (licensing/pricing) endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlatformConfig {
    /// Base URL of the service platform; `None` disables registration.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Optional HTTP proxy endpoint.
    #[serde(default)]
    pub http_proxy: Option<String>,
}

/// Job orchestration tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Fallback tick (seconds) bounding worst-case completion latency when a
    /// backend forgets to signal its completion channel.
    #[serde(default = "default_poll_fallback_secs")]
    pub poll_fallback_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            poll_fallback_secs: default_poll_fallback_secs(),
        }
    }
}

/// Configuration plus the path it was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Deserialized configuration.
    pub config: AppConfig,
    /// Source file the configuration came from.
    pub source: PathBuf,
}

impl AppConfig {
    /// Parse a configuration file from disk.
    pub fn load(path: &Path) -> Result<AppConfig> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("unable to parse config file {}", path.display()))?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Load the first existing candidate path; error when none exists.
    pub fn load_with_source(candidates: &[PathBuf]) -> Result<LoadedConfig> {
        for candidate in candidates {
            if candidate.exists() {
                let config = AppConfig::load(candidate)?;
                return Ok(LoadedConfig {
                    config,
                    source: candidate.clone(),
                });
            }
        }
        Err(anyhow!(
            "no configuration file found (tried {} candidates)",
            candidates.len()
        ))
    }
}
