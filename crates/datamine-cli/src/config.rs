//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global configuration for datamine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dataset registry file (TOML or legacy JSON)
    pub registry: PathBuf,
    pub cache: CacheConfig,
    pub http: HttpSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry: PathBuf::from("datasets.toml"),
            cache: CacheConfig::default(),
            http: HttpSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root used when `DATAMINE_CACHE_DIR` is unset
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Seconds
    pub connect_timeout: u64,
    /// Seconds without data before a download is abandoned
    pub read_timeout: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let defaults = datamine_core::HttpConfig::default();
        Self {
            connect_timeout: defaults.connect_timeout.as_secs(),
            read_timeout: defaults.read_timeout.as_secs(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./datamine.toml (current directory)
    /// 2. ~/.config/datamine/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("datamine.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "datamine") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    ///
    /// A relative `registry` path is taken relative to the config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        // Covers the default `datasets.toml` too
        if config.registry.is_relative() {
            if let Some(parent) = path.parent() {
                config.registry = parent.join(&config.registry);
            }
        }
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject settings no download could work with.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.http.connect_timeout > 0, "http.connect_timeout must be at least 1 second");
        anyhow::ensure!(self.http.read_timeout > 0, "http.read_timeout must be at least 1 second");
        Ok(())
    }
}
