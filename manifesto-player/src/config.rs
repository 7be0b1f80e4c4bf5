//! Configuration management for manifesto-player
//!
//! Bootstrap configuration from a TOML file, read once at startup.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--endpoint, --low-watermark, --config)
//! 2. Environment variables (MANIFESTO_ENDPOINT, MANIFESTO_CONFIG)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! Every section and key is optional; an empty file is a valid config.

use crate::controller::ControllerConfig;
use crate::error::{Error, Result};
use crate::generation::ProducerConfig;
use crate::playback::DEFAULT_LOW_WATERMARK;
use crate::sink::timed::DEFAULT_WORDS_PER_MINUTE;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "MANIFESTO_CONFIG";

/// Environment variable overriding `generation.endpoint`
pub const ENDPOINT_ENV_VAR: &str = "MANIFESTO_ENDPOINT";

/// Tracing directives applying `level` to the manifesto crates
pub fn log_directives(level: &str) -> String {
    format!(
        "manifesto_player={level},manifesto_common={level}",
        level = level
    )
}

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Generation service settings
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// URL of the generation endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Upper bound for one generation call
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Retries after a retryable failure (0 = surface immediately)
    #[serde(default)]
    pub max_retries: u32,

    /// Backoff unit between retries
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Scheduler settings
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Queue depth at or below which the next segment is requested
    #[serde(default = "default_low_watermark")]
    pub low_watermark: usize,

    /// Events buffered per subscriber before the oldest are dropped
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Simulated playback settings
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// Speaking rate used when a payload's duration cannot be read
    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_endpoint() -> String {
    "http://localhost:3000/api/generate".to_string()
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_retry_backoff_ms() -> u64 {
    1_000
}

fn default_low_watermark() -> usize {
    DEFAULT_LOW_WATERMARK
}

fn default_event_capacity() -> usize {
    256
}

fn default_words_per_minute() -> u32 {
    DEFAULT_WORDS_PER_MINUTE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            low_watermark: default_low_watermark(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            words_per_minute: default_words_per_minute(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub low_watermark: Option<usize>,
}

/// Effective configuration after applying every source
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub low_watermark: usize,
    pub event_capacity: usize,
    pub words_per_minute: u32,
    pub log_level: String,
}

impl Config {
    /// Load configuration
    ///
    /// `config_path` is the `--config` argument; without it the file is
    /// located through `MANIFESTO_CONFIG` or the platform config directory.
    /// A missing file means built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be parsed, or if the
    /// resulting values fail validation.
    pub fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let path = manifesto_common::config::resolve_config_file(config_path, CONFIG_ENV_VAR);
        let toml_config: TomlConfig =
            manifesto_common::config::load_toml_or_default(path.as_deref())?;
        if let Some(path) = &path {
            info!("Configuration file: {}", path.display());
        }

        let env_endpoint = std::env::var(ENDPOINT_ENV_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty());

        Self::from_sources(toml_config, env_endpoint, overrides)
    }

    /// Combine already-read sources (CLI > env > TOML) and validate
    pub fn from_sources(
        toml_config: TomlConfig,
        env_endpoint: Option<String>,
        overrides: ConfigOverrides,
    ) -> Result<Self> {
        let endpoint = overrides
            .endpoint
            .or(env_endpoint)
            .unwrap_or(toml_config.generation.endpoint);

        let config = Self {
            endpoint,
            request_timeout: Duration::from_millis(toml_config.generation.request_timeout_ms),
            max_retries: toml_config.generation.max_retries,
            retry_backoff: Duration::from_millis(toml_config.generation.retry_backoff_ms),
            low_watermark: overrides
                .low_watermark
                .unwrap_or(toml_config.scheduler.low_watermark),
            event_capacity: toml_config.scheduler.event_capacity,
            words_per_minute: toml_config.playback.words_per_minute,
            log_level: toml_config.logging.level,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::Config("generation.endpoint must not be empty".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "generation.request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.retry_backoff.is_zero() {
            // Also paces the re-check of a stream starved by a failure
            return Err(Error::Config(
                "generation.retry_backoff_ms must be greater than 0".to_string(),
            ));
        }
        if self.low_watermark == 0 {
            return Err(Error::Config(
                "scheduler.low_watermark must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config(
                "scheduler.event_capacity must be greater than 0".to_string(),
            ));
        }
        if self.words_per_minute == 0 {
            return Err(Error::Config(
                "playback.words_per_minute must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn producer_config(&self) -> ProducerConfig {
        ProducerConfig {
            request_timeout: self.request_timeout,
            max_retries: self.max_retries,
            retry_backoff: self.retry_backoff,
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            low_watermark: self.low_watermark,
            event_capacity: self.event_capacity,
            producer: self.producer_config(),
        }
    }
}
