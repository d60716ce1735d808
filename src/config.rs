//! Production configuration system
//!
//! Provides centralized configuration management with:
//! - Environment variable support
//! - Config file loading (optional)
//! - Runtime defaults
//! - Validation and type safety

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Fetch/backoff configuration
    pub fetch: FetchConfig,

    /// Search query configuration
    pub query: QueryConfig,

    /// Display configuration
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// First backoff delay after a rate-limit response, in ms; doubles
    /// on every further 429.
    pub initial_delay_ms: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub endpoint: String,
    pub days_back: u32,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub links_per_day: usize,
    pub report_base_url: String,
    /// Quiet time after a filter flip before the index rebuilds, in ms.
    pub debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "ERROR".to_string(),
                format: "pretty".to_string(),
                output: "console".to_string(),
                directory: PathBuf::from("logs"),
            },
            fetch: FetchConfig {
                initial_delay_ms: 1000,
                max_attempts: 5,
            },
            query: QueryConfig {
                endpoint: "https://crash-stats.allizom.org/api/SuperSearch/".to_string(),
                days_back: 7,
                sample_size: 200,
            },
            display: DisplayConfig {
                links_per_day: 20,
                report_base_url: "https://crash-stats.mozilla.com/report/index/".to_string(),
                debounce_ms: 500,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment, file, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        // Try to load from config file if it exists
        let config_paths = [
            PathBuf::from("crash-triage.toml"),
            PathBuf::from(".crash-triage.toml"),
            dirs::config_dir()
                .map(|d| d.join("crash-triage").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.exists() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(path)?;
                break;
            }
        }

        // Override with environment variables
        config.apply_env_overrides()?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Logging overrides
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        // Fetch overrides
        if let Ok(val) = env::var("CRASH_TRIAGE_INITIAL_DELAY_MS") {
            self.fetch.initial_delay_ms = val
                .parse()
                .context("Invalid CRASH_TRIAGE_INITIAL_DELAY_MS")?;
        }
        if let Ok(val) = env::var("CRASH_TRIAGE_MAX_ATTEMPTS") {
            self.fetch.max_attempts = val.parse().context("Invalid CRASH_TRIAGE_MAX_ATTEMPTS")?;
        }

        // Query overrides
        if let Ok(val) = env::var("CRASH_TRIAGE_ENDPOINT") {
            self.query.endpoint = val;
        }
        if let Ok(val) = env::var("CRASH_TRIAGE_DAYS_BACK") {
            self.query.days_back = val.parse().context("Invalid CRASH_TRIAGE_DAYS_BACK")?;
        }
        if let Ok(val) = env::var("CRASH_TRIAGE_SAMPLE_SIZE") {
            self.query.sample_size = val.parse().context("Invalid CRASH_TRIAGE_SAMPLE_SIZE")?;
        }

        // Display overrides
        if let Ok(val) = env::var("CRASH_TRIAGE_LINKS_PER_DAY") {
            self.display.links_per_day =
                val.parse().context("Invalid CRASH_TRIAGE_LINKS_PER_DAY")?;
        }
        if let Ok(val) = env::var("CRASH_TRIAGE_DEBOUNCE_MS") {
            self.display.debounce_ms = val.parse().context("Invalid CRASH_TRIAGE_DEBOUNCE_MS")?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_attempts == 0 {
            return Err(anyhow::anyhow!("Max attempts must be greater than 0"));
        }

        if self.query.days_back == 0 {
            return Err(anyhow::anyhow!("Days back must be greater than 0"));
        }

        if self.query.sample_size == 0 {
            return Err(anyhow::anyhow!("Sample size must be greater than 0"));
        }

        reqwest::Url::parse(&self.query.endpoint)
            .with_context(|| format!("Invalid search endpoint: {}", self.query.endpoint))?;

        if self.display.debounce_ms > 10_000 {
            warn!(
                debounce_ms = self.display.debounce_ms,
                "Debounce is very long, filter changes will feel unresponsive"
            );
        }

        Ok(())
    }

    /// Save current configuration to file
    #[allow(dead_code)]
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration instance
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(|| Config::load().unwrap_or_default())
}
