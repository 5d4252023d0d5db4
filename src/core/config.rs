use crate::core::assistant::GenerationConfig;
use crate::core::history::{PRICE_HISTORY_CAPACITY, RATE_HISTORY_CAPACITY};
use crate::refresh::RefreshPolicy;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExchangeRateProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GeminiProviderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProvidersConfig {
    pub exchange_rate: ExchangeRateProviderConfig,
    pub yahoo: YahooProviderConfig,
    pub gemini: GeminiProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            exchange_rate: ExchangeRateProviderConfig {
                base_url: "https://api.exchangerate-api.com/v4".to_string(),
            },
            yahoo: YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            },
            gemini: GeminiProviderConfig {
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                model: "gemini-1.5-flash".to_string(),
                api_key: None,
            },
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Upper bound for every single network call
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            timeout_secs: 10,
            user_agent: "fxtrack/1.0".to_string(),
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Timing and retention for one logical stream.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StreamSettings {
    #[serde(default)]
    pub debounce_ms: u64,
    /// `None` disables auto-refresh for the stream
    #[serde(default)]
    pub interval_secs: Option<u64>,
    #[serde(default)]
    pub history: usize,
    #[serde(default)]
    pub stagger_ms: u64,
}

impl StreamSettings {
    pub fn policy(&self) -> RefreshPolicy {
        RefreshPolicy {
            debounce: Duration::from_millis(self.debounce_ms),
            auto_refresh: self.interval_secs.map(Duration::from_secs),
        }
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RefreshConfig {
    pub conversion: StreamSettings,
    pub stocks: StreamSettings,
    pub forex: StreamSettings,
    pub search: StreamSettings,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            conversion: StreamSettings {
                debounce_ms: 300,
                interval_secs: Some(3),
                history: RATE_HISTORY_CAPACITY,
                stagger_ms: 0,
            },
            stocks: StreamSettings {
                debounce_ms: 0,
                interval_secs: Some(60),
                history: PRICE_HISTORY_CAPACITY,
                stagger_ms: 300,
            },
            forex: StreamSettings {
                debounce_ms: 0,
                interval_secs: Some(3),
                history: RATE_HISTORY_CAPACITY,
                stagger_ms: 300,
            },
            search: StreamSettings {
                debounce_ms: 500,
                interval_secs: None,
                history: 0,
                stagger_ms: 0,
            },
        }
    }
}

pub fn default_forex_pairs() -> Vec<String> {
    [
        "USD/EUR", "USD/GBP", "USD/JPY", "USD/CHF", "EUR/GBP", "EUR/JPY", "GBP/USD", "AUD/USD",
        "USD/CAD", "NZD/USD",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub providers: ProvidersConfig,
    pub network: NetworkConfig,
    pub refresh: RefreshConfig,
    pub forex_pairs: Vec<String>,
    pub generation: GenerationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            network: NetworkConfig::default(),
            refresh: RefreshConfig::default(),
            forex_pairs: default_forex_pairs(),
            generation: GenerationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, or defaults when no file
    /// has been created yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "fxtrack", "fxtrack")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// API key from the config file, falling back to the environment.
    pub fn gemini_api_key(&self) -> Option<String> {
        self.providers
            .gemini
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(GEMINI_API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}
