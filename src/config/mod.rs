//! Configuration management
//!
//! Settings are loaded from `parley.toml` (current directory first, then
//! the user config directory) with environment variable overrides. The
//! engine never reads configuration ambiently; callers pass the relevant
//! values into constructors.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::llm::provider::Provider;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error occurred while reading/writing config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// TOML serialization error
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Root configuration structure
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Settings {
    /// LLM backend configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Tool calling limits
    #[serde(default)]
    pub tools: ToolCallingConfig,
}

/// LLM backend configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Default LLM provider
    #[serde(default)]
    pub provider: Provider,

    /// Model identifier to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the API endpoint (optional)
    ///
    /// If not specified, the backend driver uses the provider's default URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// API key for authentication (optional)
    ///
    /// For local models (Ollama), this can be omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: default_model(),
            base_url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Default model name
fn default_model() -> String {
    "default-model".to_string()
}

/// Default timeout in seconds
fn default_timeout_secs() -> u64 {
    30
}

/// Tool calling limits
///
/// Inputs to the caller's bounded-loop policy. The tool executor tracks
/// the iteration and elapsed-time counters but does not enforce limits.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ToolCallingConfig {
    /// Maximum number of tool call iterations per user turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Maximum time in seconds for a tool calling sequence
    #[serde(default = "default_max_working_time")]
    pub max_working_time_secs: f64,
}

impl Default for ToolCallingConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_working_time_secs: default_max_working_time(),
        }
    }
}

/// Default maximum tool call iterations
fn default_max_iterations() -> usize {
    5
}

/// Default maximum tool sequence wall-clock time
fn default_max_working_time() -> f64 {
    30.0
}

impl Settings {
    /// Load configuration from file
    ///
    /// Searches for `parley.toml` in the following order:
    /// 1. Current directory (`./parley.toml`)
    /// 2. User config directory (`~/.config/parley/parley.toml`)
    ///
    /// If neither file exists, returns `Settings::default()`.
    pub fn load() -> Result<Self, ConfigError> {
        let current_dir_path = Path::new("parley.toml");
        if current_dir_path.exists() {
            let content = fs::read_to_string(current_dir_path)?;
            let settings: Settings = toml::from_str(&content)?;
            return Ok(settings);
        }

        let user_config_path = Self::user_config_path()?;
        if user_config_path.exists() {
            let content = fs::read_to_string(&user_config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            return Ok(settings);
        }

        Ok(Settings::default())
    }

    /// Save configuration to file
    ///
    /// If no path is provided, uses the default user config location.
    /// Parent directories are created automatically if they don't exist.
    pub fn save(&self, path: Option<&Path>) -> Result<(), ConfigError> {
        let target_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::user_config_path()?,
        };

        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        fs::write(&target_path, toml_string)?;

        Ok(())
    }

    /// Get the default user config path
    fn user_config_path() -> Result<PathBuf, ConfigError> {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine home directory",
            ))
        })?;
        Ok(home_dir.join(".config").join("parley").join("parley.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// - `PARLEY_PROVIDER` → overrides `self.llm.provider`
    /// - `PARLEY_MODEL` → overrides `self.llm.model`
    /// - `PARLEY_API_KEY` → overrides `self.llm.api_key`
    /// - `PARLEY_BASE_URL` → overrides `self.llm.base_url`
    /// - `PARLEY_MAX_TOOL_ITERATIONS` → overrides `self.tools.max_iterations`
    ///
    /// Invalid values are logged as warnings but don't cause errors.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(provider_str) = env::var("PARLEY_PROVIDER") {
            match provider_str.parse::<Provider>() {
                Ok(provider) => self.llm.provider = provider,
                Err(_) => {
                    tracing::warn!("Invalid PARLEY_PROVIDER value: {}", provider_str);
                }
            }
        }

        if let Ok(model) = env::var("PARLEY_MODEL") {
            if !model.is_empty() {
                self.llm.model = model;
            }
        }

        if let Ok(api_key) = env::var("PARLEY_API_KEY") {
            if !api_key.is_empty() {
                self.llm.api_key = Some(api_key);
            }
        }

        if let Ok(base_url) = env::var("PARLEY_BASE_URL") {
            if !base_url.is_empty() {
                self.llm.base_url = Some(base_url);
            }
        }

        if let Ok(max_iter_str) = env::var("PARLEY_MAX_TOOL_ITERATIONS") {
            match max_iter_str.parse::<usize>() {
                Ok(max_iterations) => self.tools.max_iterations = max_iterations,
                Err(_) => {
                    tracing::warn!("Invalid PARLEY_MAX_TOOL_ITERATIONS value: {}", max_iter_str);
                }
            }
        }
    }
}
