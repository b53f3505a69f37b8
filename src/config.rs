use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure for pacecast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Text-generation provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Point-predictor configuration
    #[serde(default)]
    pub predictor: PredictorConfig,

    /// Terminal output configuration
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider kind ("openai" or "local")
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature setting
    pub temperature: Option<f32>,

    /// Hard timeout for one generation request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Path to the JSON coefficients file. Compiled-in defaults are used
    /// when unset.
    pub coefficients: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Enable colorful output
    #[serde(default = "default_colorful")]
    pub colorful: bool,
}

// Default value functions
fn default_provider_kind() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_colorful() -> bool {
    true
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            model: default_model(),
            temperature: Some(0.2),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            colorful: default_colorful(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: ProviderConfig::default(),
            predictor: PredictorConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))
    }

    /// Load configuration from command line argument or default locations
    pub fn load(config_path: &Option<String>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::from_file(path);
        }

        // Try loading from default locations
        let default_paths = vec![
            "pacecast.toml",
            ".pacecast.toml",
            "~/.config/pacecast/config.toml",
        ];

        for path in default_paths {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                match Self::from_file(expanded_path.as_ref()) {
                    Ok(config) => return Ok(config),
                    Err(e) => eprintln!("Warning: Failed to load config from {}: {}", path, e),
                }
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }
}
