//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use scifetch_ledger::{EngineConfig, FetchSettings};

/// Global configuration for scifetch
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub fetch: FetchConfig,
    pub verify: VerifyConfig,
    /// File this config was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub default_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_dir: PathBuf::from("./papers"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    #[serde(deserialize_with = "deserialize_env_string")]
    pub command: String,
    #[serde(deserialize_with = "deserialize_env_strings")]
    pub args: Vec<String>,
    pub timeout_secs: u64,
    pub success_markers: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let settings = FetchSettings::default();
        Self {
            command: settings.command,
            args: settings.args,
            timeout_secs: settings.timeout.as_secs(),
            success_markers: settings.success_markers,
        }
    }
}

impl FetchConfig {
    pub fn to_settings(&self) -> FetchSettings {
        FetchSettings {
            command: self.command.clone(),
            args: self.args.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            success_markers: self.success_markers.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub enabled: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Deserialize a string that may be an environment variable reference like ${VAR}
fn deserialize_env_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(expand_env_var(&s).unwrap_or(s))
}

fn deserialize_env_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let items: Vec<String> = Vec::deserialize(deserializer)?;
    Ok(items
        .into_iter()
        .map(|s| expand_env_var(&s).unwrap_or(s))
        .collect())
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./scifetch.toml (current directory)
    /// 2. ~/.config/scifetch/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("scifetch.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "scifetch") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Engine configuration rooted at `output_root`, before CLI overrides.
    pub fn engine(&self, output_root: PathBuf) -> EngineConfig {
        let mut engine = EngineConfig::new(output_root);
        engine.fetch = self.fetch.to_settings();
        engine.verify_pdf = self.verify.enabled;
        engine
    }
}
