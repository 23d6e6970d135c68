use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::{provider::ProviderId, weather::openmeteo};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for a single LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Overrides the provider's default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Overrides the provider's API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default provider id, e.g. "mistral" or "groq".
    pub default_provider: Option<String>,

    /// Open-Meteo forecast endpoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_base_url: Option<String>,

    /// Applied to every HTTP request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Example TOML:
    /// [providers.mistral]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    ///
    /// Without an explicit default, the first provider with an API key in the
    /// environment is used.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        self.default_provider_id_with(&process_env)
    }

    fn default_provider_id_with(
        &self,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<ProviderId> {
        if let Some(s) = &self.default_provider {
            return ProviderId::try_from(s.as_str());
        }

        ProviderId::all()
            .iter()
            .copied()
            .find(|id| env(id.env_var()).is_some())
            .ok_or_else(|| {
                anyhow!(
                    "No default provider configured.\n\
                     Hint: run `assistant configure <provider>` \
                     (e.g. `assistant configure mistral`) or set MISTRAL_API_KEY."
                )
            })
    }

    pub fn has_provider(&self, id: ProviderId) -> bool {
        self.providers.contains_key(id.as_str())
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "llm-playground", "assistant")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set/replace a provider API key, keeping any model or URL override.
    /// The first configured provider becomes the default.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .entry(provider_id.as_str().to_string())
            .and_modify(|cfg| cfg.api_key = api_key.clone())
            .or_insert_with(|| ProviderConfig {
                api_key,
                model: None,
                base_url: None,
            });

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// Returns the API key for a provider: config file first, then environment.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<String> {
        self.provider_api_key_with(provider_id, &process_env)
    }

    fn provider_api_key_with(
        &self,
        provider_id: ProviderId,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Option<String> {
        self.provider_config(provider_id)
            .map(|cfg| cfg.api_key.clone())
            .filter(|key| !key.trim().is_empty())
            .or_else(|| env(provider_id.env_var()))
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn weather_base_url(&self) -> &str {
        self.weather_base_url
            .as_deref()
            .unwrap_or(openmeteo::DEFAULT_BASE_URL)
    }
}
