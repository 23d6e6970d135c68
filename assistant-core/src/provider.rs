use crate::{Config, llm::LlmClient};
use std::{convert::TryFrom, fmt};

/// Hosted LLM providers speaking the OpenAI-compatible chat protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Mistral,
    Groq,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Mistral => "mistral",
            ProviderId::Groq => "groq",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Mistral, ProviderId::Groq]
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderId::Mistral => "https://api.mistral.ai/v1",
            ProviderId::Groq => "https://api.groq.com/openai/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderId::Mistral => "open-mistral-7b",
            ProviderId::Groq => "llama-3.3-70b-versatile",
        }
    }

    /// Environment variable consulted when the config file has no key.
    pub fn env_var(&self) -> &'static str {
        match self {
            ProviderId::Mistral => "MISTRAL_API_KEY",
            ProviderId::Groq => "GROQ_API_KEY",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "mistral" => Ok(ProviderId::Mistral),
            "groq" => Ok(ProviderId::Groq),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: mistral, groq."
            )),
        }
    }
}

/// Construct a chat client from config and explicit ProviderId.
pub fn provider_from_config(id: ProviderId, config: &Config) -> anyhow::Result<LlmClient> {
    client_for(id, config, config.provider_api_key(id))
}

/// Construct the default provider's client, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<LlmClient> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}

fn client_for(
    id: ProviderId,
    config: &Config,
    api_key: Option<String>,
) -> anyhow::Result<LlmClient> {
    let api_key = api_key.ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `assistant configure {id}` or set {}.",
            id.env_var()
        )
    })?;

    let overrides = config.provider_config(id);
    let base_url = overrides
        .and_then(|p| p.base_url.as_deref())
        .unwrap_or(id.default_base_url());
    let model = overrides
        .and_then(|p| p.model.as_deref())
        .unwrap_or(id.default_model());

    Ok(LlmClient::new(base_url, api_key, model, config.request_timeout())?)
}
