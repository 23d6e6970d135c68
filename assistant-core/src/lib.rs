//! Core library for the `assistant` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - LLM provider selection and an OpenAI-compatible chat client
//! - Bounded tool calling over streamed answers
//! - The weather assistant and its fallback cascade
//!
//! It is used by `assistant-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod demos;
pub mod llm;
pub mod provider;
pub mod weather;

#[cfg(test)]
mod testing;

pub use config::{Config, ProviderConfig};
pub use llm::{ChatModel, LlmClient, LlmError, Message};
pub use provider::{ProviderId, default_provider_from_config, provider_from_config};
pub use weather::{OpenMeteoClient, WeatherAssistant};

/// Caps upstream error bodies at 200 characters for error messages.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::truncate_body;

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let out = truncate_body(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
