use std::{io::Write, sync::Arc};

use anyhow::Context;
use assistant_core::{
    ChatModel, Config, OpenMeteoClient, ProviderId, WeatherAssistant, demos, provider_from_config,
};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use inquire::{Confirm, Password, Text};
use tracing::debug;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "assistant", version, about = "LLM playground and weather assistant")]
pub struct Cli {
    /// Provider to use instead of the configured default, e.g. "mistral" or "groq".
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "mistral" or "groq".
        provider: String,
    },

    /// Ask about the weather; falls back to a direct API call when the model is silent.
    Weather {
        #[arg(default_value = "Quel temps fait-il à Londres ?")]
        prompt: String,
    },

    /// Generate a complete answer to a prompt.
    Generate { prompt: String },

    /// Print an answer as it streams in.
    Stream { prompt: String },

    /// Summarize text in two sentences.
    Summarize { text: String },

    /// Continue the built-in greeting conversation, optionally with a new message.
    Chat { message: Option<String> },

    /// Generate a structured recipe.
    Recipe {
        #[arg(default_value = "Comment faire du baba ganoush ?")]
        prompt: String,
    },

    /// Let the model log a message through its only tool.
    Log {
        #[arg(default_value = "Hello, world!")]
        prompt: String,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let Cli {
            provider,
            command,
            ..
        } = self;
        let config = Config::load()?;
        let model = || chat_model(provider.as_deref(), &config);

        match command {
            Command::Configure { provider } => configure(config.clone(), &provider)?,
            Command::Weather { prompt } => {
                let source =
                    OpenMeteoClient::new(config.weather_base_url(), config.request_timeout())
                        .context("Failed to build weather client")?;
                let assistant = WeatherAssistant::new(model()?, Arc::new(source));

                let mut stdout = std::io::stdout();
                let mut streamed = false;
                let answer = assistant
                    .resolve_weather_query_with(&prompt, |chunk| {
                        streamed = true;
                        let _ = write!(stdout, "{chunk}");
                        let _ = stdout.flush();
                    })
                    .await;

                // Fallback answers never stream, so they are printed whole.
                if streamed {
                    writeln!(stdout)?;
                } else {
                    writeln!(stdout, "{answer}")?;
                }
            }
            Command::Generate { prompt } => {
                println!("{}", demos::generate_text(model()?.as_ref(), &prompt).await?);
            }
            Command::Stream { prompt } => {
                let model = model()?;
                let mut stream = demos::stream_text(model.as_ref(), &prompt).await?;
                let mut stdout = std::io::stdout();
                while let Some(chunk) = stream.next().await {
                    write!(stdout, "{}", chunk?)?;
                    stdout.flush()?;
                }
                writeln!(stdout)?;
            }
            Command::Summarize { text } => {
                println!("{}", demos::summarize(model()?.as_ref(), &text).await?);
            }
            Command::Chat { message } => {
                let mut history = demos::greeting_history();
                if let Some(message) = message {
                    history.push(assistant_core::Message::user(message));
                }
                let history = demos::continue_conversation(model()?.as_ref(), history).await?;
                let rendered = serde_json::to_string_pretty(&history)
                    .context("Failed to render conversation")?;
                println!("{rendered}");
            }
            Command::Recipe { prompt } => {
                let recipe = demos::create_recipe(model()?.as_ref(), &prompt).await?;
                println!("{}", recipe.name);
                for ingredient in &recipe.ingredients {
                    println!("  - {} ({})", ingredient.name, ingredient.amount);
                }
                for (i, step) in recipe.steps.iter().enumerate() {
                    println!("{}. {step}", i + 1);
                }
            }
            Command::Log { prompt } => {
                for message in demos::log_to_console(model()?, &prompt).await? {
                    println!("{message}");
                }
            }
        }

        Ok(())
    }
}

fn chat_model(provider: Option<&str>, config: &Config) -> anyhow::Result<Arc<dyn ChatModel>> {
    let id = match provider {
        Some(name) => ProviderId::try_from(name)?,
        None => config.default_provider_id()?,
    };
    let client = provider_from_config(id, config)?;
    debug!(provider = %id, model = client.model(), "using chat model");
    Ok(Arc::new(client))
}

fn configure(mut config: Config, provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("No API key entered")?;

    let current_model = config
        .provider_config(id)
        .and_then(|p| p.model.clone())
        .unwrap_or_else(|| id.default_model().to_string());
    let model = Text::new("Model:").with_default(&current_model).prompt()?;

    config.upsert_provider_api_key(id, api_key);
    if let Some(p) = config.providers.get_mut(id.as_str()) {
        p.model = (model != id.default_model()).then_some(model);
    }

    if config.default_provider.as_deref() != Some(id.as_str())
        && Confirm::new(&format!("Make {id} the default provider?"))
            .with_default(true)
            .prompt()?
    {
        config.set_default_provider(id);
    }

    config.save()?;
    println!(
        "Saved configuration to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}
