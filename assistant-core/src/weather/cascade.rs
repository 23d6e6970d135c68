//! Best-effort weather query resolution.
//!
//! Stages run in order until one produces a displayable answer:
//!
//! 1. assisted: the model answers, optionally through the weather tools
//! 2. direct: the extracted city is looked up and fetched without the model
//! 3. default: London is fetched, whatever the user asked for
//!
//! [`transition`] is the whole fallback policy; [`WeatherAssistant`] only
//! produces stage outcomes and feeds them through it.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, info, trace, warn};

use super::{
    cities::LONDON,
    extract::DEFAULT_CITY,
    openmeteo::WeatherSource,
    report::{Units, WeatherQuery, WeatherReport},
    tools::WeatherTools,
};
use crate::llm::{ChatModel, ToolAgent};

/// Prefix of the answer returned when every stage failed.
pub const ERROR_PREFIX: &str = "Error processing weather request:";

/// Rounds of model reasoning / tool invocation allowed in the assisted stage.
pub const DEFAULT_MAX_STEPS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Assisted,
    Direct,
    /// Carries the message of the failure that escalated here.
    DefaultCity { cause: String },
}

/// What one stage produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Answer(String),
    /// The city is not in the directory; carries the user-facing message.
    NotFound(String),
    /// The upstream response lacked its data block; carries the user-facing message.
    UpstreamError(String),
    /// Nothing usable was produced.
    Empty,
    /// An error escaped the stage.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Done(String),
    Try(Stage),
}

/// Decides what follows `outcome` at `stage`.
pub fn transition(stage: &Stage, outcome: StageOutcome) -> Next {
    match (stage, outcome) {
        (Stage::DefaultCity { .. }, StageOutcome::Answer(text)) => Next::Done(text),
        (Stage::DefaultCity { cause }, _) => Next::Done(format!("{ERROR_PREFIX} {cause}")),

        (_, StageOutcome::Answer(text))
        | (_, StageOutcome::NotFound(text))
        | (_, StageOutcome::UpstreamError(text)) => Next::Done(text),

        (Stage::Assisted, StageOutcome::Empty) => Next::Try(Stage::Direct),
        (Stage::Direct, StageOutcome::Empty) => Next::Try(Stage::DefaultCity {
            cause: "no weather data returned".to_string(),
        }),
        (_, StageOutcome::Failed(cause)) => Next::Try(Stage::DefaultCity { cause }),
    }
}

/// Resolves free-form weather questions, degrading to plain strings on failure.
#[derive(Clone)]
pub struct WeatherAssistant {
    model: Arc<dyn ChatModel>,
    tools: Arc<WeatherTools>,
    max_steps: usize,
}

impl WeatherAssistant {
    pub fn new(model: Arc<dyn ChatModel>, source: Arc<dyn WeatherSource>) -> Self {
        Self::with_tools(model, WeatherTools::new(source))
    }

    pub fn with_tools(model: Arc<dyn ChatModel>, tools: WeatherTools) -> Self {
        Self {
            model,
            tools: Arc::new(tools),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Never fails: every path ends in a displayable sentence.
    pub async fn resolve_weather_query(&self, prompt: &str) -> String {
        self.resolve_weather_query_with(prompt, |_| {}).await
    }

    /// Like [`resolve_weather_query`](Self::resolve_weather_query), handing
    /// each assisted-stage chunk to `on_chunk` as it arrives.
    pub async fn resolve_weather_query_with<F>(&self, prompt: &str, mut on_chunk: F) -> String
    where
        F: FnMut(&str) + Send,
    {
        info!(%prompt, "resolving weather query");
        let query = WeatherQuery::new(prompt);
        info!(city = %query.extracted_city, "detected city");

        let mut stage = Stage::Assisted;
        loop {
            let outcome = match &stage {
                Stage::Assisted => self.assisted(&query, &mut on_chunk).await,
                Stage::Direct => self.direct(&query.extracted_city).await,
                Stage::DefaultCity { .. } => self.default_city().await,
            };
            debug!(?stage, ?outcome, "stage finished");

            match transition(&stage, outcome) {
                Next::Done(answer) => return answer,
                Next::Try(next) => {
                    info!(from = ?stage, to = ?next, "falling back");
                    stage = next;
                }
            }
        }
    }

    async fn assisted(
        &self,
        query: &WeatherQuery,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> StageOutcome {
        let agent = ToolAgent::new(self.model.clone(), self.tools.clone())
            .with_max_steps(self.max_steps);
        let mut stream = agent.stream_text(&query.raw_prompt);

        let mut full = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(text) => {
                    trace!(%text, "chunk");
                    on_chunk(&text);
                    full.push_str(&text);
                }
                Err(err) => {
                    error!(error = %err, "assisted resolution failed");
                    return StageOutcome::Failed(err.to_string());
                }
            }
        }

        info!(empty = full.trim().is_empty(), "assisted response collected");
        if full.trim().is_empty() {
            StageOutcome::Empty
        } else {
            StageOutcome::Answer(full)
        }
    }

    /// Metric only: the unit choice is not carried into the fallback.
    async fn direct(&self, city: &str) -> StageOutcome {
        let Some(coords) = self.tools.cities().resolve(city) else {
            return StageOutcome::NotFound(format!("Sorry, I don't have coordinates for {city}."));
        };

        match self.tools.source().current(coords, Units::Metric).await {
            Ok(current) => {
                let report =
                    WeatherReport::from_current(city, &current, Units::Metric, self.tools.codes());
                let answer = report.to_string();
                info!(%answer, "direct API result");
                StageOutcome::Answer(answer)
            }
            Err(err) if err.is_missing_data() => {
                StageOutcome::UpstreamError(format!("Error fetching weather data for {city}."))
            }
            Err(err) => {
                warn!(%city, error = %err, "weather API error");
                StageOutcome::Failed(err.to_string())
            }
        }
    }

    async fn default_city(&self) -> StageOutcome {
        info!("attempting direct API call for {DEFAULT_CITY} as final fallback");
        let coords = self.tools.cities().resolve(DEFAULT_CITY).unwrap_or(LONDON);

        match self.tools.source().current(coords, Units::Metric).await {
            Ok(current) => {
                let report = WeatherReport::from_current(
                    DEFAULT_CITY,
                    &current,
                    Units::Metric,
                    self.tools.codes(),
                );
                StageOutcome::Answer(report.to_string())
            }
            Err(err) => {
                error!(error = %err, "even fallback API call failed");
                StageOutcome::Failed(err.to_string())
            }
        }
    }
}
