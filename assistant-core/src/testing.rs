//! In-memory stand-ins for the network collaborators.

use std::{collections::VecDeque, fmt, sync::Mutex};

use async_trait::async_trait;
use futures::stream;

use crate::{
    llm::{
        ChatModel, ChatRequest, ChatResponse, EventStream, LlmError, StreamEvent, ToolCall,
        ToolExecutor, ToolSchema,
    },
    weather::{
        GeoCoordinates, Units,
        openmeteo::{CurrentConditions, HourlyConditions, WeatherError, WeatherSource},
    },
};

/// Replays one scripted step per request; runs out into empty answers.
pub struct ScriptedModel {
    steps: Mutex<VecDeque<Result<Vec<StreamEvent>, LlmError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(steps: Vec<Result<Vec<StreamEvent>, LlmError>>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_step(&self, request: &ChatRequest) -> Result<Vec<StreamEvent>, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut text = String::new();
        let mut calls = Vec::new();
        for event in self.next_step(request)? {
            match event {
                StreamEvent::Text(t) => text.push_str(&t),
                StreamEvent::ToolCallDelta {
                    index,
                    id,
                    name,
                    arguments,
                } => calls.push(ToolCall::new(
                    id.unwrap_or_else(|| format!("call_{index}")),
                    name.unwrap_or_default(),
                    arguments,
                )),
                StreamEvent::Usage(_) => {}
            }
        }
        if calls.is_empty() {
            Ok(ChatResponse::Content(text))
        } else {
            Ok(ChatResponse::ToolCalls(calls))
        }
    }

    async fn stream(&self, request: &ChatRequest) -> Result<EventStream, LlmError> {
        let events = self.next_step(request)?;
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok::<_, LlmError>))))
    }
}

/// One `echo` tool answering `echo:<arguments>`.
#[derive(Default)]
pub struct EchoTools {
    calls: Mutex<Vec<(String, String)>>,
}

impl EchoTools {
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for EchoTools {
    fn schemas(&self) -> Vec<ToolSchema> {
        vec![ToolSchema {
            name: "echo".into(),
            description: "Echo the arguments".into(),
            parameters: serde_json::json!({"type": "object"}),
        }]
    }

    async fn execute(&self, name: &str, arguments: &str) -> String {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.to_string()));
        format!("{name}:{arguments}")
    }
}

type CurrentFn =
    Box<dyn Fn(GeoCoordinates) -> Result<CurrentConditions, WeatherError> + Send + Sync>;
type HourlyFn =
    Box<dyn Fn(GeoCoordinates) -> Result<HourlyConditions, WeatherError> + Send + Sync>;

/// Weather source answering from closures and recording every request.
pub struct StubWeather {
    current: CurrentFn,
    hourly: HourlyFn,
    requests: Mutex<Vec<(GeoCoordinates, Units)>>,
}

impl StubWeather {
    pub fn new<C, H>(current: C, hourly: H) -> Self
    where
        C: Fn(GeoCoordinates) -> Result<CurrentConditions, WeatherError> + Send + Sync + 'static,
        H: Fn(GeoCoordinates) -> Result<HourlyConditions, WeatherError> + Send + Sync + 'static,
    {
        Self {
            current: Box::new(current),
            hourly: Box::new(hourly),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn current_only<C>(current: C) -> Self
    where
        C: Fn(GeoCoordinates) -> Result<CurrentConditions, WeatherError> + Send + Sync + 'static,
    {
        Self::new(current, |_| Err(WeatherError::MissingBlock("hourly")))
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(server_error()), |_| Err(server_error()))
    }

    pub fn requests(&self) -> Vec<(GeoCoordinates, Units)> {
        self.requests.lock().unwrap().clone()
    }
}

impl fmt::Debug for StubWeather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubWeather").finish_non_exhaustive()
    }
}

#[async_trait]
impl WeatherSource for StubWeather {
    async fn current(
        &self,
        coords: GeoCoordinates,
        units: Units,
    ) -> Result<CurrentConditions, WeatherError> {
        self.requests.lock().unwrap().push((coords, units));
        (self.current)(coords)
    }

    async fn hourly(
        &self,
        coords: GeoCoordinates,
        units: Units,
    ) -> Result<HourlyConditions, WeatherError> {
        self.requests.lock().unwrap().push((coords, units));
        (self.hourly)(coords)
    }
}

pub fn server_error() -> WeatherError {
    WeatherError::Status {
        status: 500,
        body: "upstream down".into(),
    }
}

pub fn conditions(temperature: f64, humidity: f64, rain: f64, code: u16) -> CurrentConditions {
    CurrentConditions {
        temperature_2m: temperature,
        relative_humidity_2m: humidity,
        rain,
        weather_code: Some(code),
    }
}
