//! Weather capabilities offered to the model.
//!
//! The set is closed: [`WeatherCapability`] lists every tool, and
//! [`CapabilityCall`] is a validated invocation of one of them. Every outcome,
//! including failures, is a user-facing sentence.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::{
    cities::CityDirectory,
    codes::WeatherCodeTable,
    openmeteo::WeatherSource,
    report::{HourlyForecast, Units, WeatherReport},
};
use crate::llm::{ToolExecutor, ToolSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherCapability {
    CurrentWeather,
    HourlyForecast,
}

impl WeatherCapability {
    pub const fn all() -> &'static [WeatherCapability] {
        &[
            WeatherCapability::CurrentWeather,
            WeatherCapability::HourlyForecast,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            WeatherCapability::CurrentWeather => "getWeather",
            WeatherCapability::HourlyForecast => "getHourlyForecast",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.name() == name)
    }

    pub fn schema(&self) -> ToolSchema {
        let units = json!({
            "type": "string",
            "enum": ["metric", "imperial"],
            "default": "metric",
            "description": "Units to use for temperature (metric or imperial)"
        });

        match self {
            WeatherCapability::CurrentWeather => ToolSchema {
                name: self.name().to_string(),
                description: "Get the current weather in the specified city".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "city": {
                            "type": "string",
                            "description": "The city to get the weather for"
                        },
                        "units": units
                    },
                    "required": ["city"]
                }),
            },
            WeatherCapability::HourlyForecast => ToolSchema {
                name: self.name().to_string(),
                description: "Get an hourly weather forecast for the specified city".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "city": {
                            "type": "string",
                            "description": "The city to get the forecast for"
                        },
                        "hours": {
                            "type": "number",
                            "description": "Number of hours to forecast (max 24)"
                        },
                        "units": units
                    },
                    "required": ["city"]
                }),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct CurrentArgs {
    city: String,
    #[serde(default)]
    units: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HourlyArgs {
    city: String,
    #[serde(default)]
    hours: Option<f64>,
    #[serde(default)]
    units: Option<String>,
}

/// A validated capability invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityCall {
    CurrentWeather { city: String, units: Units },
    HourlyForecast {
        city: String,
        hours: usize,
        units: Units,
    },
}

impl CapabilityCall {
    /// Parses raw model arguments; the error is a message for the model.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, String> {
        let capability =
            WeatherCapability::from_name(name).ok_or_else(|| format!("Unknown tool '{name}'."))?;
        let arguments = if arguments.trim().is_empty() {
            "{}"
        } else {
            arguments
        };
        let invalid = |e: serde_json::Error| format!("Invalid arguments for {name}: {e}");

        Ok(match capability {
            WeatherCapability::CurrentWeather => {
                let args: CurrentArgs = serde_json::from_str(arguments).map_err(invalid)?;
                CapabilityCall::CurrentWeather {
                    city: args.city,
                    units: units_from(args.units.as_deref()),
                }
            }
            WeatherCapability::HourlyForecast => {
                let args: HourlyArgs = serde_json::from_str(arguments).map_err(invalid)?;
                CapabilityCall::HourlyForecast {
                    city: args.city,
                    hours: hours_from(args.hours),
                    units: units_from(args.units.as_deref()),
                }
            }
        })
    }
}

fn units_from(requested: Option<&str>) -> Units {
    requested.map(Units::parse_lenient).unwrap_or_default()
}

fn hours_from(requested: Option<f64>) -> usize {
    match requested {
        Some(h) if h.is_finite() => h.clamp(0.0, HourlyForecast::MAX_HOURS as f64) as usize,
        _ => HourlyForecast::DEFAULT_HOURS,
    }
}

/// Current conditions for `city`, as one sentence.
pub async fn get_current_weather(
    source: &dyn WeatherSource,
    cities: &CityDirectory,
    codes: &WeatherCodeTable,
    city: &str,
    units: Units,
) -> String {
    let Some(coords) = cities.resolve(city) else {
        return format!("Sorry, I don't have coordinates for {city}.");
    };

    match source.current(coords, units).await {
        Ok(current) => WeatherReport::from_current(city, &current, units, codes).to_string(),
        Err(err) if err.is_missing_data() => format!("Error fetching weather data for {city}."),
        Err(err) => {
            error!(%city, error = %err, "weather API error");
            format!("Sorry, I couldn't fetch the weather for {city} due to an error.")
        }
    }
}

/// Up to 24 hourly lines for `city`.
pub async fn get_hourly_forecast(
    source: &dyn WeatherSource,
    cities: &CityDirectory,
    codes: &WeatherCodeTable,
    city: &str,
    hours: usize,
    units: Units,
) -> String {
    let Some(coords) = cities.resolve(city) else {
        return format!("Sorry, I don't have coordinates for {city}.");
    };

    match source.hourly(coords, units).await {
        Ok(hourly) => HourlyForecast::from_hourly(city, &hourly, hours, units, codes).to_string(),
        Err(err) if err.is_missing_data() => format!("Error fetching forecast data for {city}."),
        Err(err) => {
            error!(%city, error = %err, "weather API error");
            format!("Sorry, I couldn't fetch the forecast for {city} due to an error.")
        }
    }
}

/// Registration table binding the capabilities to a weather source.
#[derive(Debug, Clone)]
pub struct WeatherTools {
    source: Arc<dyn WeatherSource>,
    cities: CityDirectory,
    codes: WeatherCodeTable,
}

impl WeatherTools {
    pub fn new(source: Arc<dyn WeatherSource>) -> Self {
        Self::with_tables(
            source,
            CityDirectory::standard().clone(),
            WeatherCodeTable::standard().clone(),
        )
    }

    pub fn with_tables(
        source: Arc<dyn WeatherSource>,
        cities: CityDirectory,
        codes: WeatherCodeTable,
    ) -> Self {
        Self {
            source,
            cities,
            codes,
        }
    }

    pub fn source(&self) -> &dyn WeatherSource {
        self.source.as_ref()
    }

    pub fn cities(&self) -> &CityDirectory {
        &self.cities
    }

    pub fn codes(&self) -> &WeatherCodeTable {
        &self.codes
    }

    pub async fn run(&self, call: &CapabilityCall) -> String {
        match call {
            CapabilityCall::CurrentWeather { city, units } => {
                get_current_weather(self.source(), &self.cities, &self.codes, city, *units).await
            }
            CapabilityCall::HourlyForecast { city, hours, units } => {
                get_hourly_forecast(
                    self.source(),
                    &self.cities,
                    &self.codes,
                    city,
                    *hours,
                    *units,
                )
                .await
            }
        }
    }
}

#[async_trait]
impl ToolExecutor for WeatherTools {
    fn schemas(&self) -> Vec<ToolSchema> {
        WeatherCapability::all()
            .iter()
            .map(WeatherCapability::schema)
            .collect()
    }

    async fn execute(&self, name: &str, arguments: &str) -> String {
        match CapabilityCall::parse(name, arguments) {
            Ok(call) => {
                info!(?call, "running weather capability");
                self.run(&call).await
            }
            Err(message) => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubWeather, conditions, server_error};
    use crate::weather::openmeteo::{HourlyConditions, WeatherError};

    fn tools(source: StubWeather) -> (Arc<StubWeather>, WeatherTools) {
        let source = Arc::new(source);
        (source.clone(), WeatherTools::new(source))
    }

    fn day_of_hours() -> HourlyConditions {
        HourlyConditions {
            time: (0..48)
                .map(|i| format!("2024-05-0{}T{:02}:00", 1 + i / 24, i % 24))
                .collect(),
            temperature_2m: vec![18.0; 48],
            precipitation_probability: vec![Some(40.0); 48],
            weather_code: vec![Some(61); 48],
        }
    }

    fn hourly_call(city: &str, hours: usize, units: Units) -> CapabilityCall {
        CapabilityCall::HourlyForecast {
            city: city.to_string(),
            hours,
            units,
        }
    }

    #[test]
    fn parse_applies_defaults() {
        assert_eq!(
            CapabilityCall::parse("getWeather", r#"{"city":"Paris"}"#).unwrap(),
            CapabilityCall::CurrentWeather {
                city: "Paris".into(),
                units: Units::Metric,
            }
        );
        assert_eq!(
            CapabilityCall::parse("getHourlyForecast", r#"{"city":"Paris","units":"imperial"}"#)
                .unwrap(),
            hourly_call("Paris", 6, Units::Imperial)
        );
    }

    #[test]
    fn parse_clamps_hours() {
        let call =
            CapabilityCall::parse("getHourlyForecast", r#"{"city":"Rome","hours":100}"#).unwrap();
        assert_eq!(call, hourly_call("Rome", 24, Units::Metric));

        let call =
            CapabilityCall::parse("getHourlyForecast", r#"{"city":"Rome","hours":-3}"#).unwrap();
        assert_eq!(call, hourly_call("Rome", 0, Units::Metric));
    }

    #[test]
    fn parse_rejects_unknown_tool_and_bad_args() {
        assert_eq!(
            CapabilityCall::parse("launchRocket", "{}").unwrap_err(),
            "Unknown tool 'launchRocket'."
        );
        let err = CapabilityCall::parse("getWeather", "").unwrap_err();
        assert!(err.starts_with("Invalid arguments for getWeather"));
        assert!(err.contains("city"));
    }

    #[test]
    fn schemas_are_registered_for_both_capabilities() {
        let (_, tools) = tools(StubWeather::failing());
        let names: Vec<_> = tools.schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["getWeather", "getHourlyForecast"]);
    }

    #[tokio::test]
    async fn current_weather_formats_report() {
        let source = StubWeather::current_only(|_| Ok(conditions(15.0, 60.0, 0.0, 3)));
        let (source, tools) = tools(source);
        let out = tools.execute("getWeather", r#"{"city":"Tokyo"}"#).await;
        assert_eq!(
            out,
            "The weather in Tokyo is 15°C with Overcast. Humidity: 60%, Rain: 0mm."
        );
        assert_eq!(source.requests()[0].1, Units::Metric);
    }

    #[tokio::test]
    async fn imperial_is_requested_and_labelled() {
        let source = StubWeather::current_only(|_| Ok(conditions(59.0, 60.0, 0.0, 0)));
        let (source, tools) = tools(source);
        let out = tools
            .execute("getWeather", r#"{"city":"tokyo","units":"imperial"}"#)
            .await;
        assert_eq!(
            out,
            "The weather in tokyo is 59°F with Clear sky. Humidity: 60%, Rain: 0mm."
        );
        assert_eq!(source.requests()[0].1, Units::Imperial);
    }

    #[tokio::test]
    async fn same_input_gives_identical_output() {
        let source = StubWeather::current_only(|_| Ok(conditions(21.4, 55.0, 0.2, 80)));
        let (_, tools) = tools(source);
        let call = CapabilityCall::CurrentWeather {
            city: "Berlin".into(),
            units: Units::Metric,
        };
        assert_eq!(tools.run(&call).await, tools.run(&call).await);
    }

    #[tokio::test]
    async fn unknown_city_never_hits_the_network() {
        let (source, tools) = tools(StubWeather::failing());
        let out = tools.execute("getWeather", r#"{"city":"Atlantis"}"#).await;
        assert_eq!(out, "Sorry, I don't have coordinates for Atlantis.");
        let out = tools
            .execute("getHourlyForecast", r#"{"city":"Atlantis"}"#)
            .await;
        assert_eq!(out, "Sorry, I don't have coordinates for Atlantis.");
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_block_and_transport_errors_become_messages() {
        let (_, tools) = tools(StubWeather::new(
            |_| Err(WeatherError::MissingBlock("current")),
            |_| Err(server_error()),
        ));
        assert_eq!(
            tools.execute("getWeather", r#"{"city":"Paris"}"#).await,
            "Error fetching weather data for Paris."
        );
        assert_eq!(
            tools
                .execute("getHourlyForecast", r#"{"city":"Paris"}"#)
                .await,
            "Sorry, I couldn't fetch the forecast for Paris due to an error."
        );

        let (_, tools) = self::tools(StubWeather::new(
            |_| Err(server_error()),
            |_| Err(WeatherError::MissingBlock("hourly")),
        ));
        assert_eq!(
            tools.execute("getWeather", r#"{"city":"Paris"}"#).await,
            "Sorry, I couldn't fetch the weather for Paris due to an error."
        );
        assert_eq!(
            tools
                .execute("getHourlyForecast", r#"{"city":"Paris"}"#)
                .await,
            "Error fetching forecast data for Paris."
        );
    }

    #[tokio::test]
    async fn forecast_is_capped_at_24_lines() {
        let source = StubWeather::new(|_| Err(server_error()), |_| Ok(day_of_hours()));
        let (_, tools) = tools(source);
        let out = tools
            .execute("getHourlyForecast", r#"{"city":"London","hours":100}"#)
            .await;
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "Hourly forecast for London (next 24 hours):");
        assert_eq!(lines.len() - 1, 24);
        assert_eq!(
            lines[1],
            "00:00: 18°C, Slight rain, 40% chance of precipitation"
        );
    }

    #[tokio::test]
    async fn forecast_defaults_to_six_hours() {
        let source = StubWeather::new(|_| Err(server_error()), |_| Ok(day_of_hours()));
        let (_, tools) = tools(source);
        let out = tools
            .execute("getHourlyForecast", r#"{"city":"London"}"#)
            .await;
        assert_eq!(out.lines().count(), 7);
    }
}
