//! Weather assistant: city extraction, capabilities and the fallback cascade.

pub mod cascade;
pub mod cities;
pub mod codes;
pub mod extract;
pub mod openmeteo;
pub mod report;
pub mod tools;

pub use cascade::WeatherAssistant;
pub use cities::{CityDirectory, GeoCoordinates};
pub use codes::WeatherCodeTable;
pub use extract::{DEFAULT_CITY, extract_city};
pub use openmeteo::{OpenMeteoClient, WeatherError, WeatherSource};
pub use report::{HourlyForecast, Units, WeatherQuery, WeatherReport};
pub use tools::{CapabilityCall, WeatherCapability, WeatherTools};
