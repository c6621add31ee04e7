//! Expense enrichment and a small upstream API proxy
//!
//! The batch side reads expense rows, attaches coordinates, current weather
//! and a USD conversion to each, and writes the enriched table. The proxy
//! side exposes weather-by-city and GitHub profile lookups over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod exchange_rate;
pub mod github;
pub mod http;
pub mod models;
pub mod open_meteo;
pub mod openweather;
pub mod pipeline;
pub mod records;
pub mod telemetry;
pub mod web;

// Re-export core types for public API
pub use api::AppState;
pub use config::{EndpointsConfig, EnricherConfig};
pub use error::EnricherError;
pub use exchange_rate::ExchangeRateClient;
pub use github::GitHubClient;
pub use models::{EnrichedRecord, ExpenseRecord, Location};
pub use open_meteo::OpenMeteoClient;
pub use openweather::OpenWeatherClient;
pub use pipeline::{
    CurrencyConverter, CurrentWeatherProvider, EnrichmentPipeline, EnrichmentReport, Geocoder,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, EnricherError>;
