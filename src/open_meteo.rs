//! Open-Meteo client for geocoding and current conditions
//!
//! Both endpoints are key-free. The batch pipeline uses them for its geocode
//! and weather steps.

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use tracing::{debug, info, instrument, warn};

use crate::http;
use crate::models::{CurrentConditions, Location};
use crate::pipeline::{CurrentWeatherProvider, Geocoder};
use crate::{EndpointsConfig, EnricherError};

const GEOCODING_SERVICE: &str = "Open-Meteo geocoding";
const FORECAST_SERVICE: &str = "Open-Meteo forecast";

/// Client for the Open-Meteo geocoding and forecast APIs
#[derive(Clone)]
pub struct OpenMeteoClient {
    client: ClientWithMiddleware,
    geocoding_url: String,
    forecast_url: String,
}

impl OpenMeteoClient {
    #[must_use]
    pub fn new(client: ClientWithMiddleware, endpoints: &EndpointsConfig) -> Self {
        Self {
            client,
            geocoding_url: endpoints.geocoding_url.clone(),
            forecast_url: endpoints.forecast_url.clone(),
        }
    }

    /// Resolve a city within a country to its best match
    #[instrument(skip(self))]
    pub async fn geocode_city(
        &self,
        city: &str,
        country_code: &str,
    ) -> Result<Location, EnricherError> {
        let url = http::endpoint(
            &self.geocoding_url,
            &[("name", city), ("country", country_code), ("count", "1")],
        )?;

        let response: openmeteo::GeocodingResponse = http::get(&self.client, GEOCODING_SERVICE, url)
            .await?
            .success_json()
            .await?;

        let location = response
            .results
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(Location::from)
            .ok_or_else(|| {
                warn!("No results found for '{}, {}'", city, country_code);
                EnricherError::not_found("No geocode results")
            })?;

        debug!(
            "Geocoded '{}' to {} ({})",
            city,
            location.name,
            location.format_coordinates()
        );
        Ok(location)
    }

    /// Current conditions at a coordinate, wind speed in m/s
    #[instrument(skip(self))]
    pub async fn current_conditions(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<CurrentConditions, EnricherError> {
        let url = http::endpoint(
            &self.forecast_url,
            &[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current_weather", "true".to_string()),
                ("wind_speed_unit", "ms".to_string()),
            ],
        )?;

        let response: openmeteo::ForecastResponse = http::get(&self.client, FORECAST_SERVICE, url)
            .await?
            .success_json()
            .await?;

        let current = response.current_weather.ok_or_else(|| {
            EnricherError::parse(FORECAST_SERVICE, "response has no current_weather block")
        })?;

        let conditions = CurrentConditions::from(current);
        info!(
            "Current conditions at {:.4}, {:.4}: {}, {}",
            latitude,
            longitude,
            conditions.format_temperature(),
            conditions.format_wind()
        );
        Ok(conditions)
    }
}

#[async_trait]
impl Geocoder for OpenMeteoClient {
    async fn geocode(&self, city: &str, country_code: &str) -> Result<Location, EnricherError> {
        self.geocode_city(city, country_code).await
    }
}

#[async_trait]
impl CurrentWeatherProvider for OpenMeteoClient {
    async fn current_weather(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<CurrentConditions, EnricherError> {
        self.current_conditions(latitude, longitude).await
    }
}

/// `OpenMeteo` API response structures and conversion utilities
mod openmeteo {
    use super::{CurrentConditions, Location};
    use serde::Deserialize;

    /// Forecast response; only the `current_weather` block is requested
    #[derive(Debug, Deserialize)]
    pub struct ForecastResponse {
        pub current_weather: Option<CurrentWeather>,
    }

    #[derive(Debug, Deserialize)]
    pub struct CurrentWeather {
        pub temperature: f64,
        pub windspeed: f64,
    }

    /// Geocoding response from `OpenMeteo`; `results` is absent when nothing matched
    #[derive(Debug, Deserialize)]
    pub struct GeocodingResponse {
        pub results: Option<Vec<GeocodingResult>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct GeocodingResult {
        pub name: String,
        pub latitude: f64,
        pub longitude: f64,
        pub country: Option<String>,
    }

    impl From<GeocodingResult> for Location {
        fn from(result: GeocodingResult) -> Self {
            match result.country {
                Some(country) => {
                    Location::with_country(result.latitude, result.longitude, result.name, country)
                }
                None => Location::new(result.latitude, result.longitude, result.name),
            }
        }
    }

    impl From<CurrentWeather> for CurrentConditions {
        fn from(current: CurrentWeather) -> Self {
            Self {
                temperature: current.temperature,
                wind_speed: current.windspeed,
            }
        }
    }
}
