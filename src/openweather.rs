//! OpenWeather client used by the weather-by-city proxy endpoint

use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::http;
use crate::models::Location;
use crate::{EndpointsConfig, EnricherError};

/// Service names double as the prefix of transport error messages
const GEO_SERVICE: &str = "Geo API";
const WEATHER_SERVICE: &str = "Weather API";

/// Temperature and description reported for a coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    /// Celsius
    pub temperature: f64,
    pub description: String,
}

#[derive(Clone)]
pub struct OpenWeatherClient {
    client: ClientWithMiddleware,
    geo_url: String,
    weather_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    #[must_use]
    pub fn new(client: ClientWithMiddleware, endpoints: &EndpointsConfig, api_key: String) -> Self {
        Self {
            client,
            geo_url: endpoints.openweather_geo_url.clone(),
            weather_url: endpoints.openweather_weather_url.clone(),
            api_key,
        }
    }

    /// Direct geocoding with a single candidate requested.
    ///
    /// An empty list is a successful answer; the caller decides what it means.
    #[instrument(skip(self))]
    pub async fn geocode(&self, city: &str) -> Result<Vec<Location>, EnricherError> {
        let url = http::endpoint(
            &self.geo_url,
            &[("q", city), ("appid", self.api_key.as_str()), ("limit", "1")],
        )?;

        let candidates: Vec<GeoCandidate> = http::get(&self.client, GEO_SERVICE, url)
            .await?
            .success_json()
            .await?;

        debug!("{} geocoding candidates for '{}'", candidates.len(), city);
        Ok(candidates.into_iter().map(Location::from).collect())
    }

    /// Current weather in metric units
    #[instrument(skip(self))]
    pub async fn current_weather(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherReport, EnricherError> {
        let url = http::endpoint(
            &self.weather_url,
            &[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ],
        )?;

        let body: WeatherBody = http::get(&self.client, WEATHER_SERVICE, url)
            .await?
            .success_json()
            .await?;

        let description = body
            .weather
            .into_iter()
            .next()
            .map(|condition| condition.description)
            .ok_or_else(|| EnricherError::parse(WEATHER_SERVICE, "no weather conditions in response"))?;

        Ok(WeatherReport {
            temperature: body.main.temp,
            description,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GeoCandidate {
    lat: f64,
    lon: f64,
    #[serde(default)]
    name: String,
    country: Option<String>,
}

impl From<GeoCandidate> for Location {
    fn from(candidate: GeoCandidate) -> Self {
        Location {
            latitude: candidate.lat,
            longitude: candidate.lon,
            name: candidate.name,
            country: candidate.country,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WeatherBody {
    main: MainReadings,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}
