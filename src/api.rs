//! HTTP API of the proxy service
//!
//! Two read-only endpoints:
//! - `GET /get_weather/{city}`: geocode, then current weather
//! - `GET /get_github_user?username=..`: public GitHub profile subset

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::github::GitHubClient;
use crate::http;
use crate::models::{CityWeather, UserProfile};
use crate::openweather::OpenWeatherClient;
use crate::{EnricherConfig, EnricherError};

/// Clients shared by every request; read-only
#[derive(Clone)]
pub struct AppState {
    pub openweather: OpenWeatherClient,
    pub github: GitHubClient,
}

impl AppState {
    #[must_use]
    pub fn new(openweather: OpenWeatherClient, github: GitHubClient) -> Self {
        Self {
            openweather,
            github,
        }
    }

    /// Build the upstream clients. Fails when no OpenWeather key is configured.
    pub fn from_config(config: &EnricherConfig) -> Result<Self, EnricherError> {
        let api_key = config.require_openweather_key()?;
        // The proxy never retries upstream calls
        let client = http::build_client(config.http.timeout(), 0)?;

        Ok(Self::new(
            OpenWeatherClient::new(client.clone(), &config.endpoints, api_key),
            GitHubClient::new(client, &config.endpoints),
        ))
    }
}

/// Client-visible failure: a status code and a `{"detail": ..}` body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ApiError {
    pub fn new<S: Into<String>>(status: StatusCode, detail: S) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// Map an upstream failure of one weather step.
    ///
    /// Transport and decoding failures become 502; a non-success upstream
    /// status is passed through with `status_detail`.
    fn from_weather_step(error: EnricherError, status_detail: &str) -> Self {
        match error {
            EnricherError::Network { .. } | EnricherError::Parse { .. } => {
                Self::new(StatusCode::BAD_GATEWAY, error.to_string())
            }
            EnricherError::Http { status, .. } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                Self::new(status, status_detail)
            }
            other => Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }

    fn from_profile_lookup(error: EnricherError) -> Self {
        match error {
            EnricherError::RateLimited { message } => Self::new(StatusCode::FORBIDDEN, message),
            EnricherError::NotFound { message } => Self::new(StatusCode::NOT_FOUND, message),
            other => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("External API request failed: {other}"),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!("Request failed with {}: {}", self.status, self.detail);
        }
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub username: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/get_weather/{city}", get(get_weather))
        .route("/get_github_user", get(get_github_user))
        .with_state(state)
}

async fn get_weather(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<Json<CityWeather>, ApiError> {
    let candidates = state
        .openweather
        .geocode(&city)
        .await
        .map_err(|e| ApiError::from_weather_step(e, "Error fetching coordinates"))?;

    let location = candidates
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Invalid city name"))?;

    let report = state
        .openweather
        .current_weather(location.latitude, location.longitude)
        .await
        .map_err(|e| ApiError::from_weather_step(e, "Error fetching weather data"))?;

    Ok(Json(CityWeather {
        city,
        temperature: report.temperature,
        weather_description: report.description,
    }))
}

async fn get_github_user(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<UserProfile>, ApiError> {
    state
        .github
        .fetch_profile(&query.username)
        .await
        .map(Json)
        .map_err(ApiError::from_profile_lookup)
}
