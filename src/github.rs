//! GitHub users API client for the user-profile proxy endpoint

use reqwest::{StatusCode, Url};
use reqwest_middleware::ClientWithMiddleware;
use tracing::{instrument, warn};

use crate::http;
use crate::models::UserProfile;
use crate::{EndpointsConfig, EnricherError};

const SERVICE: &str = "GitHub API";

#[derive(Clone)]
pub struct GitHubClient {
    client: ClientWithMiddleware,
    users_url: String,
}

impl GitHubClient {
    #[must_use]
    pub fn new(client: ClientWithMiddleware, endpoints: &EndpointsConfig) -> Self {
        Self {
            client,
            users_url: endpoints.github_users_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch a public profile.
    ///
    /// 403 is GitHub's unauthenticated rate-limit answer and maps to
    /// `RateLimited`; 404 maps to `NotFound`.
    #[instrument(skip(self))]
    pub async fn fetch_profile(&self, username: &str) -> Result<UserProfile, EnricherError> {
        let raw = format!("{}/{}", self.users_url, urlencoding::encode(username));
        let url = Url::parse(&raw)
            .map_err(|e| EnricherError::config(format!("Invalid GitHub users URL '{raw}': {e}")))?;

        let response = http::get(&self.client, SERVICE, url).await?;
        match response.status {
            StatusCode::FORBIDDEN => {
                warn!("GitHub rate limit hit while fetching '{}'", username);
                Err(EnricherError::rate_limited("API rate limit exceeded"))
            }
            StatusCode::NOT_FOUND => Err(EnricherError::not_found("User not found")),
            _ => response.success_json().await,
        }
    }
}
