//! Shared HTTP plumbing for upstream clients
//!
//! Every upstream client is built on a `reqwest_middleware` client with a
//! per-call timeout and an optional fixed number of retries. Only transport
//! failures are retried; any HTTP status is final.

use std::time::{Duration, Instant};

use reqwest::{StatusCode, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{
    RetryTransientMiddleware, Retryable, RetryableStrategy, default_on_request_failure,
    policies::ExponentialBackoff,
};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::EnricherError;

/// User agent sent with every upstream request
pub const USER_AGENT: &str = concat!("expense-enricher/", env!("CARGO_PKG_VERSION"));

/// Retries connection-level failures only; every received response is final
struct TransportFailuresOnly;

impl RetryableStrategy for TransportFailuresOnly {
    fn handle(
        &self,
        res: &Result<reqwest::Response, reqwest_middleware::Error>,
    ) -> Option<Retryable> {
        match res {
            Ok(_) => None,
            Err(error) => default_on_request_failure(error),
        }
    }
}

/// Build an upstream client. `max_retries == 0` disables the retry middleware.
pub fn build_client(
    timeout: Duration,
    max_retries: u32,
) -> Result<ClientWithMiddleware, EnricherError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| EnricherError::config(format!("Failed to create HTTP client: {e}")))?;

    let mut builder = ClientBuilder::new(client);
    if max_retries > 0 {
        let policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        builder = builder.with(RetryTransientMiddleware::new_with_policy_and_strategy(
            policy,
            TransportFailuresOnly,
        ));
    }

    Ok(builder.build())
}

/// Join a base URL with query parameters
pub fn endpoint<I, K, V>(base: &str, params: I) -> Result<Url, EnricherError>
where
    I: IntoIterator,
    I::Item: std::borrow::Borrow<(K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    Url::parse_with_params(base, params)
        .map_err(|e| EnricherError::config(format!("Invalid endpoint URL '{base}': {e}")))
}

/// Upstream response after the transport succeeded
pub struct UpstreamResponse {
    pub status: StatusCode,
    response: reqwest::Response,
    service: &'static str,
}

impl UpstreamResponse {
    /// Decode the body as JSON
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, EnricherError> {
        let service = self.service;
        self.response
            .json::<T>()
            .await
            .map_err(|e| EnricherError::parse(service, e.without_url()))
    }

    /// Decode a successful body, turning any other status into `EnricherError::Http`
    pub async fn success_json<T: DeserializeOwned>(self) -> Result<T, EnricherError> {
        if !self.status.is_success() {
            return Err(EnricherError::http(self.service, self.status.as_u16()));
        }
        self.json().await
    }
}

/// Issue a GET and report transport failures as `EnricherError::Network`.
///
/// Query strings are never logged: some carry API keys.
#[instrument(level = "debug", skip(client, url), fields(path = %url.path()))]
pub async fn get(
    client: &ClientWithMiddleware,
    service: &'static str,
    url: Url,
) -> Result<UpstreamResponse, EnricherError> {
    let start = Instant::now();

    let response = client.get(url).send().await.map_err(|e| {
        warn!("{} request failed after {:.3}s", service, start.elapsed().as_secs_f64());
        EnricherError::network(service, describe(e))
    })?;

    let status = response.status();
    let elapsed = start.elapsed();
    debug!("{} responded {} in {:.3}s", service, status, elapsed.as_secs_f64());

    if elapsed.as_secs() > 5 {
        warn!("Slow {} response: {:.3}s", service, elapsed.as_secs_f64());
    }

    Ok(UpstreamResponse {
        status,
        response,
        service,
    })
}

/// Flatten the error chain; reqwest's top-level message alone hides timeouts
fn describe(error: reqwest_middleware::Error) -> String {
    let error: Box<dyn std::error::Error> = match error {
        reqwest_middleware::Error::Reqwest(e) => Box::new(e.without_url()),
        other => return other.to_string(),
    };

    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
