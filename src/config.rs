//! Configuration management for the expense enricher
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::EnricherError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Legacy variable holding the exchangerate.host access key
pub const FX_API_KEY_VAR: &str = "FX_API_KEY";
/// Legacy variable holding the OpenWeather API key
pub const OPENWEATHER_API_KEY_VAR: &str = "OPENWEATHER_API_KEY";
/// Longest accepted pause between records, in seconds
pub const MAX_DELAY_SECONDS: f64 = 3600.0;

/// Root configuration structure shared by both binaries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnricherConfig {
    /// Upstream HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,
    /// Upstream service locations
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    /// Batch pipeline settings
    #[serde(default)]
    pub batch: BatchConfig,
    /// API proxy settings
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP client settings for upstream calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-call timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u32,
    /// Retries on transient failures (batch client only)
    #[serde(default = "default_http_max_retries")]
    pub max_retries: u32,
}

/// Base URLs of every upstream the crate talks to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
    #[serde(default = "default_exchange_url")]
    pub exchange_url: String,
    #[serde(default = "default_openweather_geo_url")]
    pub openweather_geo_url: String,
    #[serde(default = "default_openweather_weather_url")]
    pub openweather_weather_url: String,
    #[serde(default = "default_github_users_url")]
    pub github_users_url: String,
}

/// Batch pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Input CSV path
    #[serde(default = "default_batch_input")]
    pub input: PathBuf,
    /// Output CSV path
    #[serde(default = "default_batch_output")]
    pub output: PathBuf,
    /// Pause after each record, in seconds
    #[serde(default = "default_batch_delay")]
    pub delay_seconds: f64,
    /// exchangerate.host access key (optional)
    pub fx_api_key: Option<String>,
}

/// API proxy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_host")]
    pub host: String,
    #[serde(default = "default_proxy_port")]
    pub port: u16,
    /// OpenWeather API key, required to start the proxy
    pub openweather_api_key: Option<String>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_http_timeout() -> u32 {
    10
}

fn default_http_max_retries() -> u32 {
    2
}

fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".to_string()
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_exchange_url() -> String {
    "https://api.exchangerate.host/convert".to_string()
}

fn default_openweather_geo_url() -> String {
    "http://api.openweathermap.org/geo/1.0/direct".to_string()
}

fn default_openweather_weather_url() -> String {
    "https://api.openweathermap.org/data/2.5/weather".to_string()
}

fn default_github_users_url() -> String {
    "https://api.github.com/users".to_string()
}

fn default_batch_input() -> PathBuf {
    PathBuf::from("expenses.csv")
}

fn default_batch_output() -> PathBuf {
    PathBuf::from("enriched_expenses.csv")
}

fn default_batch_delay() -> f64 {
    0.5
}

fn default_proxy_host() -> String {
    "0.0.0.0".to_string()
}

fn default_proxy_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_http_timeout(),
            max_retries: default_http_max_retries(),
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            geocoding_url: default_geocoding_url(),
            forecast_url: default_forecast_url(),
            exchange_url: default_exchange_url(),
            openweather_geo_url: default_openweather_geo_url(),
            openweather_weather_url: default_openweather_weather_url(),
            github_users_url: default_github_users_url(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input: default_batch_input(),
            output: default_batch_output(),
            delay_seconds: default_batch_delay(),
            fx_api_key: None,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: default_proxy_host(),
            port: default_proxy_port(),
            openweather_api_key: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl HttpConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }
}

impl BatchConfig {
    /// Pacing delay applied after every record
    pub fn pacing_delay(&self) -> std::result::Result<Duration, EnricherError> {
        if !(0.0..=MAX_DELAY_SECONDS).contains(&self.delay_seconds) {
            return Err(delay_out_of_range(self.delay_seconds));
        }
        Duration::try_from_secs_f64(self.delay_seconds)
            .map_err(|_| delay_out_of_range(self.delay_seconds))
    }
}

impl EnricherConfig {
    /// Load configuration from `config_path`, or the default location when
    /// `None`, then apply environment overrides
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. ENRICHER_HTTP__TIMEOUT_SECONDS
        builder = builder.add_source(
            Environment::with_prefix("ENRICHER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: EnricherConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_env_fallbacks();
        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("expense-enricher").join("config.toml"))
    }

    /// Fill API keys from the legacy plain environment variables
    pub fn apply_env_fallbacks(&mut self) {
        if self.batch.fx_api_key.is_none() {
            self.batch.fx_api_key = non_empty_env(FX_API_KEY_VAR);
        }
        if self.proxy.openweather_api_key.is_none() {
            self.proxy.openweather_api_key = non_empty_env(OPENWEATHER_API_KEY_VAR);
        }
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.http.timeout_seconds == 0 {
            self.http.timeout_seconds = default_http_timeout();
        }
        if self.endpoints.geocoding_url.is_empty() {
            self.endpoints.geocoding_url = default_geocoding_url();
        }
        if self.endpoints.forecast_url.is_empty() {
            self.endpoints.forecast_url = default_forecast_url();
        }
        if self.endpoints.exchange_url.is_empty() {
            self.endpoints.exchange_url = default_exchange_url();
        }
        if self.endpoints.openweather_geo_url.is_empty() {
            self.endpoints.openweather_geo_url = default_openweather_geo_url();
        }
        if self.endpoints.openweather_weather_url.is_empty() {
            self.endpoints.openweather_weather_url = default_openweather_weather_url();
        }
        if self.endpoints.github_users_url.is_empty() {
            self.endpoints.github_users_url = default_github_users_url();
        }
        if self.proxy.host.is_empty() {
            self.proxy.host = default_proxy_host();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Keys are optional here, but must not be blank when present
    pub fn validate_api_keys(&self) -> Result<()> {
        if let Some(key) = &self.batch.fx_api_key {
            if key.trim().is_empty() {
                return Err(ApiKeyKind::Fx.blank_error().into());
            }
        }
        if let Some(key) = &self.proxy.openweather_api_key {
            if key.trim().is_empty() {
                return Err(ApiKeyKind::OpenWeather.blank_error().into());
            }
        }
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.http.timeout_seconds > 300 {
            return Err(EnricherError::config("HTTP timeout cannot exceed 300 seconds").into());
        }

        if self.http.max_retries > 10 {
            return Err(EnricherError::config("HTTP max retries cannot exceed 10").into());
        }

        self.batch.pacing_delay()?;

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(EnricherError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(EnricherError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let endpoints = [
            ("geocoding_url", &self.endpoints.geocoding_url),
            ("forecast_url", &self.endpoints.forecast_url),
            ("exchange_url", &self.endpoints.exchange_url),
            ("openweather_geo_url", &self.endpoints.openweather_geo_url),
            ("openweather_weather_url", &self.endpoints.openweather_weather_url),
            ("github_users_url", &self.endpoints.github_users_url),
        ];
        for (name, url) in endpoints {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(EnricherError::config(format!(
                    "Endpoint '{name}' must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }

    /// The proxy refuses to start without an OpenWeather key
    pub fn require_openweather_key(&self) -> std::result::Result<String, EnricherError> {
        self.proxy.openweather_api_key.clone().ok_or_else(|| {
            EnricherError::config(format!(
                "Please set {OPENWEATHER_API_KEY_VAR} in your environment or proxy.openweather_api_key in the config file"
            ))
        })
    }
}

fn delay_out_of_range(delay_seconds: f64) -> EnricherError {
    EnricherError::config(format!(
        "Batch delay must be between 0 and {MAX_DELAY_SECONDS} seconds, got {delay_seconds}"
    ))
}

/// Keys checked by `validate_api_keys`
enum ApiKeyKind {
    Fx,
    OpenWeather,
}

impl ApiKeyKind {
    fn blank_error(&self) -> EnricherError {
        let name = match self {
            ApiKeyKind::Fx => "FX API key",
            ApiKeyKind::OpenWeather => "OpenWeather API key",
        };
        EnricherError::config(format!(
            "{name} cannot be empty if provided. Either remove it or provide a valid key."
        ))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EnricherConfig::default();
        assert_eq!(config.http.timeout_seconds, 10);
        assert_eq!(config.http.max_retries, 2);
        assert_eq!(config.batch.input, PathBuf::from("expenses.csv"));
        assert_eq!(config.batch.output, PathBuf::from("enriched_expenses.csv"));
        assert_eq!(config.batch.pacing_delay().unwrap(), Duration::from_millis(500));
        assert_eq!(config.proxy.port, 8000);
        assert_eq!(config.logging.level, "info");
        assert!(config.batch.fx_api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_blank_api_key() {
        let mut config = EnricherConfig::default();
        config.batch.fx_api_key = Some("   ".to_string());
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("FX API key"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = EnricherConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = EnricherConfig::default();
        config.http.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));

        let mut config = EnricherConfig::default();
        config.batch.delay_seconds = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_delay_is_rejected_not_panicking() {
        let mut config = EnricherConfig::default();
        config.batch.delay_seconds = 1e30;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Batch delay must be between"));

        let err = config.batch.pacing_delay().unwrap_err();
        assert!(matches!(err, EnricherError::Config { .. }));

        config.batch.delay_seconds = f64::NAN;
        assert!(config.batch.pacing_delay().is_err());

        config.batch.delay_seconds = 0.25;
        assert_eq!(config.batch.pacing_delay().unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_config_validation_endpoint_scheme() {
        let mut config = EnricherConfig::default();
        config.endpoints.exchange_url = "ftp://example.com".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("exchange_url"));
    }

    #[test]
    fn test_apply_defaults_fills_blanks() {
        let mut config = EnricherConfig::default();
        config.http.timeout_seconds = 0;
        config.endpoints.geocoding_url = String::new();
        config.logging.format = String::new();
        config.apply_defaults();
        assert_eq!(config.http.timeout_seconds, 10);
        assert_eq!(
            config.endpoints.geocoding_url,
            "https://geocoding-api.open-meteo.com/v1/search"
        );
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[http]
timeout_seconds = 5

[batch]
delay_seconds = 0.0
fx_api_key = "file-key"

[endpoints]
geocoding_url = "http://127.0.0.1:9999/v1/search"

[proxy]
port = 9001
openweather_api_key = "ow-key"
"#
        )
        .unwrap();

        let config = EnricherConfig::load_from_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.http.timeout_seconds, 5);
        assert_eq!(config.http.max_retries, 2);
        assert_eq!(config.batch.delay_seconds, 0.0);
        assert_eq!(config.batch.fx_api_key.as_deref(), Some("file-key"));
        assert_eq!(config.endpoints.geocoding_url, "http://127.0.0.1:9999/v1/search");
        assert_eq!(config.endpoints.forecast_url, "https://api.open-meteo.com/v1/forecast");
        assert_eq!(config.proxy.port, 9001);
        assert_eq!(config.require_openweather_key().unwrap(), "ow-key");
    }

    #[test]
    fn test_require_openweather_key_missing() {
        let config = EnricherConfig::default();
        let err = config.require_openweather_key().unwrap_err();
        assert!(matches!(err, EnricherError::Config { .. }));
        assert!(err.to_string().contains(OPENWEATHER_API_KEY_VAR));
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = EnricherConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("expense-enricher"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
    }
}
