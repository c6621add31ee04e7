//! Expense enrichment pipeline
//!
//! Each expense goes through three lookups. Geocoding gates the record: when
//! it fails the record is dropped. Weather and FX only depend on the geocode
//! result, so they are awaited together, and their failures are recorded on
//! the row instead of dropping it.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::EnricherError;
use crate::models::{CurrentConditions, EnrichedRecord, ExpenseRecord, FxConversion, Location};

/// Separator between per-step messages in the `errors` column
pub const ERROR_SEPARATOR: &str = "; ";

/// Resolves a city to coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, city: &str, country_code: &str) -> Result<Location, EnricherError>;
}

/// Current conditions at a coordinate
#[async_trait]
pub trait CurrentWeatherProvider: Send + Sync {
    async fn current_weather(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<CurrentConditions, EnricherError>;
}

/// Converts an amount in `currency` to USD
#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    async fn convert_to_usd(
        &self,
        currency: &str,
        amount: Decimal,
    ) -> Result<FxConversion, EnricherError>;
}

/// Lookup steps, used as prefixes of the messages in the `errors` column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Geocode,
    Weather,
    Fx,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Geocode => write!(f, "geocode"),
            Step::Weather => write!(f, "weather"),
            Step::Fx => write!(f, "fx"),
        }
    }
}

/// Format a step failure the way it appears in the output table
#[must_use]
pub fn step_error(step: Step, error: &EnricherError) -> String {
    format!("{step}: {error}")
}

/// An input row that produced no output because geocoding failed
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    /// 1-based data row number in the input
    pub row: usize,
    pub city: String,
    pub reason: String,
}

/// Result of a full run
#[derive(Debug, Default)]
pub struct EnrichmentReport {
    pub records: Vec<EnrichedRecord>,
    pub skipped: Vec<SkippedRecord>,
}

impl EnrichmentReport {
    /// Rows written with at least one failed step
    #[must_use]
    pub fn partial_count(&self) -> usize {
        self.records.iter().filter(|r| r.has_errors()).count()
    }
}

/// Sequential enrichment over a geocoder, a weather provider and an FX converter
pub struct EnrichmentPipeline<G, W, F> {
    geocoder: G,
    weather: W,
    fx: F,
    pacing_delay: Duration,
}

impl<G, W, F> EnrichmentPipeline<G, W, F>
where
    G: Geocoder,
    W: CurrentWeatherProvider,
    F: CurrencyConverter,
{
    pub fn new(geocoder: G, weather: W, fx: F) -> Self {
        Self {
            geocoder,
            weather,
            fx,
            pacing_delay: Duration::ZERO,
        }
    }

    /// Pause applied after every record, skipped ones included
    #[must_use]
    pub fn with_pacing_delay(mut self, delay: Duration) -> Self {
        self.pacing_delay = delay;
        self
    }

    /// Enrich every expense in order. Never fails: per-record problems are
    /// either recorded on the row or reported in `skipped`.
    pub async fn run(&self, expenses: &[ExpenseRecord]) -> EnrichmentReport {
        let mut report = EnrichmentReport::default();
        info!("Enriching {} expense records", expenses.len());

        for (index, expense) in expenses.iter().enumerate() {
            let row = index + 1;

            match self.enrich_record(expense).await {
                Ok(record) => {
                    if record.has_errors() {
                        warn!("Row {} ({}) enriched with errors: {}", row, expense.city, record.errors);
                    }
                    report.records.push(record);
                }
                Err(error) => {
                    let reason = step_error(Step::Geocode, &error);
                    warn!("Skipping row {} ({}): {}", row, expense.city, reason);
                    report.skipped.push(SkippedRecord {
                        row,
                        city: expense.city.clone(),
                        reason,
                    });
                }
            }

            if !self.pacing_delay.is_zero() {
                tokio::time::sleep(self.pacing_delay).await;
            }
        }

        info!(
            "Enrichment finished: {} written ({} with errors), {} skipped",
            report.records.len(),
            report.partial_count(),
            report.skipped.len()
        );
        report
    }

    /// Enrich a single expense. `Err` means geocoding failed and the record
    /// must be dropped.
    #[instrument(skip(self, expense), fields(city = %expense.city, country = %expense.country_code))]
    pub async fn enrich_record(
        &self,
        expense: &ExpenseRecord,
    ) -> Result<EnrichedRecord, EnricherError> {
        let location = self
            .geocoder
            .geocode(&expense.city, &expense.country_code)
            .await?;
        debug!("Geocoded to {}", location.format_coordinates());

        let (weather, fx) = join(
            self.weather
                .current_weather(location.latitude, location.longitude),
            self.fx
                .convert_to_usd(&expense.local_currency, expense.amount),
        )
        .await;

        Ok(assemble(expense, &location, weather, fx, Utc::now()))
    }
}

/// Merge an expense with its lookup results into one output row
#[must_use]
pub fn assemble(
    expense: &ExpenseRecord,
    location: &Location,
    weather: Result<CurrentConditions, EnricherError>,
    fx: Result<FxConversion, EnricherError>,
    retrieved_at: DateTime<Utc>,
) -> EnrichedRecord {
    let mut record = EnrichedRecord::from_expense(expense, retrieved_at);
    let mut errors = Vec::new();

    record.latitude = Some(location.latitude);
    record.longitude = Some(location.longitude);

    match weather {
        Ok(conditions) => {
            record.temperature_c = Some(conditions.temperature);
            record.windspeed_m_s = Some(conditions.wind_speed);
        }
        Err(error) => errors.push(step_error(Step::Weather, &error)),
    }

    match fx {
        Ok(conversion) => {
            record.fx_rate_to_usd = Some(conversion.rate);
            record.amount_usd = Some(conversion.converted_amount);
        }
        Err(error) => errors.push(step_error(Step::Fx, &error)),
    }

    record.errors = errors.join(ERROR_SEPARATOR);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::ToPrimitive;
    use std::collections::HashMap;
    use std::str::FromStr;

    struct StaticGeocoder(HashMap<&'static str, (f64, f64)>);

    #[async_trait]
    impl Geocoder for StaticGeocoder {
        async fn geocode(&self, city: &str, _country: &str) -> Result<Location, EnricherError> {
            self.0
                .get(city)
                .map(|(lat, lon)| Location::new(*lat, *lon, city.to_string()))
                .ok_or_else(|| EnricherError::not_found("No geocode results"))
        }
    }

    /// Fails for coordinates whose latitude is negative
    struct NorthernWeather;

    #[async_trait]
    impl CurrentWeatherProvider for NorthernWeather {
        async fn current_weather(
            &self,
            latitude: f64,
            _longitude: f64,
        ) -> Result<CurrentConditions, EnricherError> {
            if latitude < 0.0 {
                return Err(EnricherError::http("Open-Meteo forecast", 500));
            }
            Ok(CurrentConditions {
                temperature: 20.5,
                wind_speed: 4.0,
            })
        }
    }

    /// Knows EUR only, reports the converted amount without a rate
    struct EuroOnly;

    #[async_trait]
    impl CurrencyConverter for EuroOnly {
        async fn convert_to_usd(
            &self,
            currency: &str,
            amount: Decimal,
        ) -> Result<FxConversion, EnricherError> {
            if currency != "EUR" {
                return Err(EnricherError::conversion(r#"{"success":false}"#));
            }
            let body = serde_json::json!({ "result": 1.2 * amount.to_f64().unwrap() });
            crate::exchange_rate::derive_conversion(&body, amount)
        }
    }

    fn pipeline() -> EnrichmentPipeline<StaticGeocoder, NorthernWeather, EuroOnly> {
        let cities = HashMap::from([("Berlin", (52.52, 13.41)), ("Sydney", (-33.87, 151.21))]);
        EnrichmentPipeline::new(StaticGeocoder(cities), NorthernWeather, EuroOnly)
    }

    fn expense(city: &str, currency: &str, amount: &str) -> ExpenseRecord {
        ExpenseRecord {
            city: city.to_string(),
            country_code: "XX".to_string(),
            local_currency: currency.to_string(),
            amount: Decimal::from_str(amount).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_geocode_failures_are_dropped() {
        let input = vec![
            expense("Berlin", "EUR", "10"),
            expense("Atlantis", "EUR", "10"),
            expense("Sydney", "AUD", "10"),
        ];
        let report = pipeline().run(&input).await;

        assert_eq!(report.records.len(), 2);
        assert!(report.records.len() <= input.len());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].row, 2);
        assert_eq!(report.skipped[0].reason, "geocode: Not found: No geocode results");
        assert_eq!(report.records[0].city, "Berlin");
        assert_eq!(report.records[1].city, "Sydney");
    }

    #[tokio::test]
    async fn test_clean_record_has_every_field() {
        let report = pipeline().run(&[expense("Berlin", "EUR", "100")]).await;
        let row = &report.records[0];

        assert_eq!(row.latitude, Some(52.52));
        assert_eq!(row.longitude, Some(13.41));
        assert_eq!(row.temperature_c, Some(20.5));
        assert_eq!(row.windspeed_m_s, Some(4.0));
        assert!((row.fx_rate_to_usd.unwrap() - 1.2).abs() < 1e-9);
        assert!((row.amount_usd.unwrap() - 120.0).abs() < 1e-9);
        assert_eq!(row.errors, "");
        assert_eq!(report.partial_count(), 0);
    }

    #[tokio::test]
    async fn test_weather_and_fx_failures_keep_the_row() {
        let report = pipeline().run(&[expense("Sydney", "AUD", "50")]).await;
        let row = &report.records[0];

        assert_eq!(row.latitude, Some(-33.87));
        assert_eq!(row.temperature_c, None);
        assert_eq!(row.windspeed_m_s, None);
        assert_eq!(row.fx_rate_to_usd, None);
        assert_eq!(row.amount_usd, None);
        assert_eq!(
            row.errors,
            "weather: Open-Meteo forecast returned HTTP 500; fx: FX conversion failed: {\"success\":false}"
        );
    }

    #[tokio::test]
    async fn test_weather_failure_alone() {
        let pipeline = pipeline();
        let row = pipeline
            .enrich_record(&expense("Sydney", "EUR", "10"))
            .await
            .unwrap();
        assert!(row.errors.starts_with("weather: "));
        assert!(!row.errors.contains("fx:"));
        assert!(row.amount_usd.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_delay_applies_to_every_record() {
        let pipeline = pipeline().with_pacing_delay(Duration::from_millis(500));
        let input = vec![
            expense("Berlin", "EUR", "1"),
            expense("Atlantis", "EUR", "1"),
            expense("Sydney", "EUR", "1"),
        ];

        let start = tokio::time::Instant::now();
        let report = pipeline.run(&input).await;

        assert_eq!(report.records.len() + report.skipped.len(), 3);
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_runs_are_identical_apart_from_timestamp() {
        let input = vec![expense("Berlin", "EUR", "12.34"), expense("Sydney", "GBP", "5")];
        let first = pipeline().run(&input).await.records;
        let second = pipeline().run(&input).await.records;

        let strip = |rows: Vec<EnrichedRecord>| {
            rows.into_iter()
                .map(|mut r| {
                    r.retrieved_at = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
                    r
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(strip(first), strip(second));
    }

    #[test]
    fn test_assemble_sets_timestamp_and_coordinates() {
        let at = DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let location = Location::new(1.5, 2.5, "Somewhere".into());
        let record = assemble(
            &expense("Somewhere", "EUR", "3"),
            &location,
            Err(EnricherError::network("Open-Meteo forecast", "timed out")),
            Ok(FxConversion {
                rate: 2.0,
                converted_amount: 6.0,
            }),
            at,
        );

        assert_eq!(record.retrieved_at, at);
        assert_eq!(record.latitude, Some(1.5));
        assert_eq!(record.errors, "weather: Open-Meteo forecast unreachable: timed out");
        assert_eq!(record.amount_usd, Some(6.0));
    }
}
