//! exchangerate.host client for converting expense amounts to USD

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::http;
use crate::models::FxConversion;
use crate::pipeline::CurrencyConverter;
use crate::{EndpointsConfig, EnricherError};

const SERVICE: &str = "exchangerate.host";

/// Every conversion targets this currency
pub const TARGET_CURRENCY: &str = "USD";

/// Client for the `/convert` endpoint.
///
/// The access key is optional; without one the call is still attempted and
/// whatever the upstream answers is surfaced.
#[derive(Clone)]
pub struct ExchangeRateClient {
    client: ClientWithMiddleware,
    convert_url: String,
    api_key: Option<String>,
}

impl ExchangeRateClient {
    #[must_use]
    pub fn new(
        client: ClientWithMiddleware,
        endpoints: &EndpointsConfig,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            convert_url: endpoints.exchange_url.clone(),
            api_key,
        }
    }

    #[instrument(skip(self), fields(authenticated = self.api_key.is_some()))]
    pub async fn convert(
        &self,
        from_currency: &str,
        amount: Decimal,
    ) -> Result<FxConversion, EnricherError> {
        let mut params = vec![
            ("from", from_currency.to_string()),
            ("to", TARGET_CURRENCY.to_string()),
            ("amount", amount.to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("access_key", key.clone()));
        }
        let url = http::endpoint(&self.convert_url, &params)?;

        let body: Value = http::get(&self.client, SERVICE, url)
            .await?
            .success_json()
            .await?;

        let conversion = derive_conversion(&body, amount)?;
        debug!(
            "Converted {} {} to {:.4} {} at {}",
            amount, from_currency, conversion.converted_amount, TARGET_CURRENCY, conversion.rate
        );
        Ok(conversion)
    }
}

#[async_trait]
impl CurrencyConverter for ExchangeRateClient {
    async fn convert_to_usd(
        &self,
        currency: &str,
        amount: Decimal,
    ) -> Result<FxConversion, EnricherError> {
        self.convert(currency, amount).await
    }
}

/// Pull the converted amount and effective rate out of a `/convert` body.
///
/// `result` is the converted amount. The rate comes from `info.rate` when
/// present, otherwise it is derived as `result / amount`.
pub fn derive_conversion(body: &Value, amount: Decimal) -> Result<FxConversion, EnricherError> {
    let converted = body.get("result").and_then(Value::as_f64);
    let explicit_rate = body
        .get("info")
        .and_then(|info| info.get("rate"))
        .and_then(Value::as_f64);

    let rate = explicit_rate.or_else(|| {
        let converted = converted?;
        let amount = amount.to_f64().filter(|a| *a != 0.0)?;
        Some(converted / amount)
    });

    match (converted, rate) {
        (Some(converted_amount), Some(rate)) => Ok(FxConversion {
            rate,
            converted_amount,
        }),
        _ => Err(EnricherError::conversion(body.to_string())),
    }
}
