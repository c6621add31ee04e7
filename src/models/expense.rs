//! Expense rows before and after enrichment

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One row of the input table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub city: String,
    /// ISO 3166-1 alpha-2 country code
    pub country_code: String,
    /// ISO 4217 currency code of `amount`
    pub local_currency: String,
    pub amount: Decimal,
}

/// One row of the output table.
///
/// Field order is the column order of the written CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub city: String,
    pub country_code: String,
    pub local_currency: String,
    pub amount: Decimal,
    pub fx_rate_to_usd: Option<f64>,
    pub amount_usd: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub temperature_c: Option<f64>,
    pub windspeed_m_s: Option<f64>,
    pub retrieved_at: DateTime<Utc>,
    /// Per-step error messages joined by `"; "`, empty when every step succeeded
    pub errors: String,
}

impl EnrichedRecord {
    /// Start a row from its source expense; every lookup field is empty
    #[must_use]
    pub fn from_expense(expense: &ExpenseRecord, retrieved_at: DateTime<Utc>) -> Self {
        Self {
            city: expense.city.clone(),
            country_code: expense.country_code.clone(),
            local_currency: expense.local_currency.clone(),
            amount: expense.amount,
            fx_rate_to_usd: None,
            amount_usd: None,
            latitude: None,
            longitude: None,
            temperature_c: None,
            windspeed_m_s: None,
            retrieved_at,
            errors: String::new(),
        }
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
