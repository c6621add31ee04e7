//! Reading expense tables and writing enriched tables

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use csv::{ReaderBuilder, Trim, WriterBuilder};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::EnricherError;
use crate::models::{EnrichedRecord, ExpenseRecord};

/// Output header, in column order
pub const OUTPUT_COLUMNS: [&str; 12] = [
    "city",
    "country_code",
    "local_currency",
    "amount",
    "fx_rate_to_usd",
    "amount_usd",
    "latitude",
    "longitude",
    "temperature_c",
    "windspeed_m_s",
    "retrieved_at",
    "errors",
];

/// Input row before the amount is validated
#[derive(Debug, Deserialize)]
struct RawExpense {
    city: String,
    country_code: String,
    local_currency: String,
    amount: String,
}

impl RawExpense {
    fn into_expense(self, row: usize) -> Result<ExpenseRecord, EnricherError> {
        let amount = parse_amount(&self.amount).ok_or_else(|| {
            EnricherError::invalid_input(format!(
                "row {row} ({}): amount '{}' is not a decimal number",
                self.city, self.amount
            ))
        })?;

        Ok(ExpenseRecord {
            city: self.city,
            country_code: self.country_code,
            local_currency: self.local_currency,
            amount,
        })
    }
}

/// Accepts plain (`12.50`) and scientific (`1.25e1`) notation
fn parse_amount(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Read every expense from a CSV file with a header row.
///
/// A malformed amount aborts the read and names the offending data row.
pub fn read_expenses(path: &Path) -> Result<Vec<ExpenseRecord>, EnricherError> {
    let file = File::open(path)?;
    let expenses = read_expenses_from(file)?;
    debug!("Read {} expenses from {}", expenses.len(), path.display());
    Ok(expenses)
}

pub fn read_expenses_from<R: Read>(reader: R) -> Result<Vec<ExpenseRecord>, EnricherError> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

    reader
        .deserialize::<RawExpense>()
        .enumerate()
        .map(|(index, raw)| raw?.into_expense(index + 1))
        .collect()
}

/// Write enriched rows, header first, even when there are no rows
pub fn write_enriched(path: &Path, records: &[EnrichedRecord]) -> Result<(), EnricherError> {
    let file = File::create(path)?;
    write_enriched_to(file, records)?;
    debug!("Wrote {} enriched rows to {}", records.len(), path.display());
    Ok(())
}

pub fn write_enriched_to<W: Write>(writer: W, records: &[EnrichedRecord]) -> Result<(), EnricherError> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);

    writer.write_record(OUTPUT_COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    const INPUT: &str = "\
city,country_code,local_currency,amount,note
Paris,FR,EUR,100.50,dinner
 Tokyo , JP , JPY , 2500 ,
";

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn test_read_expenses_trims_and_ignores_extra_columns() {
        let expenses = read_expenses_from(INPUT.as_bytes()).unwrap();
        assert_eq!(expenses.len(), 2);
        assert_eq!(expenses[0].city, "Paris");
        assert_eq!(expenses[0].amount, dec("100.50"));
        assert_eq!(expenses[1].city, "Tokyo");
        assert_eq!(expenses[1].local_currency, "JPY");
        assert_eq!(expenses[1].amount, dec("2500"));
    }

    #[test]
    fn test_malformed_amount_aborts_with_row_number() {
        let input = "city,country_code,local_currency,amount\nOslo,NO,NOK,12\nRome,IT,EUR,twelve\n";
        let err = read_expenses_from(input.as_bytes()).unwrap_err();
        assert!(matches!(err, EnricherError::InvalidInput { .. }));
        assert!(err.to_string().contains("row 2 (Rome)"));
        assert!(err.to_string().contains("'twelve'"));
    }

    #[test]
    fn test_scientific_amount() {
        assert_eq!(parse_amount("1.25e1"), Some(dec("12.5")));
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_missing_column_is_csv_error() {
        let input = "city,country_code,amount\nOslo,NO,12\n";
        let err = read_expenses_from(input.as_bytes()).unwrap_err();
        assert!(matches!(err, EnricherError::Csv { .. }));
    }

    #[test]
    fn test_write_enriched_column_order_and_nulls() {
        let at = DateTime::parse_from_rfc3339("2025-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let expense = ExpenseRecord {
            city: "Paris".into(),
            country_code: "FR".into(),
            local_currency: "EUR".into(),
            amount: dec("100.50"),
        };
        let mut record = EnrichedRecord::from_expense(&expense, at);
        record.latitude = Some(48.85);
        record.longitude = Some(2.35);
        record.fx_rate_to_usd = Some(1.25);
        record.amount_usd = Some(125.625);
        record.errors = "weather: Open-Meteo forecast returned HTTP 502".into();

        let mut out = Vec::new();
        write_enriched_to(&mut out, &[record]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();

        assert_eq!(lines.next().unwrap(), OUTPUT_COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "Paris,FR,EUR,100.50,1.25,125.625,48.85,2.35,,,2025-01-02T03:04:05Z,weather: Open-Meteo forecast returned HTTP 502"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_write_enriched_header_only_when_empty() {
        let mut out = Vec::new();
        write_enriched_to(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim_end(), OUTPUT_COLUMNS.join(","));
    }

    #[test]
    fn test_files_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("expenses.csv");
        std::fs::write(&input, INPUT).unwrap();

        let expenses = read_expenses(&input).unwrap();
        let rows: Vec<EnrichedRecord> = expenses
            .iter()
            .map(|e| EnrichedRecord::from_expense(e, Utc::now()))
            .collect();

        let output = dir.path().join("enriched.csv");
        write_enriched(&output, &rows).unwrap();

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let back: Vec<EnrichedRecord> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[1].amount, dec("2500"));
        assert_eq!(back[1].temperature_c, None);
    }

    #[test]
    fn test_missing_input_file_is_io_error() {
        let err = read_expenses(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, EnricherError::Io { .. }));
    }
}
