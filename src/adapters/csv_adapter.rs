//! CSV transaction import adapter.
//!
//! Expects a header row naming the columns below; column order is free and
//! extra columns are ignored.

use crate::domain::currency::Currency;
use crate::domain::error::LedgerError;
use crate::domain::settings::DEFAULT_DATE_FORMAT;
use crate::domain::transaction::TransactionType;
use crate::ports::import_port::{ImportPort, ImportRecord};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

pub const COLUMNS: [&str; 11] = [
    "transaction_no",
    "date",
    "type",
    "symbol",
    "exchange",
    "currency",
    "exchange_rate",
    "quantity",
    "price",
    "fees",
    "broker",
];

enum Source {
    File(PathBuf),
    Text(String),
}

pub struct CsvAdapter {
    source: Source,
    date_format: String,
}

impl CsvAdapter {
    pub fn from_path(path: PathBuf) -> Self {
        Self {
            source: Source::File(path),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    pub fn from_string(content: &str) -> Self {
        Self {
            source: Source::Text(content.to_string()),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    pub fn with_date_format(mut self, date_format: &str) -> Self {
        self.date_format = date_format.to_string();
        self
    }

    fn content(&self) -> Result<String, LedgerError> {
        match &self.source {
            Source::File(path) => fs::read_to_string(path).map_err(|e| LedgerError::Import {
                row: 0,
                reason: format!("failed to read {}: {}", path.display(), e),
            }),
            Source::Text(text) => Ok(text.clone()),
        }
    }
}

/// Header positions of the required columns, in `COLUMNS` order.
fn column_positions(headers: &csv::StringRecord) -> Result<[usize; 11], LedgerError> {
    let mut positions = [0usize; 11];
    for (slot, name) in positions.iter_mut().zip(COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| LedgerError::Import {
                row: 0,
                reason: format!("missing {name} column"),
            })?;
    }
    Ok(positions)
}

fn field<'r>(
    record: &'r csv::StringRecord,
    pos: usize,
    name: &str,
    row: usize,
) -> Result<&'r str, LedgerError> {
    record
        .get(pos)
        .map(str::trim)
        .ok_or_else(|| LedgerError::Import {
            row,
            reason: format!("missing {name} value"),
        })
}

fn parse_field<T: FromStr>(
    record: &csv::StringRecord,
    pos: usize,
    name: &str,
    row: usize,
) -> Result<T, LedgerError>
where
    T::Err: std::fmt::Display,
{
    let raw = field(record, pos, name, row)?;
    raw.parse().map_err(|e: T::Err| LedgerError::Import {
        row,
        reason: format!("invalid {name} '{raw}': {e}"),
    })
}

impl ImportPort for CsvAdapter {
    fn read_records(&self) -> Result<Vec<ImportRecord>, LedgerError> {
        let content = self.content()?;
        let mut rdr = csv::Reader::from_reader(content.as_bytes());

        let headers = rdr.headers().map_err(|e| LedgerError::Import {
            row: 0,
            reason: format!("CSV header error: {}", e),
        })?;
        let [
            no_col,
            date_col,
            type_col,
            symbol_col,
            exchange_col,
            currency_col,
            rate_col,
            quantity_col,
            price_col,
            fees_col,
            broker_col,
        ] = column_positions(headers)?;

        let mut records = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let row = idx + 1;
            let record = result.map_err(|e| LedgerError::Import {
                row,
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = field(&record, date_col, "date", row)?;
            let date = NaiveDate::parse_from_str(date_str, &self.date_format).map_err(|e| {
                LedgerError::Import {
                    row,
                    reason: format!("invalid date '{}': {}", date_str, e),
                }
            })?;

            // Unknown types surface as InvalidType rather than a generic import error.
            let transaction_type = field(&record, type_col, "type", row)?.parse::<TransactionType>()?;
            let currency = field(&record, currency_col, "currency", row)?.parse::<Currency>()?;

            let symbol = field(&record, symbol_col, "symbol", row)?;
            if symbol.is_empty() {
                return Err(LedgerError::Import {
                    row,
                    reason: "empty symbol".into(),
                });
            }

            let rate_raw = field(&record, rate_col, "exchange_rate", row)?;
            let exchange_rate = if rate_raw.is_empty() {
                Decimal::ONE
            } else {
                parse_field(&record, rate_col, "exchange_rate", row)?
            };

            let fees_raw = field(&record, fees_col, "fees", row)?;
            let fees = if fees_raw.is_empty() {
                Decimal::ZERO
            } else {
                parse_field(&record, fees_col, "fees", row)?
            };

            records.push(ImportRecord {
                transaction_no: parse_field(&record, no_col, "transaction_no", row)?,
                date,
                transaction_type,
                symbol: symbol.to_string(),
                exchange: field(&record, exchange_col, "exchange", row)?.to_string(),
                currency,
                exchange_rate,
                quantity: parse_field(&record, quantity_col, "quantity", row)?,
                price: parse_field(&record, price_col, "price", row)?,
                fees,
                broker: field(&record, broker_col, "broker", row)?.to_string(),
            });
        }

        records.sort_by_key(|r| r.transaction_no);
        Ok(records)
    }
}
