//! Transaction import port trait.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::currency::Currency;
use crate::domain::error::LedgerError;
use crate::domain::transaction::TransactionType;

/// One parsed import row. The ticker is named by symbol and resolved (or
/// created) during import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    pub transaction_no: i64,
    pub date: NaiveDate,
    pub transaction_type: TransactionType,
    pub symbol: String,
    pub exchange: String,
    pub currency: Currency,
    pub exchange_rate: Decimal,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fees: Decimal,
    pub broker: String,
}

pub trait ImportPort {
    fn read_records(&self) -> Result<Vec<ImportRecord>, LedgerError>;
}
