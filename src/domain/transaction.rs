//! Ledger transactions and their derived running fields.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use super::currency::Currency;
use super::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Buy,
    Sell,
    Dividend,
}

impl TransactionType {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "Buy",
            TransactionType::Sell => "Sell",
            TransactionType::Dividend => "Div",
        }
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Buy" | "BUY" | "buy" => Ok(TransactionType::Buy),
            "Sell" | "SELL" | "sell" => Ok(TransactionType::Sell),
            "Div" | "DIV" | "div" | "Dividend" | "DIVIDEND" | "dividend" => {
                Ok(TransactionType::Dividend)
            }
            _ => Err(LedgerError::InvalidType {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw ledger event as recorded. Immutable once appended.
///
/// For dividends `price` carries the cash amount received and `quantity` is
/// informational only.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub transaction_no: i64,
    pub date: NaiveDate,
    pub transaction_type: TransactionType,
    pub ticker_id: i64,
    pub broker: String,
    pub currency: Currency,
    pub exchange_rate: Decimal,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fees: Decimal,
}

impl Transaction {
    /// Checks the raw numeric fields. Replay rejects anything that fails here.
    pub fn validate(&self) -> Result<(), LedgerError> {
        let reason = if self.quantity < Decimal::ZERO {
            Some("quantity must not be negative")
        } else if self.price < Decimal::ZERO {
            Some("price must not be negative")
        } else if self.fees < Decimal::ZERO {
            Some("fees must not be negative")
        } else if self.exchange_rate <= Decimal::ZERO {
            Some("exchange rate must be positive")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(LedgerError::InvalidTransaction {
                transaction_no: self.transaction_no,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Running totals produced by replay, stored alongside each transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DerivedFields {
    pub cumulative_units: Decimal,
    pub cumulative_cost: Decimal,
    /// Cost removed from the basis by this transaction; zero unless it is a sell.
    pub cost_of_units_sold: Decimal,
    pub realized_gains: Decimal,
    pub dividends_collected: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub transaction: Transaction,
    pub derived: DerivedFields,
}
