//! Quoted instruments.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::currency::Currency;
use super::error::LedgerError;

/// A symbol quoted on an exchange in one currency.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticker {
    /// Storage id, `None` until persisted.
    pub id: Option<i64>,
    pub symbol: String,
    pub exchange: String,
    pub currency: Currency,
    pub last_price: Option<Decimal>,
    pub last_price_updated_at: Option<DateTime<Utc>>,
    pub asset_id: Option<i64>,
}

impl Ticker {
    pub fn new(symbol: &str, exchange: &str, currency: Currency) -> Self {
        Ticker {
            id: None,
            symbol: symbol.trim().to_string(),
            exchange: exchange.trim().to_string(),
            currency,
            last_price: None,
            last_price_updated_at: None,
            asset_id: None,
        }
    }

    /// Record a new last price. Timestamps may repeat but never go backwards.
    pub fn update_price(&mut self, price: Decimal, at: DateTime<Utc>) -> Result<(), LedgerError> {
        if price < Decimal::ZERO {
            return Err(LedgerError::InvalidPrice {
                symbol: self.symbol.clone(),
                price,
            });
        }
        if let Some(previous) = self.last_price_updated_at {
            if at < previous {
                return Err(LedgerError::StalePrice {
                    symbol: self.symbol.clone(),
                    previous: previous.to_rfc3339(),
                    attempted: at.to_rfc3339(),
                });
            }
        }
        self.last_price = Some(price);
        self.last_price_updated_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample() -> Ticker {
        Ticker::new(" AAPL ", "NASDAQ", "USD".parse().unwrap())
    }

    #[test]
    fn new_trims_and_starts_unpriced() {
        let t = sample();
        assert_eq!(t.symbol, "AAPL");
        assert!(t.last_price.is_none());
        assert!(t.id.is_none());
    }

    #[test]
    fn update_price_moves_forward() {
        let mut t = sample();
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        t.update_price(dec!(190.5), first).unwrap();
        t.update_price(dec!(191), second).unwrap();
        assert_eq!(t.last_price, Some(dec!(191)));
        assert_eq!(t.last_price_updated_at, Some(second));
    }

    #[test]
    fn update_price_same_timestamp_allowed() {
        let mut t = sample();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        t.update_price(dec!(1), at).unwrap();
        assert!(t.update_price(dec!(2), at).is_ok());
    }

    #[test]
    fn update_price_rejects_older_timestamp() {
        let mut t = sample();
        let newer = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        t.update_price(dec!(1), newer).unwrap();
        match t.update_price(dec!(2), older) {
            Err(LedgerError::StalePrice { symbol, .. }) => assert_eq!(symbol, "AAPL"),
            other => panic!("expected StalePrice, got {other:?}"),
        }
        assert_eq!(t.last_price, Some(dec!(1)));
    }

    #[test]
    fn update_price_rejects_negative() {
        let mut t = sample();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            t.update_price(dec!(-1), at),
            Err(LedgerError::InvalidPrice { .. })
        ));
    }
}
