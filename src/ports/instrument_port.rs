//! Ticker and asset storage port trait.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::asset::Asset;
use crate::domain::error::LedgerError;
use crate::domain::ticker::Ticker;

pub trait InstrumentRepository {
    fn ticker(&self, id: i64) -> Result<Option<Ticker>, LedgerError>;

    fn ticker_by_symbol(&self, symbol: &str) -> Result<Option<Ticker>, LedgerError>;

    /// Insert a new ticker and return its id. Symbols are unique.
    fn insert_ticker(&self, ticker: &Ticker) -> Result<i64, LedgerError>;

    fn update_ticker_price(
        &self,
        ticker_id: i64,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    fn asset(&self, id: i64) -> Result<Option<Asset>, LedgerError>;

    fn asset_by_name(&self, name: &str) -> Result<Option<Asset>, LedgerError>;

    /// Insert a new asset and return its id. Names are unique.
    fn insert_asset(&self, asset: &Asset) -> Result<i64, LedgerError>;

    /// Link a ticker to its owning asset, honoring the per-asset ticker limit.
    fn attach_ticker(&self, asset_id: i64, ticker_id: i64) -> Result<(), LedgerError>;
}
