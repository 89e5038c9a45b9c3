//! Domain error types.

use rust_decimal::Decimal;

/// Top-level error type for tickerledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("transaction {current} is out of order: previous transaction was {previous}")]
    OutOfOrder { previous: i64, current: i64 },

    #[error("transaction {transaction_no} sells {requested} units but only {held} are held")]
    Oversell {
        transaction_no: i64,
        requested: Decimal,
        held: Decimal,
    },

    #[error("invalid transaction type '{value}'")]
    InvalidType { value: String },

    #[error("invalid transaction {transaction_no}: {reason}")]
    InvalidTransaction { transaction_no: i64, reason: String },

    #[error("invalid currency code '{value}'")]
    InvalidCurrency { value: String },

    #[error("invalid ISIN '{value}'")]
    InvalidIsin { value: String },

    #[error("invalid asset type '{value}'")]
    InvalidAssetType { value: String },

    #[error("asset {asset} already has {limit} tickers")]
    TooManyTickers { asset: String, limit: usize },

    #[error("price update for {symbol} at {attempted} precedes stored timestamp {previous}")]
    StalePrice {
        symbol: String,
        previous: String,
        attempted: String,
    },

    #[error("invalid price {price} for {symbol}")]
    InvalidPrice { symbol: String, price: Decimal },

    #[error("valuation of {symbol} overflows")]
    ValuationOverflow { symbol: String },

    #[error("unknown ticker {symbol}")]
    UnknownTicker { symbol: String },

    #[error("unknown scope {scope}")]
    UnknownScope { scope: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("import error at row {row}: {reason}")]
    Import { row: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
