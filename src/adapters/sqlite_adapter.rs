//! SQLite repository adapter.
//!
//! Monetary columns are stored as decimal TEXT so values survive a round trip
//! unchanged; parsing to `Decimal` happens only here.

use crate::domain::asset::{Asset, AssetType};
use crate::domain::currency::Currency;
use crate::domain::error::LedgerError;
use crate::domain::scope::{Scope, ScopeKind};
use crate::domain::settings::LedgerSettings;
use crate::domain::ticker::Ticker;
use crate::domain::transaction::{DerivedFields, LedgerEntry, Transaction, TransactionType};
use crate::ports::config_port::ConfigPort;
use crate::ports::instrument_port::InstrumentRepository;
use crate::ports::transaction_port::TransactionRepository;
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use std::str::FromStr;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS assets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        asset_type TEXT,
        sector TEXT,
        industry TEXT,
        isin TEXT,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS tickers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL UNIQUE,
        exchange TEXT NOT NULL,
        currency TEXT NOT NULL,
        last_price TEXT,
        last_price_updated_at TEXT,
        asset_id INTEGER REFERENCES assets(id),
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS transactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        transaction_no INTEGER NOT NULL UNIQUE,
        date TEXT NOT NULL,
        transaction_type TEXT NOT NULL,
        ticker_id INTEGER NOT NULL REFERENCES tickers(id),
        broker TEXT NOT NULL,
        currency TEXT NOT NULL,
        exchange_rate TEXT NOT NULL,
        quantity TEXT NOT NULL,
        price TEXT NOT NULL,
        fees TEXT NOT NULL,
        cumulative_units TEXT,
        cumulative_cost TEXT,
        cost_of_units_sold TEXT,
        realized_gains TEXT,
        dividends_collected TEXT,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_ticker ON transactions(ticker_id, transaction_no);
    CREATE INDEX IF NOT EXISTS idx_tickers_asset ON tickers(asset_id);";

const TRANSACTION_COLUMNS: &str = "t.transaction_no, t.date, t.transaction_type, t.ticker_id, t.broker, \
     t.currency, t.exchange_rate, t.quantity, t.price, t.fees";

const DERIVED_COLUMNS: &str = "t.cumulative_units, t.cumulative_cost, t.cost_of_units_sold, \
     t.realized_gains, t.dividends_collected";

const TICKER_COLUMNS: &str =
    "id, symbol, exchange, currency, last_price, last_price_updated_at, asset_id";

fn pool_err(e: r2d2::Error) -> LedgerError {
    LedgerError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> LedgerError {
    LedgerError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_err(column: &str, value: &str, reason: impl std::fmt::Display) -> LedgerError {
    LedgerError::DatabaseQuery {
        reason: format!("invalid {column} '{value}': {reason}"),
    }
}

fn parse_decimal(column: &str, value: &str) -> Result<Decimal, LedgerError> {
    Decimal::from_str(value).map_err(|e| conversion_err(column, value, e))
}

fn parse_optional_decimal(column: &str, value: Option<String>) -> Result<Option<Decimal>, LedgerError> {
    value.map(|v| parse_decimal(column, &v)).transpose()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err("last_price_updated_at", value, e))
}

/// Text columns of a transaction row as read, before domain parsing.
struct RawTransaction {
    transaction_no: i64,
    date: String,
    transaction_type: String,
    ticker_id: i64,
    broker: String,
    currency: String,
    exchange_rate: String,
    quantity: String,
    price: String,
    fees: String,
}

impl RawTransaction {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawTransaction {
            transaction_no: row.get(0)?,
            date: row.get(1)?,
            transaction_type: row.get(2)?,
            ticker_id: row.get(3)?,
            broker: row.get(4)?,
            currency: row.get(5)?,
            exchange_rate: row.get(6)?,
            quantity: row.get(7)?,
            price: row.get(8)?,
            fees: row.get(9)?,
        })
    }

    fn into_transaction(self) -> Result<Transaction, LedgerError> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|e| conversion_err("date", &self.date, e))?;
        Ok(Transaction {
            transaction_no: self.transaction_no,
            date,
            transaction_type: TransactionType::from_str(&self.transaction_type)?,
            ticker_id: self.ticker_id,
            broker: self.broker,
            currency: Currency::from_str(&self.currency)?,
            exchange_rate: parse_decimal("exchange_rate", &self.exchange_rate)?,
            quantity: parse_decimal("quantity", &self.quantity)?,
            price: parse_decimal("price", &self.price)?,
            fees: parse_decimal("fees", &self.fees)?,
        })
    }
}

struct RawTicker {
    id: i64,
    symbol: String,
    exchange: String,
    currency: String,
    last_price: Option<String>,
    last_price_updated_at: Option<String>,
    asset_id: Option<i64>,
}

impl RawTicker {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawTicker {
            id: row.get(0)?,
            symbol: row.get(1)?,
            exchange: row.get(2)?,
            currency: row.get(3)?,
            last_price: row.get(4)?,
            last_price_updated_at: row.get(5)?,
            asset_id: row.get(6)?,
        })
    }

    fn into_ticker(self) -> Result<Ticker, LedgerError> {
        Ok(Ticker {
            id: Some(self.id),
            symbol: self.symbol,
            exchange: self.exchange,
            currency: Currency::from_str(&self.currency)?,
            last_price: parse_optional_decimal("last_price", self.last_price)?,
            last_price_updated_at: self
                .last_price_updated_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            asset_id: self.asset_id,
        })
    }
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LedgerError> {
        let settings = LedgerSettings::from_config(config)?;
        Self::from_settings(&settings)
    }

    pub fn from_settings(settings: &LedgerSettings) -> Result<Self, LedgerError> {
        let manager = SqliteConnectionManager::file(&settings.sqlite_path)
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(settings.pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, LedgerError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), LedgerError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, LedgerError> {
        self.pool.get().map_err(pool_err)
    }

    fn scope_exists(conn: &Connection, scope: Scope) -> Result<bool, LedgerError> {
        let query = match scope {
            Scope::Ticker(_) => "SELECT EXISTS(SELECT 1 FROM tickers WHERE id = ?1)",
            Scope::Asset(_) => "SELECT EXISTS(SELECT 1 FROM assets WHERE id = ?1)",
        };
        conn.query_row(query, params![scope.id()], |row| row.get(0))
            .map_err(query_err)
    }

    fn scope_filter(scope: Scope) -> &'static str {
        match scope {
            Scope::Ticker(_) => "FROM transactions t WHERE t.ticker_id = ?1",
            Scope::Asset(_) => {
                "FROM transactions t JOIN tickers k ON k.id = t.ticker_id WHERE k.asset_id = ?1"
            }
        }
    }

    fn load_ticker(
        conn: &Connection,
        filter: &str,
        value: &dyn rusqlite::ToSql,
    ) -> Result<Option<Ticker>, LedgerError> {
        let query = format!("SELECT {TICKER_COLUMNS} FROM tickers WHERE {filter} = ?1");
        conn.query_row(&query, params![value], RawTicker::from_row)
            .optional()
            .map_err(query_err)?
            .map(RawTicker::into_ticker)
            .transpose()
    }

    fn load_asset(
        conn: &Connection,
        filter: &str,
        value: &dyn rusqlite::ToSql,
    ) -> Result<Option<Asset>, LedgerError> {
        let query = format!(
            "SELECT id, name, asset_type, sector, industry, isin FROM assets WHERE {filter} = ?1"
        );
        let row = conn
            .query_row(&query, params![value], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })
            .optional()
            .map_err(query_err)?;

        let Some((id, name, asset_type, sector, industry, isin)) = row else {
            return Ok(None);
        };

        let mut asset = Asset::new(&name);
        asset.id = Some(id);
        asset.asset_type = asset_type.as_deref().map(AssetType::from_str).transpose()?;
        asset.sector = sector;
        asset.industry = industry;
        asset.isin = isin;

        let mut stmt = conn
            .prepare("SELECT id FROM tickers WHERE asset_id = ?1 ORDER BY id")
            .map_err(query_err)?;
        let ticker_ids = stmt
            .query_map(params![id], |row| row.get::<_, i64>(0))
            .map_err(query_err)?;
        for ticker_id in ticker_ids {
            asset.attach_ticker(ticker_id.map_err(query_err)?)?;
        }

        Ok(Some(asset))
    }
}

impl TransactionRepository for SqliteAdapter {
    fn load_ordered(&self, scope: Scope) -> Result<Vec<Transaction>, LedgerError> {
        let conn = self.conn()?;
        if !Self::scope_exists(&conn, scope)? {
            return Err(scope.unknown());
        }

        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} {} ORDER BY t.transaction_no ASC",
            Self::scope_filter(scope)
        );
        let mut stmt = conn.prepare(&query).map_err(query_err)?;
        let rows = stmt
            .query_map(params![scope.id()], RawTransaction::from_row)
            .map_err(query_err)?;

        let mut transactions = Vec::new();
        for row in rows {
            transactions.push(row.map_err(query_err)?.into_transaction()?);
        }
        debug!("loaded {} transactions for {}", transactions.len(), scope);
        Ok(transactions)
    }

    fn save_derived(&self, scope: Scope, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for entry in entries {
            let d = &entry.derived;
            let changed = tx
                .execute(
                    "UPDATE transactions
                     SET cumulative_units = ?1, cumulative_cost = ?2, cost_of_units_sold = ?3,
                         realized_gains = ?4, dividends_collected = ?5,
                         updated_at = CURRENT_TIMESTAMP
                     WHERE transaction_no = ?6",
                    params![
                        d.cumulative_units.to_string(),
                        d.cumulative_cost.to_string(),
                        d.cost_of_units_sold.to_string(),
                        d.realized_gains.to_string(),
                        d.dividends_collected.to_string(),
                        entry.transaction.transaction_no
                    ],
                )
                .map_err(query_err)?;
            if changed != 1 {
                // Dropping `tx` rolls back everything written so far.
                return Err(LedgerError::DatabaseQuery {
                    reason: format!(
                        "transaction {} of {} is not stored",
                        entry.transaction.transaction_no, scope
                    ),
                });
            }
        }

        tx.commit().map_err(query_err)?;
        debug!("saved {} derived rows for {}", entries.len(), scope);
        Ok(())
    }

    fn append(&self, transaction: &Transaction) -> Result<bool, LedgerError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO transactions
                 (transaction_no, date, transaction_type, ticker_id, broker, currency,
                  exchange_rate, quantity, price, fees)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    transaction.transaction_no,
                    transaction.date.format("%Y-%m-%d").to_string(),
                    transaction.transaction_type.as_str(),
                    transaction.ticker_id,
                    transaction.broker,
                    transaction.currency.as_str(),
                    transaction.exchange_rate.to_string(),
                    transaction.quantity.to_string(),
                    transaction.price.to_string(),
                    transaction.fees.to_string()
                ],
            )
            .map_err(query_err)?;
        Ok(changed == 1)
    }

    fn contains(&self, transaction_no: i64) -> Result<bool, LedgerError> {
        self.conn()?
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM transactions WHERE transaction_no = ?1)",
                params![transaction_no],
                |row| row.get(0),
            )
            .map_err(query_err)
    }

    fn scopes(&self, kind: ScopeKind) -> Result<Vec<Scope>, LedgerError> {
        let conn = self.conn()?;
        let query = match kind {
            ScopeKind::Ticker => "SELECT DISTINCT ticker_id FROM transactions ORDER BY ticker_id",
            ScopeKind::Asset => {
                "SELECT DISTINCT k.asset_id FROM transactions t
                 JOIN tickers k ON k.id = t.ticker_id
                 WHERE k.asset_id IS NOT NULL ORDER BY k.asset_id"
            }
        };
        let mut stmt = conn.prepare(query).map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(query_err)?;

        let mut scopes = Vec::new();
        for row in rows {
            let id = row.map_err(query_err)?;
            scopes.push(match kind {
                ScopeKind::Ticker => Scope::Ticker(id),
                ScopeKind::Asset => Scope::Asset(id),
            });
        }
        Ok(scopes)
    }

    fn latest_derived(&self, scope: Scope) -> Result<Option<DerivedFields>, LedgerError> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {DERIVED_COLUMNS} {} ORDER BY t.transaction_no DESC LIMIT 1",
            Self::scope_filter(scope)
        );
        let row = conn
            .query_row(&query, params![scope.id()], |row| {
                Ok([
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ])
            })
            .optional()
            .map_err(query_err)?;

        match row {
            Some([Some(units), Some(cost), Some(sold), Some(realized), Some(dividends)]) => {
                Ok(Some(DerivedFields {
                    cumulative_units: parse_decimal("cumulative_units", &units)?,
                    cumulative_cost: parse_decimal("cumulative_cost", &cost)?,
                    cost_of_units_sold: parse_decimal("cost_of_units_sold", &sold)?,
                    realized_gains: parse_decimal("realized_gains", &realized)?,
                    dividends_collected: parse_decimal("dividends_collected", &dividends)?,
                }))
            }
            _ => Ok(None),
        }
    }

    fn clear(&self) -> Result<(), LedgerError> {
        self.conn()?
            .execute("DELETE FROM transactions", [])
            .map_err(query_err)?;
        Ok(())
    }
}

impl InstrumentRepository for SqliteAdapter {
    fn ticker(&self, id: i64) -> Result<Option<Ticker>, LedgerError> {
        Self::load_ticker(&*self.conn()?, "id", &id)
    }

    fn ticker_by_symbol(&self, symbol: &str) -> Result<Option<Ticker>, LedgerError> {
        Self::load_ticker(&*self.conn()?, "symbol", &symbol)
    }

    fn insert_ticker(&self, ticker: &Ticker) -> Result<i64, LedgerError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tickers (symbol, exchange, currency, last_price, last_price_updated_at, asset_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                ticker.symbol,
                ticker.exchange,
                ticker.currency.as_str(),
                ticker.last_price.map(|p| p.to_string()),
                ticker.last_price_updated_at.map(|at| at.to_rfc3339()),
                ticker.asset_id
            ],
        )
        .map_err(query_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn update_ticker_price(
        &self,
        ticker_id: i64,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut ticker =
            Self::load_ticker(&tx, "id", &ticker_id)?.ok_or_else(|| LedgerError::UnknownTicker {
                symbol: format!("#{ticker_id}"),
            })?;
        ticker.update_price(price, at)?;

        tx.execute(
            "UPDATE tickers SET last_price = ?1, last_price_updated_at = ?2,
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?3",
            params![price.to_string(), at.to_rfc3339(), ticker_id],
        )
        .map_err(query_err)?;
        tx.commit().map_err(query_err)
    }

    fn asset(&self, id: i64) -> Result<Option<Asset>, LedgerError> {
        Self::load_asset(&*self.conn()?, "id", &id)
    }

    fn asset_by_name(&self, name: &str) -> Result<Option<Asset>, LedgerError> {
        Self::load_asset(&*self.conn()?, "name", &name)
    }

    fn insert_asset(&self, asset: &Asset) -> Result<i64, LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute(
            "INSERT INTO assets (name, asset_type, sector, industry, isin)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                asset.name,
                asset.asset_type.map(|t| t.as_str()),
                asset.sector,
                asset.industry,
                asset.isin
            ],
        )
        .map_err(query_err)?;
        let id = tx.last_insert_rowid();

        for ticker_id in asset.ticker_ids() {
            tx.execute(
                "UPDATE tickers SET asset_id = ?1 WHERE id = ?2",
                params![id, ticker_id],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(id)
    }

    fn attach_ticker(&self, asset_id: i64, ticker_id: i64) -> Result<(), LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut asset = Self::load_asset(&tx, "id", &asset_id)?
            .ok_or_else(|| Scope::Asset(asset_id).unknown())?;
        asset.attach_ticker(ticker_id)?;

        let changed = tx
            .execute(
                "UPDATE tickers SET asset_id = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![asset_id, ticker_id],
            )
            .map_err(query_err)?;
        if changed != 1 {
            return Err(LedgerError::UnknownTicker {
                symbol: format!("#{ticker_id}"),
            });
        }
        tx.commit().map_err(query_err)
    }
}
