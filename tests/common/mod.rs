#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use tickerledger::domain::asset::Asset;
use tickerledger::domain::error::LedgerError;
use tickerledger::domain::scope::{Scope, ScopeKind};
use tickerledger::domain::ticker::Ticker;
use tickerledger::domain::transaction::{DerivedFields, LedgerEntry, Transaction, TransactionType};
use tickerledger::ports::instrument_port::InstrumentRepository;
use tickerledger::ports::transaction_port::TransactionRepository;

/// In-memory stand-in for both repositories.
#[derive(Default)]
pub struct MockRepository {
    pub rows: RefCell<BTreeMap<i64, (Transaction, Option<DerivedFields>)>>,
    pub tickers: RefCell<Vec<Ticker>>,
    pub assets: RefCell<Vec<Asset>>,
    pub failing_saves: HashSet<Scope>,
    pub failing_appends: HashSet<i64>,
    pub save_calls: RefCell<usize>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_save(mut self, scope: Scope) -> Self {
        self.failing_saves.insert(scope);
        self
    }

    pub fn with_failing_append(mut self, transaction_no: i64) -> Self {
        self.failing_appends.insert(transaction_no);
        self
    }

    pub fn add_ticker(&self, symbol: &str) -> i64 {
        self.insert_ticker(&Ticker::new(symbol, "NASDAQ", "USD".parse().unwrap()))
            .unwrap()
    }

    pub fn push(&self, transaction: Transaction) {
        assert!(self.append(&transaction).unwrap());
    }

    pub fn derived(&self, transaction_no: i64) -> Option<DerivedFields> {
        self.rows
            .borrow()
            .get(&transaction_no)
            .and_then(|(_, derived)| *derived)
    }

    fn asset_of(&self, ticker_id: i64) -> Option<i64> {
        self.tickers
            .borrow()
            .iter()
            .find(|t| t.id == Some(ticker_id))
            .and_then(|t| t.asset_id)
    }

    fn in_scope(&self, transaction: &Transaction, scope: Scope) -> bool {
        match scope {
            Scope::Ticker(id) => transaction.ticker_id == id,
            Scope::Asset(id) => self.asset_of(transaction.ticker_id) == Some(id),
        }
    }
}

impl TransactionRepository for MockRepository {
    fn load_ordered(&self, scope: Scope) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self
            .rows
            .borrow()
            .values()
            .filter(|(t, _)| self.in_scope(t, scope))
            .map(|(t, _)| t.clone())
            .collect())
    }

    fn save_derived(&self, scope: Scope, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        *self.save_calls.borrow_mut() += 1;
        if self.failing_saves.contains(&scope) {
            return Err(LedgerError::Database {
                reason: format!("save of {scope} refused"),
            });
        }
        let mut rows = self.rows.borrow_mut();
        for entry in entries {
            if let Some(row) = rows.get_mut(&entry.transaction.transaction_no) {
                row.1 = Some(entry.derived);
            }
        }
        Ok(())
    }

    fn append(&self, transaction: &Transaction) -> Result<bool, LedgerError> {
        if self.failing_appends.contains(&transaction.transaction_no) {
            return Err(LedgerError::Database {
                reason: format!("append of {} refused", transaction.transaction_no),
            });
        }
        let mut rows = self.rows.borrow_mut();
        if rows.contains_key(&transaction.transaction_no) {
            return Ok(false);
        }
        rows.insert(transaction.transaction_no, (transaction.clone(), None));
        Ok(true)
    }

    fn contains(&self, transaction_no: i64) -> Result<bool, LedgerError> {
        Ok(self.rows.borrow().contains_key(&transaction_no))
    }

    fn scopes(&self, kind: ScopeKind) -> Result<Vec<Scope>, LedgerError> {
        let rows = self.rows.borrow();
        let mut scopes: Vec<Scope> = rows
            .values()
            .filter_map(|(t, _)| match kind {
                ScopeKind::Ticker => Some(Scope::Ticker(t.ticker_id)),
                ScopeKind::Asset => self.asset_of(t.ticker_id).map(Scope::Asset),
            })
            .collect();
        scopes.sort();
        scopes.dedup();
        Ok(scopes)
    }

    fn latest_derived(&self, scope: Scope) -> Result<Option<DerivedFields>, LedgerError> {
        Ok(self
            .rows
            .borrow()
            .values()
            .filter(|(t, _)| self.in_scope(t, scope))
            .last()
            .and_then(|(_, derived)| *derived))
    }

    fn clear(&self) -> Result<(), LedgerError> {
        self.rows.borrow_mut().clear();
        Ok(())
    }
}

impl InstrumentRepository for MockRepository {
    fn ticker(&self, id: i64) -> Result<Option<Ticker>, LedgerError> {
        Ok(self
            .tickers
            .borrow()
            .iter()
            .find(|t| t.id == Some(id))
            .cloned())
    }

    fn ticker_by_symbol(&self, symbol: &str) -> Result<Option<Ticker>, LedgerError> {
        Ok(self
            .tickers
            .borrow()
            .iter()
            .find(|t| t.symbol == symbol)
            .cloned())
    }

    fn insert_ticker(&self, ticker: &Ticker) -> Result<i64, LedgerError> {
        let mut tickers = self.tickers.borrow_mut();
        if tickers.iter().any(|t| t.symbol == ticker.symbol) {
            return Err(LedgerError::DatabaseQuery {
                reason: format!("duplicate symbol {}", ticker.symbol),
            });
        }
        let id = tickers.len() as i64 + 1;
        let mut stored = ticker.clone();
        stored.id = Some(id);
        tickers.push(stored);
        Ok(id)
    }

    fn update_ticker_price(
        &self,
        ticker_id: i64,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut tickers = self.tickers.borrow_mut();
        let ticker = tickers
            .iter_mut()
            .find(|t| t.id == Some(ticker_id))
            .ok_or_else(|| LedgerError::UnknownTicker {
                symbol: format!("#{ticker_id}"),
            })?;
        ticker.update_price(price, at)
    }

    fn asset(&self, id: i64) -> Result<Option<Asset>, LedgerError> {
        Ok(self
            .assets
            .borrow()
            .iter()
            .find(|a| a.id == Some(id))
            .cloned())
    }

    fn asset_by_name(&self, name: &str) -> Result<Option<Asset>, LedgerError> {
        Ok(self
            .assets
            .borrow()
            .iter()
            .find(|a| a.name == name)
            .cloned())
    }

    fn insert_asset(&self, asset: &Asset) -> Result<i64, LedgerError> {
        let mut assets = self.assets.borrow_mut();
        let id = assets.len() as i64 + 1;
        let mut stored = asset.clone();
        stored.id = Some(id);
        assets.push(stored);
        Ok(id)
    }

    fn attach_ticker(&self, asset_id: i64, ticker_id: i64) -> Result<(), LedgerError> {
        {
            let mut assets = self.assets.borrow_mut();
            let asset = assets
                .iter_mut()
                .find(|a| a.id == Some(asset_id))
                .ok_or_else(|| Scope::Asset(asset_id).unknown())?;
            asset.attach_ticker(ticker_id)?;
        }
        let mut tickers = self.tickers.borrow_mut();
        let ticker = tickers
            .iter_mut()
            .find(|t| t.id == Some(ticker_id))
            .ok_or_else(|| LedgerError::UnknownTicker {
                symbol: format!("#{ticker_id}"),
            })?;
        ticker.asset_id = Some(asset_id);
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn make_txn(
    no: i64,
    ticker_id: i64,
    kind: TransactionType,
    quantity: &str,
    price: &str,
    fees: &str,
) -> Transaction {
    Transaction {
        transaction_no: no,
        date: date(2024, 1, 1),
        transaction_type: kind,
        ticker_id,
        broker: "IBKR".to_string(),
        currency: "USD".parse().unwrap(),
        exchange_rate: Decimal::ONE,
        quantity: dec(quantity),
        price: dec(price),
        fees: dec(fees),
    }
}

pub fn buy(no: i64, ticker_id: i64, quantity: &str, price: &str, fees: &str) -> Transaction {
    make_txn(no, ticker_id, TransactionType::Buy, quantity, price, fees)
}

pub fn sell(no: i64, ticker_id: i64, quantity: &str, price: &str, fees: &str) -> Transaction {
    make_txn(no, ticker_id, TransactionType::Sell, quantity, price, fees)
}

pub fn dividend(no: i64, ticker_id: i64, amount: &str) -> Transaction {
    make_txn(no, ticker_id, TransactionType::Dividend, "0", amount, "0")
}

pub const CSV_HEADER: &str =
    "transaction_no,date,type,symbol,exchange,currency,exchange_rate,quantity,price,fees,broker\n";
