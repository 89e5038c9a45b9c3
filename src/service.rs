//! Ledger orchestration: load, replay and persist derived fields, plus the
//! import pipeline and holdings valuation.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;

use crate::domain::asset::Asset;
use crate::domain::error::LedgerError;
use crate::domain::holding::Holding;
use crate::domain::ledger::replay;
use crate::domain::scope::{Scope, ScopeKind};
use crate::domain::settings::LedgerSettings;
use crate::domain::ticker::Ticker;
use crate::domain::transaction::Transaction;
use crate::ports::import_port::{ImportPort, ImportRecord};
use crate::ports::instrument_port::InstrumentRepository;
use crate::ports::transaction_port::TransactionRepository;

/// Result of recomputing one scope: the number of replayed transactions, or
/// the error that aborted the replay.
#[derive(Debug)]
pub struct ScopeOutcome {
    pub scope: Scope,
    pub result: Result<usize, LedgerError>,
}

impl ScopeOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub read: usize,
    pub appended: usize,
    pub skipped: usize,
    pub tickers_created: usize,
    pub recomputed: Vec<ScopeOutcome>,
}

impl ImportSummary {
    pub fn failures(&self) -> impl Iterator<Item = &ScopeOutcome> {
        self.recomputed.iter().filter(|o| !o.is_ok())
    }
}

pub struct LedgerService<'a> {
    transactions: &'a dyn TransactionRepository,
    instruments: &'a dyn InstrumentRepository,
    scope_kind: ScopeKind,
    skip_duplicates: bool,
}

impl<'a> LedgerService<'a> {
    pub fn new(
        transactions: &'a dyn TransactionRepository,
        instruments: &'a dyn InstrumentRepository,
    ) -> Self {
        Self {
            transactions,
            instruments,
            scope_kind: ScopeKind::default(),
            skip_duplicates: true,
        }
    }

    pub fn with_settings(mut self, settings: &LedgerSettings) -> Self {
        self.scope_kind = settings.scope;
        self.skip_duplicates = settings.skip_duplicates;
        self
    }

    pub fn with_scope_kind(mut self, kind: ScopeKind) -> Self {
        self.scope_kind = kind;
        self
    }

    pub fn with_skip_duplicates(mut self, skip: bool) -> Self {
        self.skip_duplicates = skip;
        self
    }

    /// Replay one scope from its first transaction and store every derived
    /// row. On any error nothing is written.
    pub fn recompute(&self, scope: Scope) -> Result<usize, LedgerError> {
        let transactions = self.transactions.load_ordered(scope)?;
        let entries = replay(&transactions)?;
        self.transactions.save_derived(scope, &entries)?;
        debug!("recomputed {} ({} transactions)", scope, entries.len());
        Ok(entries.len())
    }

    /// Recompute every scope of the configured kind. A failing scope is
    /// logged and reported; the others still run.
    pub fn recompute_all(&self) -> Result<Vec<ScopeOutcome>, LedgerError> {
        let scopes = self.transactions.scopes(self.scope_kind)?;
        let outcomes = self.recompute_scopes(scopes);
        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(
            "recomputed {} scopes, {} failed",
            outcomes.len() - failed,
            failed
        );
        Ok(outcomes)
    }

    fn recompute_scopes(&self, scopes: impl IntoIterator<Item = Scope>) -> Vec<ScopeOutcome> {
        scopes
            .into_iter()
            .map(|scope| {
                let result = self.recompute(scope);
                if let Err(e) = &result {
                    warn!("recompute of {} failed: {}", scope, e);
                }
                ScopeOutcome { scope, result }
            })
            .collect()
    }

    /// Append every record from `source`, creating tickers (and an asset named
    /// after the symbol) on first reference, then recompute each touched scope.
    ///
    /// Records are validated before anything is written, so a bad row leaves
    /// the store untouched. If an append fails part way, the scopes already
    /// written are recomputed before the error is returned.
    pub fn import(&self, source: &dyn ImportPort) -> Result<ImportSummary, LedgerError> {
        let records = source.read_records()?;
        self.check_records(&records)?;

        let mut summary = ImportSummary {
            read: records.len(),
            ..ImportSummary::default()
        };
        let mut touched = BTreeSet::new();
        let appended = self.append_records(&records, &mut summary, &mut touched);

        summary.recomputed = self.recompute_scopes(touched);
        appended?;
        info!(
            "imported {} of {} records ({} duplicates skipped, {} new tickers)",
            summary.appended, summary.read, summary.skipped, summary.tickers_created
        );
        Ok(summary)
    }

    fn check_records(&self, records: &[ImportRecord]) -> Result<(), LedgerError> {
        let mut seen = HashSet::new();
        for (idx, record) in records.iter().enumerate() {
            // Ticker ids are assigned later and play no part in validation.
            to_transaction(record, 0).validate()?;
            if self.skip_duplicates {
                continue;
            }
            if !seen.insert(record.transaction_no)
                || self.transactions.contains(record.transaction_no)?
            {
                return Err(duplicate(idx + 1, record.transaction_no));
            }
        }
        Ok(())
    }

    fn append_records(
        &self,
        records: &[ImportRecord],
        summary: &mut ImportSummary,
        touched: &mut BTreeSet<Scope>,
    ) -> Result<(), LedgerError> {
        for (idx, record) in records.iter().enumerate() {
            let (ticker, created) = self.resolve_ticker(record)?;
            if created {
                summary.tickers_created += 1;
            }
            let ticker_id = ticker.id.ok_or_else(|| LedgerError::UnknownTicker {
                symbol: ticker.symbol.clone(),
            })?;

            if self.transactions.append(&to_transaction(record, ticker_id))? {
                summary.appended += 1;
                match self.scope_for(&ticker) {
                    Some(scope) => {
                        touched.insert(scope);
                    }
                    None => warn!("{} has no asset; not recomputed", ticker.symbol),
                }
            } else if self.skip_duplicates {
                debug!("skipping duplicate transaction {}", record.transaction_no);
                summary.skipped += 1;
            } else {
                return Err(duplicate(idx + 1, record.transaction_no));
            }
        }
        Ok(())
    }

    fn resolve_ticker(&self, record: &ImportRecord) -> Result<(Ticker, bool), LedgerError> {
        if let Some(ticker) = self.instruments.ticker_by_symbol(&record.symbol)? {
            return Ok((ticker, false));
        }

        let asset_id = match self.instruments.asset_by_name(&record.symbol)? {
            Some(asset) => asset.id,
            None => Some(self.instruments.insert_asset(&Asset::new(&record.symbol))?),
        };

        let mut ticker = Ticker::new(&record.symbol, &record.exchange, record.currency.clone());
        let id = self.instruments.insert_ticker(&ticker)?;
        if let Some(asset_id) = asset_id {
            self.instruments.attach_ticker(asset_id, id)?;
        }
        ticker.id = Some(id);
        ticker.asset_id = asset_id;
        debug!("created ticker {} ({})", ticker.symbol, id);
        Ok((ticker, true))
    }

    fn scope_for(&self, ticker: &Ticker) -> Option<Scope> {
        match self.scope_kind {
            ScopeKind::Ticker => ticker.id.map(Scope::Ticker),
            ScopeKind::Asset => ticker.asset_id.map(Scope::Asset),
        }
    }

    /// Open positions valued at their stored last price, sorted by symbol.
    /// Scopes without a price are left out.
    pub fn holdings(&self) -> Result<Vec<Holding>, LedgerError> {
        let mut holdings = Vec::new();
        for scope in self.transactions.scopes(self.scope_kind)? {
            let Some(derived) = self.transactions.latest_derived(scope)? else {
                warn!("{} has not been recomputed; left out of holdings", scope);
                continue;
            };
            let Some(ticker) = self.quoted_ticker(scope)? else {
                return Err(scope.unknown());
            };
            let Some(price) = ticker.last_price else {
                debug!("no price for {}; left out of holdings", ticker.symbol);
                continue;
            };
            if let Some(holding) = Holding::from_derived(&ticker.symbol, &derived, price)? {
                holdings.push(holding);
            }
        }
        holdings.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(holdings)
    }

    /// The ticker whose symbol and price represent a scope: the ticker itself,
    /// or an asset's primary listing.
    fn quoted_ticker(&self, scope: Scope) -> Result<Option<Ticker>, LedgerError> {
        match scope {
            Scope::Ticker(id) => self.instruments.ticker(id),
            Scope::Asset(id) => match self.instruments.asset(id)?.and_then(|a| a.primary_ticker()) {
                Some(ticker_id) => self.instruments.ticker(ticker_id),
                None => Ok(None),
            },
        }
    }

    pub fn refresh_price(
        &self,
        symbol: &str,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let ticker_id = self
            .instruments
            .ticker_by_symbol(symbol)?
            .and_then(|t| t.id)
            .ok_or_else(|| LedgerError::UnknownTicker {
                symbol: symbol.to_string(),
            })?;
        self.instruments.update_ticker_price(ticker_id, price, at)?;
        debug!("price of {} set to {} at {}", symbol, price, at.to_rfc3339());
        Ok(())
    }
}

fn duplicate(row: usize, transaction_no: i64) -> LedgerError {
    LedgerError::Import {
        row,
        reason: format!("duplicate transaction_no {transaction_no}"),
    }
}

fn to_transaction(record: &ImportRecord, ticker_id: i64) -> Transaction {
    Transaction {
        transaction_no: record.transaction_no,
        date: record.date,
        transaction_type: record.transaction_type,
        ticker_id,
        broker: record.broker.clone(),
        currency: record.currency.clone(),
        exchange_rate: record.exchange_rate,
        quantity: record.quantity,
        price: record.price,
        fees: record.fees,
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::adapters::csv_adapter::CsvAdapter;
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    const CSV: &str = "transaction_no,date,type,symbol,exchange,currency,exchange_rate,quantity,price,fees,broker\n\
        1,2024-01-10,Buy,AAPL,NASDAQ,USD,1,10,100,1,IBKR\n\
        2,2024-02-10,Sell,AAPL,NASDAQ,USD,1,4,150,2,IBKR\n\
        3,2024-03-10,Div,AAPL,NASDAQ,USD,1,0,20,0,IBKR\n";

    fn store() -> SqliteAdapter {
        let store = SqliteAdapter::in_memory().unwrap();
        store.initialize_schema().unwrap();
        store
    }

    #[test]
    fn import_then_holdings() {
        let store = store();
        let service = LedgerService::new(&store, &store);
        let summary = service.import(&CsvAdapter::from_string(CSV)).unwrap();
        assert_eq!(summary.appended, 3);
        assert_eq!(summary.tickers_created, 1);
        assert_eq!(summary.failures().count(), 0);

        let at = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        service.refresh_price("AAPL", dec!(120), at).unwrap();

        let holdings = service.holdings().unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].quantity, dec!(6));
        assert_eq!(holdings[0].total_cost, dec!(600.6));
        assert_eq!(holdings[0].realized_gain, dec!(197.6));
        assert_eq!(holdings[0].dividends_collected, dec!(20));
    }

    #[test]
    fn reimport_skips_duplicates() {
        let store = store();
        let service = LedgerService::new(&store, &store);
        service.import(&CsvAdapter::from_string(CSV)).unwrap();
        let again = service.import(&CsvAdapter::from_string(CSV)).unwrap();
        assert_eq!(again.appended, 0);
        assert_eq!(again.skipped, 3);
        assert!(again.recomputed.is_empty());
    }

    #[test]
    fn strict_reimport_rejects_duplicates() {
        let store = store();
        let service = LedgerService::new(&store, &store).with_skip_duplicates(false);
        service.import(&CsvAdapter::from_string(CSV)).unwrap();
        assert!(matches!(
            service.import(&CsvAdapter::from_string(CSV)),
            Err(LedgerError::Import { row: 1, .. })
        ));
    }

    #[test]
    fn refresh_price_unknown_symbol() {
        let store = store();
        let service = LedgerService::new(&store, &store);
        let at = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            service.refresh_price("NOPE", dec!(1), at),
            Err(LedgerError::UnknownTicker { .. })
        ));
    }
}
