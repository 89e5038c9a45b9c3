//! Average-cost ledger replay.
//!
//! Replays one scope's transactions in `transaction_no` order and annotates
//! each with running units, cost basis, cost of units sold, realized gains and
//! dividends. Pure: no IO, no clock, identical input gives identical output.
//!
//! Sells remove cost at the blended average `cost_basis / units`. There are no
//! lots, so the method is fully described by the four running totals held in
//! [`LedgerState`].

use rust_decimal::Decimal;

use super::error::LedgerError;
use super::transaction::{DerivedFields, LedgerEntry, Transaction, TransactionType};

/// Running totals carried across a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    pub units: Decimal,
    pub cost_basis: Decimal,
    pub realized: Decimal,
    pub dividends: Decimal,
    last_transaction_no: Option<i64>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_transaction_no(&self) -> Option<i64> {
        self.last_transaction_no
    }

    /// Apply one transaction and return its derived fields.
    ///
    /// On error the state is left untouched.
    pub fn apply(&mut self, txn: &Transaction) -> Result<DerivedFields, LedgerError> {
        if let Some(previous) = self.last_transaction_no {
            if txn.transaction_no <= previous {
                return Err(LedgerError::OutOfOrder {
                    previous,
                    current: txn.transaction_no,
                });
            }
        }
        txn.validate()?;

        let mut next = self.clone();
        let cost_of_units_sold = match txn.transaction_type {
            TransactionType::Buy => {
                let cost = overflow_checked(
                    txn.gross_amount_checked()
                        .and_then(|gross| gross.checked_add(txn.fees)),
                    txn,
                )?;
                next.units = overflow_checked(next.units.checked_add(txn.quantity), txn)?;
                next.cost_basis = overflow_checked(next.cost_basis.checked_add(cost), txn)?;
                Decimal::ZERO
            }
            TransactionType::Sell => next.sell(txn)?,
            TransactionType::Dividend => {
                next.dividends = overflow_checked(next.dividends.checked_add(txn.price), txn)?;
                Decimal::ZERO
            }
        };
        next.last_transaction_no = Some(txn.transaction_no);
        *self = next;

        Ok(self.snapshot(cost_of_units_sold))
    }

    fn sell(&mut self, txn: &Transaction) -> Result<Decimal, LedgerError> {
        if self.units.is_zero() || txn.quantity > self.units {
            return Err(LedgerError::Oversell {
                transaction_no: txn.transaction_no,
                requested: txn.quantity,
                held: self.units,
            });
        }

        // Multiply before dividing so whole-lot disposals stay exact.
        let cost_of_units_sold = if txn.quantity == self.units {
            self.cost_basis
        } else {
            overflow_checked(
                self.cost_basis
                    .checked_mul(txn.quantity)
                    .and_then(|c| c.checked_div(self.units)),
                txn,
            )?
        };

        let proceeds = overflow_checked(
            txn.gross_amount_checked()
                .and_then(|gross| gross.checked_sub(txn.fees)),
            txn,
        )?;
        self.realized = overflow_checked(
            proceeds
                .checked_sub(cost_of_units_sold)
                .and_then(|gain| self.realized.checked_add(gain)),
            txn,
        )?;
        self.units -= txn.quantity;
        self.cost_basis -= cost_of_units_sold;
        if self.units.is_zero() {
            self.cost_basis = Decimal::ZERO;
        }

        Ok(cost_of_units_sold)
    }

    /// Current totals as derived fields with the given per-transaction cost sold.
    pub fn snapshot(&self, cost_of_units_sold: Decimal) -> DerivedFields {
        DerivedFields {
            cumulative_units: self.units,
            cumulative_cost: self.cost_basis,
            cost_of_units_sold,
            realized_gains: self.realized,
            dividends_collected: self.dividends,
        }
    }
}

impl Transaction {
    fn gross_amount_checked(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.price)
    }
}

fn overflow_checked(value: Option<Decimal>, txn: &Transaction) -> Result<Decimal, LedgerError> {
    value.ok_or_else(|| LedgerError::InvalidTransaction {
        transaction_no: txn.transaction_no,
        reason: "arithmetic overflow".to_string(),
    })
}

/// Replay an ordered sequence from an empty position.
///
/// Either every transaction is annotated or the whole replay fails; no
/// partial result is returned.
pub fn replay<'a, I>(transactions: I) -> Result<Vec<LedgerEntry>, LedgerError>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut state = LedgerState::new();
    transactions
        .into_iter()
        .map(|txn| {
            let derived = state.apply(txn)?;
            Ok(LedgerEntry {
                transaction: txn.clone(),
                derived,
            })
        })
        .collect()
}

/// Replay and return only the final state, e.g. for a quick position check.
pub fn final_state<'a, I>(transactions: I) -> Result<LedgerState, LedgerError>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut state = LedgerState::new();
    for txn in transactions {
        state.apply(txn)?;
    }
    Ok(state)
}
