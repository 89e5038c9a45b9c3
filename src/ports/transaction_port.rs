//! Transaction storage port trait.

use crate::domain::error::LedgerError;
use crate::domain::scope::{Scope, ScopeKind};
use crate::domain::transaction::{DerivedFields, LedgerEntry, Transaction};

pub trait TransactionRepository {
    /// Raw transactions of one scope, ascending by `transaction_no`.
    fn load_ordered(&self, scope: Scope) -> Result<Vec<Transaction>, LedgerError>;

    /// Persist the derived fields of a full replay. Implementations must write
    /// all entries or none.
    fn save_derived(&self, scope: Scope, entries: &[LedgerEntry]) -> Result<(), LedgerError>;

    /// Append a raw transaction. Returns `false` when a transaction with the
    /// same `transaction_no` is already recorded and the append was skipped.
    fn append(&self, transaction: &Transaction) -> Result<bool, LedgerError>;

    /// Whether a transaction with this number is already recorded.
    fn contains(&self, transaction_no: i64) -> Result<bool, LedgerError>;

    /// Every scope of the given kind that has at least one transaction.
    fn scopes(&self, kind: ScopeKind) -> Result<Vec<Scope>, LedgerError>;

    /// Stored derived fields of the scope's latest transaction, `None` when the
    /// scope is empty or has not been replayed yet.
    fn latest_derived(&self, scope: Scope) -> Result<Option<DerivedFields>, LedgerError>;

    /// Remove all transactions.
    fn clear(&self) -> Result<(), LedgerError>;
}
