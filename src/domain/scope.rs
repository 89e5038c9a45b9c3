//! Accounting scopes: the grouping key running totals are kept under.

use std::fmt;
use std::str::FromStr;

use super::error::LedgerError;

/// Which level running totals are accumulated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScopeKind {
    #[default]
    Ticker,
    Asset,
}

impl FromStr for ScopeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ticker" => Ok(ScopeKind::Ticker),
            "asset" => Ok(ScopeKind::Asset),
            other => Err(format!("'{other}' is not a valid scope (expected ticker or asset)")),
        }
    }
}

/// A single accounting scope. Transactions of one scope replay together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Ticker(i64),
    Asset(i64),
}

impl Scope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::Ticker(_) => ScopeKind::Ticker,
            Scope::Asset(_) => ScopeKind::Asset,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Scope::Ticker(id) | Scope::Asset(id) => *id,
        }
    }

    pub fn unknown(&self) -> LedgerError {
        LedgerError::UnknownScope {
            scope: self.to_string(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Ticker(id) => write!(f, "ticker:{id}"),
            Scope::Asset(id) => write!(f, "asset:{id}"),
        }
    }
}
