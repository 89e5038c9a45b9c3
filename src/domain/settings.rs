//! Validated ledger settings read from configuration.

use crate::domain::error::LedgerError;
use crate::domain::scope::ScopeKind;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_POOL_SIZE: u32 = 4;
pub const MAX_POOL_SIZE: i64 = 64;
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSettings {
    pub sqlite_path: String,
    pub pool_size: u32,
    pub scope: ScopeKind,
    pub date_format: String,
    /// Re-imported rows with a known `transaction_no` are skipped rather than rejected.
    pub skip_duplicates: bool,
}

impl LedgerSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LedgerError> {
        Ok(LedgerSettings {
            sqlite_path: sqlite_path(config)?,
            pool_size: pool_size(config)?,
            scope: scope(config)?,
            date_format: date_format(config)?,
            skip_duplicates: config.get_bool("import", "skip_duplicates", true),
        })
    }
}

fn sqlite_path(config: &dyn ConfigPort) -> Result<String, LedgerError> {
    match config.get_string("sqlite", "path") {
        Some(path) if !path.trim().is_empty() => Ok(path.trim().to_string()),
        _ => Err(LedgerError::ConfigMissing {
            section: "sqlite".to_string(),
            key: "path".to_string(),
        }),
    }
}

fn pool_size(config: &dyn ConfigPort) -> Result<u32, LedgerError> {
    let invalid = |reason: String| LedgerError::ConfigInvalid {
        section: "sqlite".to_string(),
        key: "pool_size".to_string(),
        reason,
    };
    let Some(raw) = config.get_string("sqlite", "pool_size") else {
        return Ok(DEFAULT_POOL_SIZE);
    };
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid(format!("'{}' is not an integer", raw.trim())))?;
    if !(1..=MAX_POOL_SIZE).contains(&value) {
        return Err(invalid(format!(
            "pool_size must be between 1 and {MAX_POOL_SIZE}"
        )));
    }
    Ok(value as u32)
}

fn scope(config: &dyn ConfigPort) -> Result<ScopeKind, LedgerError> {
    match config.get_string("ledger", "scope") {
        None => Ok(ScopeKind::default()),
        Some(value) => value
            .parse::<ScopeKind>()
            .map_err(|reason| LedgerError::ConfigInvalid {
                section: "ledger".to_string(),
                key: "scope".to_string(),
                reason,
            }),
    }
}

fn date_format(config: &dyn ConfigPort) -> Result<String, LedgerError> {
    let format = config
        .get_string("import", "date_format")
        .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
    if !format.contains('%') {
        return Err(LedgerError::ConfigInvalid {
            section: "import".to_string(),
            key: "date_format".to_string(),
            reason: "date_format must contain at least one % specifier".to_string(),
        });
    }
    Ok(format)
}
