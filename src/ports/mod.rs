//! Port traits the ledger talks to; adapters provide implementations.

pub mod config_port;
pub mod import_port;
pub mod instrument_port;
pub mod transaction_port;
