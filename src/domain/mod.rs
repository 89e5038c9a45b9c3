//! Accounting rules and the value types they work on.

pub mod asset;
pub mod currency;
pub mod error;
pub mod holding;
pub mod ledger;
pub mod scope;
pub mod settings;
pub mod ticker;
pub mod transaction;
