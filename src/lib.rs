//! tickerledger: average-cost accounting for brokerage transactions.
//!
//! Hexagonal layout: accounting rules and value types in [`domain`], storage,
//! import and configuration traits in [`ports`], implementations in
//! [`adapters`], and the orchestration that ties them together in [`service`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod service;
