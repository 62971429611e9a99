#![doc(test(attr(deny(warnings))))]

//! Household finance engine: monthly income and expense entry in EUR and RUB,
//! EUR-normalized summaries with a running savings balance, and exponential
//! smoothing forecasts with growth scenarios and an uncertainty band.
//!
//! The pipeline is `storage` → `currency::normalize` → `summary::summarize` →
//! `forecast::forecast`; `core::services` wires it to a [`storage::LedgerStore`]
//! and `cli` exposes it as an interactive shell.

pub mod cli;
pub mod config;
pub mod core;
pub mod currency;
pub mod errors;
pub mod forecast;
pub mod ledger;
pub mod storage;
pub mod summary;
pub mod utils;

pub use errors::{FinanceError, Result};

/// Initializes global tracing with the default filter.
pub fn init() {
    init_with_filter(None);
}

/// Initializes global tracing; `RUST_LOG` still overrides `directive`.
pub fn init_with_filter(directive: Option<&str>) {
    utils::init_tracing(directive);
    tracing::info!("household finance tracing initialized");
}
