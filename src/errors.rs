use std::result::Result as StdResult;

use thiserror::Error;

use crate::ledger::MonthKey;

/// Unified error type for the ledger, normalization, forecasting and storage layers.
#[derive(Debug, Error)]
pub enum FinanceError {
    #[error("Malformed month `{0}`: expected YYYY-MM")]
    MalformedMonthKey(String),
    #[error("Missing RUB→EUR rate for {0}: foreign-currency income needs a positive rate")]
    MissingExchangeRate(MonthKey),
    #[error("Forecast needs at least {required} months of history, found {available}")]
    InsufficientHistory { required: usize, available: usize },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Persistence error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = StdResult<T, FinanceError>;

impl From<std::io::Error> for FinanceError {
    fn from(err: std::io::Error) -> Self {
        FinanceError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for FinanceError {
    fn from(err: serde_json::Error) -> Self {
        FinanceError::Storage(err.to_string())
    }
}
