//! Store-facing workflows. Each service is a stateless facade that reads fresh
//! data from a [`LedgerStore`](crate::storage::LedgerStore) and runs the pure
//! pipeline over it.

pub mod forecast_service;
pub mod ledger_service;
pub mod settings_service;
pub mod summary_service;

pub use forecast_service::{ForecastReport, ForecastRequest, ForecastService};
pub use ledger_service::{ExpenseInput, LedgerService, MonthEntry, MonthPreview};
pub use settings_service::SettingsService;
pub use summary_service::{Dashboard, SummaryReport, SummaryService};
