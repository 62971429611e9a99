//! Ledger data model: month keys, categorized line items and settings.

pub mod line_item;
pub mod month;
pub mod settings;

pub use line_item::{EntryLine, FlowType, LineItem};
pub use month::MonthKey;
pub use settings::Settings;
