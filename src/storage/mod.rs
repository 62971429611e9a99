pub mod json_backend;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    currency::FxTable,
    errors::{FinanceError, Result},
    ledger::{EntryLine, FlowType, LineItem, MonthKey},
};

pub use json_backend::{JsonLedgerStore, LedgerSnapshot, SNAPSHOT_SCHEMA_VERSION};

/// Replacement content for one (month, flow type) partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub flow_type: FlowType,
    pub lines: Vec<EntryLine>,
}

impl Partition {
    pub fn new(flow_type: FlowType, lines: Vec<EntryLine>) -> Self {
        Self { flow_type, lines }
    }
}

/// Persistence for settings, ledger rows and monthly exchange rates.
///
/// Rows are keyed by (month, flow type); replacing a partition deletes every row
/// of that pair before inserting the new ones, so repeating a replace is a no-op.
pub trait LedgerStore: Send + Sync {
    fn get_settings(&self) -> Result<BTreeMap<String, String>>;
    fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    fn load_all_line_items(&self) -> Result<Vec<LineItem>>;
    fn load_line_items(&self, month: &MonthKey) -> Result<Vec<LineItem>>;
    fn replace_line_items(
        &self,
        month: &MonthKey,
        flow_type: &FlowType,
        items: &[EntryLine],
    ) -> Result<()>;

    /// Replaces several partitions of one month. Backends able to commit them as a
    /// unit override this; the default applies them one by one.
    fn replace_month(&self, month: &MonthKey, partitions: &[Partition]) -> Result<()> {
        for partition in partitions {
            self.replace_line_items(month, &partition.flow_type, &partition.lines)?;
        }
        Ok(())
    }

    /// Distinct months holding at least one row, ascending.
    fn list_months(&self) -> Result<Vec<MonthKey>> {
        let mut months: Vec<MonthKey> = self
            .load_all_line_items()?
            .into_iter()
            .map(|item| item.month)
            .collect();
        months.sort();
        months.dedup();
        Ok(months)
    }

    fn get_fx_rate(&self, month: &MonthKey) -> Result<Option<f64>>;
    fn upsert_fx_rate(&self, month: &MonthKey, rate: f64) -> Result<()>;
    fn load_all_fx_rates(&self) -> Result<FxTable>;
}

/// Rejects blank or repeated categories and non-finite amounts before anything
/// is stored. A partition holds at most one row per category.
pub(crate) fn validate_lines(items: &[EntryLine]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for item in items {
        if item.category.trim().is_empty() {
            return Err(FinanceError::InvalidInput(
                "category name cannot be empty".into(),
            ));
        }
        if !item.amount.is_finite() {
            return Err(FinanceError::InvalidInput(format!(
                "amount for `{}` is not a finite number",
                item.category
            )));
        }
        if !seen.insert(item.category.as_str()) {
            return Err(FinanceError::InvalidInput(format!(
                "category `{}` appears more than once",
                item.category
            )));
        }
    }
    Ok(())
}

pub(crate) fn validate_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() {
        return Err(FinanceError::InvalidInput(
            "exchange rate is not a finite number".into(),
        ));
    }
    Ok(())
}

/// Shared row bookkeeping used by both backends.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LedgerState {
    pub settings: BTreeMap<String, String>,
    pub line_items: Vec<LineItem>,
    pub fx_rates: FxTable,
}

impl LedgerState {
    pub fn month_items(&self, month: &MonthKey) -> Vec<LineItem> {
        self.line_items
            .iter()
            .filter(|item| &item.month == month)
            .cloned()
            .collect()
    }

    pub fn replace(&mut self, month: &MonthKey, flow_type: &FlowType, items: &[EntryLine]) {
        self.line_items
            .retain(|item| !(&item.month == month && &item.flow_type == flow_type));
        self.line_items.extend(
            items
                .iter()
                .map(|entry| LineItem::from_entry(*month, flow_type.clone(), entry)),
        );
    }
}

/// Process-local store, mainly for tests and previews.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| FinanceError::Storage("ledger lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|_| FinanceError::Storage("ledger lock poisoned".into()))
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn get_settings(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.read()?.settings.clone())
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.write()?.settings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn load_all_line_items(&self) -> Result<Vec<LineItem>> {
        Ok(self.read()?.line_items.clone())
    }

    fn load_line_items(&self, month: &MonthKey) -> Result<Vec<LineItem>> {
        Ok(self.read()?.month_items(month))
    }

    fn replace_line_items(
        &self,
        month: &MonthKey,
        flow_type: &FlowType,
        items: &[EntryLine],
    ) -> Result<()> {
        validate_lines(items)?;
        self.write()?.replace(month, flow_type, items);
        Ok(())
    }

    fn replace_month(&self, month: &MonthKey, partitions: &[Partition]) -> Result<()> {
        for partition in partitions {
            validate_lines(&partition.lines)?;
        }
        let mut state = self.write()?;
        for partition in partitions {
            state.replace(month, &partition.flow_type, &partition.lines);
        }
        Ok(())
    }

    fn get_fx_rate(&self, month: &MonthKey) -> Result<Option<f64>> {
        Ok(self.read()?.fx_rates.get(month).copied())
    }

    fn upsert_fx_rate(&self, month: &MonthKey, rate: f64) -> Result<()> {
        validate_rate(rate)?;
        self.write()?.fx_rates.insert(*month, rate);
        Ok(())
    }

    fn load_all_fx_rates(&self) -> Result<FxTable> {
        Ok(self.read()?.fx_rates.clone())
    }
}
