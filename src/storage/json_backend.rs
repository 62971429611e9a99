use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{
    currency::FxTable,
    errors::{FinanceError, Result},
    ledger::{EntryLine, FlowType, LineItem, MonthKey},
    utils::{ensure_dir, write_atomic, PathResolver},
};

use super::{validate_lines, validate_rate, LedgerState, LedgerStore, Partition};

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// On-disk shape of the ledger file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub schema_version: u32,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub fx_rates: FxTable,
}

impl Default for LedgerSnapshot {
    fn default() -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            settings: BTreeMap::new(),
            line_items: Vec::new(),
            fx_rates: FxTable::new(),
        }
    }
}

impl LedgerSnapshot {
    fn from_state(state: LedgerState) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            settings: state.settings,
            line_items: state.line_items,
            fx_rates: state.fx_rates,
        }
    }

    fn into_state(self) -> LedgerState {
        LedgerState {
            settings: self.settings,
            line_items: self.line_items,
            fx_rates: self.fx_rates,
        }
    }

    /// Checks invariants serde cannot express: schema version, one row per
    /// (month, flow type, category) and finite numbers.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version > SNAPSHOT_SCHEMA_VERSION {
            return Err(FinanceError::Storage(format!(
                "ledger file uses schema version {}, newest supported is {}",
                self.schema_version, SNAPSHOT_SCHEMA_VERSION
            )));
        }
        let mut keys = BTreeSet::new();
        for item in &self.line_items {
            if !item.amount.is_finite() {
                return Err(FinanceError::Storage(format!(
                    "non-finite amount for {} {} `{}`",
                    item.month, item.flow_type, item.category
                )));
            }
            if !keys.insert((item.month, &item.flow_type, item.category.as_str())) {
                return Err(FinanceError::Storage(format!(
                    "duplicate row for {} {} `{}`",
                    item.month, item.flow_type, item.category
                )));
            }
        }
        if let Some((month, _)) = self.fx_rates.iter().find(|(_, rate)| !rate.is_finite()) {
            return Err(FinanceError::Storage(format!(
                "non-finite exchange rate for {}",
                month
            )));
        }
        Ok(())
    }
}

/// Single-file JSON store.
///
/// Every mutation reads the current snapshot, applies the change and writes the
/// whole file back through a staging file and rename, so a partition or month
/// replace is never observed half applied. Writers within the process are
/// serialized; across processes the last write wins.
pub struct JsonLedgerStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Store at `data/ledger.json` under `root` or the resolved application home.
    pub fn in_home(root: Option<PathBuf>) -> Result<Self> {
        let base = PathResolver::resolve_base(root);
        Self::new(PathResolver::store_file_in(&base))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and validates the file; a missing file is an empty ledger.
    pub fn load_snapshot(&self) -> Result<LedgerSnapshot> {
        if !self.path.exists() {
            return Ok(LedgerSnapshot::default());
        }
        let data = fs::read_to_string(&self.path)?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&data).map_err(|err| {
            FinanceError::Storage(format!("{}: {}", self.path.display(), err))
        })?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        write_atomic(&self.path, &json)
    }

    fn read_state(&self) -> Result<LedgerState> {
        Ok(self.load_snapshot()?.into_state())
    }

    fn mutate<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut LedgerState),
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| FinanceError::Storage("ledger write lock poisoned".into()))?;
        let mut state = self.read_state()?;
        change(&mut state);
        self.save_snapshot(&LedgerSnapshot::from_state(state))
    }
}

impl LedgerStore for JsonLedgerStore {
    fn get_settings(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.load_snapshot()?.settings)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.mutate(|state| {
            state.settings.insert(key.to_string(), value.to_string());
        })
    }

    fn load_all_line_items(&self) -> Result<Vec<LineItem>> {
        Ok(self.load_snapshot()?.line_items)
    }

    fn load_line_items(&self, month: &MonthKey) -> Result<Vec<LineItem>> {
        Ok(self.read_state()?.month_items(month))
    }

    fn replace_line_items(
        &self,
        month: &MonthKey,
        flow_type: &FlowType,
        items: &[EntryLine],
    ) -> Result<()> {
        validate_lines(items)?;
        self.mutate(|state| state.replace(month, flow_type, items))?;
        tracing::debug!(%month, %flow_type, rows = items.len(), "partition replaced");
        Ok(())
    }

    fn replace_month(&self, month: &MonthKey, partitions: &[Partition]) -> Result<()> {
        for partition in partitions {
            validate_lines(&partition.lines)?;
        }
        self.mutate(|state| {
            for partition in partitions {
                state.replace(month, &partition.flow_type, &partition.lines);
            }
        })?;
        tracing::debug!(%month, partitions = partitions.len(), "month replaced");
        Ok(())
    }

    fn get_fx_rate(&self, month: &MonthKey) -> Result<Option<f64>> {
        Ok(self.load_snapshot()?.fx_rates.get(month).copied())
    }

    fn upsert_fx_rate(&self, month: &MonthKey, rate: f64) -> Result<()> {
        validate_rate(rate)?;
        self.mutate(|state| {
            state.fx_rates.insert(*month, rate);
        })
    }

    fn load_all_fx_rates(&self) -> Result<FxTable> {
        Ok(self.load_snapshot()?.fx_rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;
    use crate::utils::paths::tmp_path;
    use tempfile::TempDir;

    fn store_with_temp_dir() -> (JsonLedgerStore, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let store = JsonLedgerStore::new(temp.path().join("ledger.json")).expect("json store");
        (store, temp)
    }

    fn month(raw: &str) -> MonthKey {
        MonthKey::parse(raw).unwrap()
    }

    #[test]
    fn missing_file_is_an_empty_ledger() {
        let (store, _guard) = store_with_temp_dir();
        assert!(store.load_all_line_items().unwrap().is_empty());
        assert!(store.get_settings().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn rows_survive_reopening() {
        let (store, guard) = store_with_temp_dir();
        let m = month("2025-01");
        store
            .replace_line_items(
                &m,
                &FlowType::Income,
                &[EntryLine::new("Salary", 3_000.0), EntryLine::new("salary_moscow", 90_000.0)],
            )
            .unwrap();
        store.upsert_fx_rate(&m, 0.0102).unwrap();
        store.set_setting("starting_savings", "1500").unwrap();

        let reopened = JsonLedgerStore::new(guard.path().join("ledger.json")).unwrap();
        let items = reopened.load_line_items(&m).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].currency, Currency::Rub);
        assert_eq!(reopened.get_fx_rate(&m).unwrap(), Some(0.0102));
        assert_eq!(
            reopened.get_settings().unwrap().get("starting_savings").map(String::as_str),
            Some("1500")
        );
        assert!(!tmp_path(reopened.path()).exists());
    }

    #[test]
    fn replace_month_commits_all_partitions() {
        let (store, _guard) = store_with_temp_dir();
        let m = month("2025-02");
        store
            .replace_month(
                &m,
                &[
                    Partition::new(FlowType::Income, vec![EntryLine::new("Salary", 2_000.0)]),
                    Partition::new(FlowType::Expense, vec![EntryLine::new("Rent", 800.0)]),
                ],
            )
            .unwrap();
        assert_eq!(store.load_line_items(&m).unwrap().len(), 2);
        assert_eq!(store.list_months().unwrap(), vec![m]);
    }

    #[test]
    fn malformed_month_in_file_is_rejected() {
        let (store, _guard) = store_with_temp_dir();
        fs::write(
            store.path(),
            r#"{"schema_version":1,"line_items":[{"month":"2025-13","flow_type":"income","category":"Salary","amount":1.0}]}"#,
        )
        .unwrap();
        assert!(matches!(
            store.load_all_line_items(),
            Err(FinanceError::Storage(_))
        ));
    }

    #[test]
    fn newer_schema_and_duplicates_are_rejected() {
        let (store, _guard) = store_with_temp_dir();
        fs::write(store.path(), r#"{"schema_version":99}"#).unwrap();
        assert!(store.load_snapshot().is_err());

        fs::write(
            store.path(),
            r#"{"schema_version":1,"line_items":[
                {"month":"2025-01","flow_type":"expense","category":"Rent","amount":1.0},
                {"month":"2025-01","flow_type":"expense","category":"Rent","amount":2.0}]}"#,
        )
        .unwrap();
        assert!(store.load_snapshot().is_err());
    }
}
