#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;

use household_finance::{
    config::ConfigManager,
    ledger::{EntryLine, FlowType, MonthKey},
    storage::{JsonLedgerStore, LedgerStore},
};
use once_cell::sync::Lazy;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Creates a unique directory that outlives the calling test.
pub fn temp_base() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    base
}

/// JSON store and config manager rooted in a fresh directory.
pub fn setup_test_env() -> (JsonLedgerStore, ConfigManager) {
    let base = temp_base();
    let config_manager =
        ConfigManager::with_base_dir(base.clone()).expect("create config manager for temp dir");
    let config = config_manager.load().expect("load default config");
    let store =
        JsonLedgerStore::new(config_manager.store_path(&config)).expect("create json store");
    (store, config_manager)
}

pub fn month(raw: &str) -> MonthKey {
    MonthKey::parse(raw).expect("valid month")
}

/// Writes `count` months of salary and rent, rent rising by `step` each month.
pub fn seed_months(store: &dyn LedgerStore, first: &str, count: usize, step: f64) {
    let start = month(first);
    for index in 0..count {
        let key = start.offset(index as i32);
        store
            .replace_line_items(&key, &FlowType::Income, &[EntryLine::new("Salary", 3_000.0)])
            .expect("seed income");
        store
            .replace_line_items(
                &key,
                &FlowType::Expense,
                &[
                    EntryLine::new("Rent", 1_200.0 + step * index as f64),
                    EntryLine::new("Groceries", 400.0),
                ],
            )
            .expect("seed expense");
    }
}
