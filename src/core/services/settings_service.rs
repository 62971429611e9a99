use crate::{
    errors::{FinanceError, Result},
    ledger::{
        settings::{
            join_list, DEFAULT_SETTINGS, EXPENSE_CATEGORIES_KEY, EXPENSE_PEOPLE_KEY,
            INCOME_CATEGORIES_KEY, STARTING_SAVINGS_KEY,
        },
        FlowType, Settings,
    },
    storage::LedgerStore,
};

pub struct SettingsService;

impl SettingsService {
    /// Writes defaults for absent keys only; returns the keys it inserted.
    pub fn ensure_defaults(store: &dyn LedgerStore) -> Result<Vec<&'static str>> {
        let existing = store.get_settings()?;
        let mut inserted = Vec::new();
        for (key, value) in DEFAULT_SETTINGS {
            if !existing.contains_key(key) {
                store.set_setting(key, value)?;
                inserted.push(key);
            }
        }
        if !inserted.is_empty() {
            tracing::info!(keys = ?inserted, "default settings written");
        }
        Ok(inserted)
    }

    pub fn load(store: &dyn LedgerStore) -> Result<Settings> {
        Settings::from_map(&store.get_settings()?)
    }

    pub fn set_starting_savings(store: &dyn LedgerStore, amount: f64) -> Result<()> {
        if !amount.is_finite() {
            return Err(FinanceError::InvalidInput(
                "starting savings must be a finite amount".into(),
            ));
        }
        store.set_setting(STARTING_SAVINGS_KEY, &amount.to_string())
    }

    /// Replaces the advisory category list for `income` or `expense`.
    pub fn set_categories<S: AsRef<str>>(
        store: &dyn LedgerStore,
        flow: &FlowType,
        categories: &[S],
    ) -> Result<()> {
        let key = match flow {
            FlowType::Income => INCOME_CATEGORIES_KEY,
            FlowType::Expense => EXPENSE_CATEGORIES_KEY,
            FlowType::ExpenseByPerson(_) => {
                return Err(FinanceError::InvalidInput(
                    "per-person ledgers share the expense category list".into(),
                ))
            }
        };
        store.set_setting(key, &join_list(categories))
    }

    pub fn set_people<S: AsRef<str>>(store: &dyn LedgerStore, people: &[S]) -> Result<()> {
        for person in people {
            let name = person.as_ref();
            if name.trim().is_empty() {
                continue;
            }
            FlowType::expense_for(name)?;
        }
        store.set_setting(EXPENSE_PEOPLE_KEY, &join_list(people))
    }
}
