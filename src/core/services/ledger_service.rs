use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    currency::{normalize, Currency, FxTable},
    errors::{FinanceError, Result},
    ledger::{EntryLine, FlowType, LineItem, MonthKey},
    storage::{LedgerStore, Partition},
    summary::summarize,
};

/// Expense side of a month entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpenseInput {
    /// Lines entered directly into the combined household ledger.
    Combined(Vec<EntryLine>),
    /// Lines per person; the combined ledger is derived by summing categories.
    PerPerson(BTreeMap<String, Vec<EntryLine>>),
}

impl Default for ExpenseInput {
    fn default() -> Self {
        ExpenseInput::Combined(Vec::new())
    }
}

impl ExpenseInput {
    fn all_lines(&self) -> Box<dyn Iterator<Item = &EntryLine> + '_> {
        match self {
            ExpenseInput::Combined(lines) => Box::new(lines.iter()),
            ExpenseInput::PerPerson(people) => Box::new(people.values().flatten()),
        }
    }
}

/// Everything entered for one month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthEntry {
    pub month: MonthKey,
    pub income: Vec<EntryLine>,
    pub expenses: ExpenseInput,
    /// EUR per RUB for this month.
    pub fx_rate: Option<f64>,
}

impl MonthEntry {
    pub fn new(month: MonthKey) -> Self {
        Self {
            month,
            income: Vec::new(),
            expenses: ExpenseInput::default(),
            fx_rate: None,
        }
    }

    /// Raw RUB amount across income lines.
    pub fn foreign_income(&self) -> f64 {
        self.income
            .iter()
            .filter(|line| line.resolved_currency().is_foreign())
            .map(|line| line.amount)
            .sum()
    }

    pub fn has_negative_expenses(&self) -> bool {
        self.expenses.all_lines().any(|line| line.amount < 0.0)
    }
}

/// Totals shown before a month is saved, in EUR.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthPreview {
    pub month: MonthKey,
    pub total_income: f64,
    pub total_expense: f64,
    pub net: f64,
    pub foreign_income_eur: f64,
    /// Negative expense lines act as refunds or corrections.
    pub has_negative_expenses: bool,
}

pub struct LedgerService;

impl LedgerService {
    /// Checks an entry without touching the store.
    pub fn validate(entry: &MonthEntry) -> Result<()> {
        if let Some(rate) = entry.fx_rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(FinanceError::InvalidInput(format!(
                    "exchange rate must be a non-negative number, got {}",
                    rate
                )));
            }
        }
        let has_rate = entry.fx_rate.map(|rate| rate > 0.0).unwrap_or(false);
        if entry.foreign_income() > 0.0 && !has_rate {
            return Err(FinanceError::MissingExchangeRate(entry.month));
        }
        Ok(())
    }

    /// Store partitions for an entry: `income`, the combined `expense` ledger and,
    /// for per-person input, one partition per person.
    pub fn partitions(entry: &MonthEntry) -> Result<Vec<Partition>> {
        let mut partitions = vec![Partition::new(FlowType::Income, entry.income.clone())];
        match &entry.expenses {
            ExpenseInput::Combined(lines) => {
                partitions.push(Partition::new(FlowType::Expense, lines.clone()));
            }
            ExpenseInput::PerPerson(people) => {
                partitions.push(Partition::new(FlowType::Expense, combine(people)?));
                let mut names: BTreeMap<FlowType, &str> = BTreeMap::new();
                for (person, lines) in people {
                    let flow = FlowType::expense_for(person)?;
                    if let Some(previous) = names.insert(flow.clone(), person) {
                        return Err(FinanceError::InvalidInput(format!(
                            "`{}` and `{}` name the same person ledger `{}`",
                            previous, person, flow
                        )));
                    }
                    partitions.push(Partition::new(flow, lines.clone()));
                }
            }
        }
        Ok(partitions)
    }

    /// Computes EUR totals for an entry through the same normalize/summarize path
    /// the reports use.
    pub fn preview(entry: &MonthEntry) -> Result<MonthPreview> {
        let items: Vec<LineItem> = Self::partitions(entry)?
            .iter()
            .filter(|partition| partition.flow_type.is_canonical())
            .flat_map(|partition| {
                partition
                    .lines
                    .iter()
                    .map(|line| LineItem::from_entry(entry.month, partition.flow_type.clone(), line))
            })
            .collect();

        let mut fx = FxTable::new();
        if let Some(rate) = entry.fx_rate {
            fx.insert(entry.month, rate);
        }
        let normalization = normalize(&items, &fx);
        let foreign_income_eur = normalization
            .lines
            .iter()
            .filter(|line| line.item.flow_type == FlowType::Income && line.item.is_foreign())
            .map(|line| line.amount_eur)
            .sum();

        let row = summarize(&normalization.lines, 0.0).into_iter().next();
        let (total_income, total_expense) = row
            .map(|row| (row.total_income, row.total_expense))
            .unwrap_or((0.0, 0.0));

        Ok(MonthPreview {
            month: entry.month,
            total_income,
            total_expense,
            net: total_income - total_expense,
            foreign_income_eur,
            has_negative_expenses: entry.has_negative_expenses(),
        })
    }

    /// Fills a missing rate from the store so re-entering a month keeps its rate.
    pub fn with_stored_rate(store: &dyn LedgerStore, entry: &MonthEntry) -> Result<MonthEntry> {
        let mut resolved = entry.clone();
        if resolved.fx_rate.is_none() {
            resolved.fx_rate = store.get_fx_rate(&entry.month)?;
        }
        Ok(resolved)
    }

    pub fn month_exists(store: &dyn LedgerStore, month: &MonthKey) -> Result<bool> {
        Ok(!store.load_line_items(month)?.is_empty())
    }

    /// Validates, then replaces every partition of the month in one store call and
    /// records a positive rate. Person ledgers absent from the entry are emptied in
    /// the same call. Nothing is written when validation fails.
    pub fn save_month(store: &dyn LedgerStore, entry: &MonthEntry) -> Result<MonthPreview> {
        let entry = Self::with_stored_rate(store, entry)?;
        Self::validate(&entry)?;
        let mut partitions = Self::partitions(&entry)?;
        let stale = stale_person_ledgers(store, &entry.month, &partitions)?;
        partitions.extend(stale.into_iter().map(|flow| Partition::new(flow, Vec::new())));
        let preview = Self::preview(&entry)?;

        store.replace_month(&entry.month, &partitions)?;
        if let Some(rate) = entry.fx_rate.filter(|rate| *rate > 0.0) {
            store.upsert_fx_rate(&entry.month, rate)?;
        }
        tracing::info!(
            month = %entry.month,
            partitions = partitions.len(),
            net = preview.net,
            "month saved"
        );
        Ok(preview)
    }

    pub fn set_fx_rate(store: &dyn LedgerStore, month: &MonthKey, rate: f64) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(FinanceError::InvalidInput(format!(
                "exchange rate must be positive, got {}",
                rate
            )));
        }
        store.upsert_fx_rate(month, rate)?;
        tracing::info!(%month, rate, "exchange rate recorded");
        Ok(())
    }

    /// Form lines for `flow`: the advisory categories at 0.0 with stored amounts
    /// merged in. Stored categories missing from the list are appended so that
    /// re-saving the form never drops them.
    pub fn editor_lines(
        store: &dyn LedgerStore,
        month: &MonthKey,
        flow: &FlowType,
        categories: &[String],
    ) -> Result<Vec<EntryLine>> {
        let existing: Vec<LineItem> = store
            .load_line_items(month)?
            .into_iter()
            .filter(|item| &item.flow_type == flow)
            .collect();

        let mut lines: Vec<EntryLine> = categories
            .iter()
            .map(|category| match existing.iter().find(|item| &item.category == category) {
                Some(item) => stored_line(item),
                None => EntryLine::new(category.clone(), 0.0),
            })
            .collect();
        for item in &existing {
            if !categories.contains(&item.category) {
                lines.push(stored_line(item));
            }
        }
        Ok(lines)
    }
}

fn stored_line(item: &LineItem) -> EntryLine {
    EntryLine::new(item.category.clone(), item.amount).with_currency(item.currency)
}

/// Stored `expense_<person>` flow types of `month` that `partitions` does not rewrite.
fn stale_person_ledgers(
    store: &dyn LedgerStore,
    month: &MonthKey,
    partitions: &[Partition],
) -> Result<Vec<FlowType>> {
    let mut stale: Vec<FlowType> = store
        .load_line_items(month)?
        .into_iter()
        .map(|item| item.flow_type)
        .filter(|flow| matches!(flow, FlowType::ExpenseByPerson(_)))
        .filter(|flow| partitions.iter().all(|partition| &partition.flow_type != flow))
        .collect();
    stale.sort();
    stale.dedup();
    Ok(stale)
}

/// Sums per-person lines by category, keeping first-appearance order.
fn combine(people: &BTreeMap<String, Vec<EntryLine>>) -> Result<Vec<EntryLine>> {
    let mut combined: Vec<(String, f64, Currency)> = Vec::new();
    for line in people.values().flatten() {
        let currency = line.resolved_currency();
        match combined.iter_mut().find(|(category, _, _)| category == &line.category) {
            Some((_, amount, existing)) => {
                if *existing != currency {
                    return Err(FinanceError::InvalidInput(format!(
                        "category `{}` is entered in both {} and {}",
                        line.category,
                        existing.code(),
                        currency.code()
                    )));
                }
                *amount += line.amount;
            }
            None => combined.push((line.category.clone(), line.amount, currency)),
        }
    }
    Ok(combined
        .into_iter()
        .map(|(category, amount, currency)| EntryLine::new(category, amount).with_currency(currency))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryLedgerStore;

    fn month(raw: &str) -> MonthKey {
        MonthKey::parse(raw).unwrap()
    }

    fn per_person_entry() -> MonthEntry {
        let mut people = BTreeMap::new();
        people.insert(
            "Ben".to_string(),
            vec![EntryLine::new("Groceries", 120.0), EntryLine::new("Rent", 600.0)],
        );
        people.insert(
            "Tatiana".to_string(),
            vec![EntryLine::new("Rent", 600.0), EntryLine::new("Groceries", -20.0)],
        );
        MonthEntry {
            month: month("2025-11"),
            income: vec![EntryLine::new("Salary", 3_000.0), EntryLine::new("salary_moscow", 100_000.0)],
            expenses: ExpenseInput::PerPerson(people),
            fx_rate: Some(0.0102),
        }
    }

    #[test]
    fn per_person_expenses_are_combined_by_category() {
        let partitions = LedgerService::partitions(&per_person_entry()).unwrap();
        assert_eq!(partitions.len(), 4);
        let combined = &partitions[1];
        assert_eq!(combined.flow_type, FlowType::Expense);
        assert_eq!(combined.lines[0].category, "Groceries");
        assert_eq!(combined.lines[0].amount, 100.0);
        assert_eq!(combined.lines[1].amount, 1_200.0);
        assert_eq!(partitions[2].flow_type, FlowType::ExpenseByPerson("ben".into()));
        assert_eq!(partitions[3].flow_type, FlowType::ExpenseByPerson("tatiana".into()));
    }

    #[test]
    fn preview_converts_foreign_income() {
        let preview = LedgerService::preview(&per_person_entry()).unwrap();
        assert!((preview.foreign_income_eur - 1_020.0).abs() < 1e-9);
        assert!((preview.total_income - 4_020.0).abs() < 1e-9);
        assert!((preview.total_expense - 1_300.0).abs() < 1e-9);
        assert!((preview.net - 2_720.0).abs() < 1e-9);
        assert!(preview.has_negative_expenses);
    }

    #[test]
    fn foreign_income_without_rate_writes_nothing() {
        let store = MemoryLedgerStore::new();
        let mut entry = per_person_entry();
        entry.fx_rate = None;
        assert!(matches!(
            LedgerService::save_month(&store, &entry),
            Err(FinanceError::MissingExchangeRate(_))
        ));
        entry.fx_rate = Some(0.0);
        assert!(LedgerService::save_month(&store, &entry).is_err());
        entry.fx_rate = Some(-1.0);
        assert!(matches!(
            LedgerService::save_month(&store, &entry),
            Err(FinanceError::InvalidInput(_))
        ));
        assert!(store.load_all_line_items().unwrap().is_empty());
        assert!(store.load_all_fx_rates().unwrap().is_empty());
    }

    #[test]
    fn save_replaces_month_and_records_rate() {
        let store = MemoryLedgerStore::new();
        let entry = per_person_entry();
        LedgerService::save_month(&store, &entry).unwrap();
        assert_eq!(store.load_line_items(&entry.month).unwrap().len(), 8);
        assert_eq!(store.get_fx_rate(&entry.month).unwrap(), Some(0.0102));

        let mut smaller = MonthEntry::new(entry.month);
        smaller.income = vec![EntryLine::new("Salary", 2_000.0)];
        smaller.expenses = ExpenseInput::Combined(vec![EntryLine::new("Rent", 900.0)]);
        LedgerService::save_month(&store, &smaller).unwrap();
        let items = store.load_line_items(&entry.month).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.flow_type.is_canonical()));
        assert_eq!(store.get_fx_rate(&entry.month).unwrap(), Some(0.0102));
    }

    #[test]
    fn dropped_person_ledgers_are_cleared() {
        let store = MemoryLedgerStore::new();
        let m = month("2025-03");
        let mut people = BTreeMap::new();
        people.insert("Ben".to_string(), vec![EntryLine::new("Rent", 600.0)]);
        people.insert("Tatiana".to_string(), vec![EntryLine::new("Rent", 400.0)]);
        let mut entry = MonthEntry::new(m);
        entry.expenses = ExpenseInput::PerPerson(people);
        LedgerService::save_month(&store, &entry).unwrap();

        let mut only_ben = BTreeMap::new();
        only_ben.insert("Ben".to_string(), vec![EntryLine::new("Rent", 700.0)]);
        entry.expenses = ExpenseInput::PerPerson(only_ben);
        LedgerService::save_month(&store, &entry).unwrap();

        let items = store.load_line_items(&m).unwrap();
        let combined: f64 = items
            .iter()
            .filter(|item| item.flow_type == FlowType::Expense)
            .map(|item| item.amount)
            .sum();
        let per_person: f64 = items
            .iter()
            .filter(|item| matches!(item.flow_type, FlowType::ExpenseByPerson(_)))
            .map(|item| item.amount)
            .sum();
        assert_eq!(combined, 700.0);
        assert_eq!(per_person, 700.0);
        assert!(items
            .iter()
            .all(|item| item.flow_type != FlowType::ExpenseByPerson("tatiana".into())));
    }

    #[test]
    fn people_sharing_a_ledger_key_are_rejected() {
        let store = MemoryLedgerStore::new();
        let mut people = BTreeMap::new();
        people.insert("Ann Lee".to_string(), vec![EntryLine::new("Rent", 600.0)]);
        people.insert("ann lee".to_string(), vec![EntryLine::new("Food", 400.0)]);
        let mut entry = MonthEntry::new(month("2025-04"));
        entry.expenses = ExpenseInput::PerPerson(people);

        assert!(matches!(
            LedgerService::partitions(&entry),
            Err(FinanceError::InvalidInput(_))
        ));
        assert!(LedgerService::save_month(&store, &entry).is_err());
        assert!(store.load_all_line_items().unwrap().is_empty());
    }

    #[test]
    fn stored_rate_satisfies_validation() {
        let store = MemoryLedgerStore::new();
        let m = month("2025-12");
        LedgerService::set_fx_rate(&store, &m, 0.011).unwrap();
        let mut entry = MonthEntry::new(m);
        entry.income = vec![EntryLine::new("salary_moscow", 10_000.0)];
        let preview = LedgerService::save_month(&store, &entry).unwrap();
        assert!((preview.total_income - 110.0).abs() < 1e-9);
        assert!(LedgerService::set_fx_rate(&store, &m, 0.0).is_err());
    }

    #[test]
    fn editor_lines_merge_stored_amounts() {
        let store = MemoryLedgerStore::new();
        let m = month("2025-10");
        store
            .replace_line_items(
                &m,
                &FlowType::Expense,
                &[EntryLine::new("Rent", 950.0), EntryLine::new("Gym", 40.0)],
            )
            .unwrap();
        let categories = vec!["Rent".to_string(), "Groceries".to_string()];
        let lines = LedgerService::editor_lines(&store, &m, &FlowType::Expense, &categories).unwrap();
        let pairs: Vec<(&str, f64)> = lines.iter().map(|l| (l.category.as_str(), l.amount)).collect();
        assert_eq!(pairs, vec![("Rent", 950.0), ("Groceries", 0.0), ("Gym", 40.0)]);
        assert!(LedgerService::month_exists(&store, &m).unwrap());
        assert!(!LedgerService::month_exists(&store, &month("2025-09")).unwrap());
    }
}
