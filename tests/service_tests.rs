mod common;

use std::collections::BTreeMap;

use household_finance::{
    core::services::{
        ExpenseInput, ForecastRequest, ForecastService, LedgerService, MonthEntry,
        SettingsService, SummaryService,
    },
    errors::FinanceError,
    forecast::{ForecastMode, Scenario},
    ledger::{EntryLine, FlowType},
    storage::LedgerStore,
};

use common::{month, seed_months, setup_test_env};

fn per_person_entry(raw_month: &str) -> MonthEntry {
    let mut people = BTreeMap::new();
    people.insert(
        "Ben".to_string(),
        vec![EntryLine::new("Rent", 600.0), EntryLine::new("Food", 150.0)],
    );
    people.insert(
        "Tatiana".to_string(),
        vec![EntryLine::new("Rent", 600.0), EntryLine::new("Travel", 80.0)],
    );
    MonthEntry {
        month: month(raw_month),
        income: vec![
            EntryLine::new("Salary", 3_000.0),
            EntryLine::new("salary_moscow", 100_000.0),
        ],
        expenses: ExpenseInput::PerPerson(people),
        fx_rate: Some(0.01),
    }
}

#[test]
fn per_person_month_counts_expenses_once() {
    let (store, _) = setup_test_env();
    let preview = LedgerService::save_month(&store, &per_person_entry("2025-03")).unwrap();
    assert_eq!(preview.total_income, 4_000.0);
    assert_eq!(preview.total_expense, 1_430.0);

    let report = SummaryService::summary(&store).unwrap();
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].total_expense, 1_430.0);
    assert_eq!(report.rows[0].net, preview.net);

    let items = store.load_line_items(&month("2025-03")).unwrap();
    let combined_rent = items
        .iter()
        .find(|item| item.flow_type == FlowType::Expense && item.category == "Rent")
        .unwrap();
    assert_eq!(combined_rent.amount, 1_200.0);
    assert_eq!(store.get_fx_rate(&month("2025-03")).unwrap(), Some(0.01));
}

#[test]
fn foreign_income_without_rate_is_blocked() {
    let (store, _) = setup_test_env();
    let mut entry = per_person_entry("2025-04");
    entry.fx_rate = None;
    assert!(matches!(
        LedgerService::save_month(&store, &entry),
        Err(FinanceError::MissingExchangeRate(_))
    ));
    assert!(store.load_all_line_items().unwrap().is_empty());

    LedgerService::set_fx_rate(&store, &month("2025-04"), 0.0105).unwrap();
    let preview = LedgerService::save_month(&store, &entry).unwrap();
    assert!((preview.foreign_income_eur - 1_050.0).abs() < 1e-6);
}

#[test]
fn summary_reports_missing_rates() {
    let (store, _) = setup_test_env();
    store
        .replace_line_items(
            &month("2025-05"),
            &FlowType::Income,
            &[EntryLine::new("salary_moscow", 50_000.0), EntryLine::new("Salary", 1_000.0)],
        )
        .unwrap();
    let report = SummaryService::summary(&store).unwrap();
    assert_eq!(report.missing_fx_months, vec![month("2025-05")]);
    assert_eq!(report.rows[0].total_income, 1_000.0);
}

#[test]
fn dashboard_uses_starting_savings() {
    let (store, _) = setup_test_env();
    SettingsService::ensure_defaults(&store).unwrap();
    SettingsService::set_starting_savings(&store, 10_000.0).unwrap();
    seed_months(&store, "2025-01", 3, 0.0);

    let dashboard = SummaryService::dashboard(&store).unwrap();
    assert_eq!(dashboard.summary.starting_savings, 10_000.0);
    assert_eq!(dashboard.summary.current_savings(), 10_000.0 + 3.0 * 1_400.0);
    assert_eq!(dashboard.expense_breakdown.category_total("Rent"), 3_600.0);
    assert_eq!(dashboard.income_breakdown.categories, vec!["Salary"]);
}

#[test]
fn forecast_modes_follow_history_length() {
    let (store, _) = setup_test_env();
    seed_months(&store, "2024-01", 4, 15.0);
    let short = ForecastService::forecast(&store, &ForecastRequest::default().with_periods(2)).unwrap();
    assert_eq!(short.forecast.mode, ForecastMode::NetOnly);
    assert!(short.forecast.projected().all(|row| row.total_income.is_none()));

    seed_months(&store, "2024-01", 9, 15.0);
    let request = ForecastRequest::default()
        .with_periods(3)
        .with_scenario(Scenario::new(5.0, 0.0));
    let long = ForecastService::forecast(&store, &request).unwrap();
    assert_eq!(long.forecast.mode, ForecastMode::Separable);
    assert_eq!(long.forecast.rows.len(), 12);
    assert!(long.forecast.projected().all(|row| row.total_income.is_some()));
}

#[test]
fn forecast_refuses_single_month() {
    let (store, _) = setup_test_env();
    seed_months(&store, "2025-01", 1, 0.0);
    assert!(matches!(
        ForecastService::forecast(&store, &ForecastRequest::default()),
        Err(FinanceError::InsufficientHistory { required: 2, available: 1 })
    ));
}

#[test]
fn combined_resave_clears_person_ledgers() {
    let (store, _) = setup_test_env();
    LedgerService::save_month(&store, &per_person_entry("2025-06")).unwrap();

    let mut combined = per_person_entry("2025-06");
    combined.expenses = ExpenseInput::Combined(vec![EntryLine::new("Rent", 1_100.0)]);
    LedgerService::save_month(&store, &combined).unwrap();

    let items = store.load_line_items(&month("2025-06")).unwrap();
    assert!(items.iter().all(|item| item.flow_type.is_canonical()));
    assert_eq!(
        items
            .iter()
            .filter(|item| item.flow_type == FlowType::Expense)
            .count(),
        1
    );
}
