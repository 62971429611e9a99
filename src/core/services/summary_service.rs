use serde::Serialize;

use crate::{
    currency::{normalize, Normalization},
    errors::Result,
    ledger::{FlowType, MonthKey, Settings},
    storage::LedgerStore,
    summary::{category_breakdown, summarize, CategoryBreakdown, MonthlySummary},
};

use super::SettingsService;

/// Monthly totals plus the months whose foreign lines were zeroed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub starting_savings: f64,
    pub rows: Vec<MonthlySummary>,
    pub missing_fx_months: Vec<MonthKey>,
}

impl SummaryReport {
    pub fn latest(&self) -> Option<&MonthlySummary> {
        self.rows.last()
    }

    pub fn current_savings(&self) -> f64 {
        self.latest()
            .map(|row| row.savings_end)
            .unwrap_or(self.starting_savings)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub summary: SummaryReport,
    pub missing_fx_months: Vec<MonthKey>,
    pub expense_breakdown: CategoryBreakdown,
    pub income_breakdown: CategoryBreakdown,
}

pub struct SummaryService;

impl SummaryService {
    /// Loads every line and rate and converts them to EUR.
    pub fn normalized(store: &dyn LedgerStore) -> Result<Normalization> {
        let lines = store.load_all_line_items()?;
        let fx = store.load_all_fx_rates()?;
        Ok(normalize(&lines, &fx))
    }

    pub fn summary(store: &dyn LedgerStore) -> Result<SummaryReport> {
        let settings = SettingsService::load(store)?;
        let normalization = Self::normalized(store)?;
        Ok(Self::report(&settings, &normalization))
    }

    pub fn breakdown(store: &dyn LedgerStore, flow: &FlowType) -> Result<CategoryBreakdown> {
        let normalization = Self::normalized(store)?;
        Ok(category_breakdown(&normalization.lines, flow))
    }

    pub fn dashboard(store: &dyn LedgerStore) -> Result<Dashboard> {
        let settings = SettingsService::load(store)?;
        let normalization = Self::normalized(store)?;
        let summary = Self::report(&settings, &normalization);
        Ok(Dashboard {
            missing_fx_months: normalization.missing_fx_months.clone(),
            expense_breakdown: category_breakdown(&normalization.lines, &FlowType::Expense),
            income_breakdown: category_breakdown(&normalization.lines, &FlowType::Income),
            summary,
        })
    }

    fn report(settings: &Settings, normalization: &Normalization) -> SummaryReport {
        SummaryReport {
            starting_savings: settings.starting_savings,
            rows: summarize(&normalization.lines, settings.starting_savings),
            missing_fx_months: normalization.missing_fx_months.clone(),
        }
    }
}
