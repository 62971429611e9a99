//! Monthly aggregation of normalized line items into totals and a running balance.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::currency::NormalizedLine;
use crate::ledger::{FlowType, MonthKey};

/// Derived monthly totals in EUR. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    pub month: MonthKey,
    pub total_income: f64,
    pub total_expense: f64,
    pub net: f64,
    pub savings_start: f64,
    pub savings_end: f64,
}

#[derive(Default)]
struct MonthTotals {
    income: f64,
    expense: f64,
}

/// Groups lines per month and threads a running balance seeded by `starting_savings`.
///
/// Only `income` and the combined `expense` ledger count towards totals; per-person
/// expense rows describe the same money and are skipped. Months appear when they hold
/// at least one income or combined-expense row.
pub fn summarize(lines: &[NormalizedLine], starting_savings: f64) -> Vec<MonthlySummary> {
    let mut by_month: BTreeMap<MonthKey, MonthTotals> = BTreeMap::new();
    for line in lines {
        match line.item.flow_type {
            FlowType::Income => by_month.entry(line.item.month).or_default().income += line.amount_eur,
            FlowType::Expense => {
                by_month.entry(line.item.month).or_default().expense += line.amount_eur
            }
            FlowType::ExpenseByPerson(_) => {}
        }
    }

    let mut balance = starting_savings;
    let rows: Vec<MonthlySummary> = by_month
        .into_iter()
        .map(|(month, totals)| {
            let net = totals.income - totals.expense;
            let savings_start = balance;
            balance += net;
            MonthlySummary {
                month,
                total_income: totals.income,
                total_expense: totals.expense,
                net,
                savings_start,
                savings_end: balance,
            }
        })
        .collect();

    tracing::debug!(lines = lines.len(), months = rows.len(), "summarized ledger");
    rows
}

/// Month → category → EUR amount for one flow type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub flow_type: Option<FlowType>,
    pub categories: Vec<String>,
    pub months: BTreeMap<MonthKey, BTreeMap<String, f64>>,
}

impl CategoryBreakdown {
    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    /// Amount for a cell, 0.0 when the category had no row that month.
    pub fn amount(&self, month: &MonthKey, category: &str) -> f64 {
        self.months
            .get(month)
            .and_then(|row| row.get(category))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn category_total(&self, category: &str) -> f64 {
        self.months
            .values()
            .filter_map(|row| row.get(category))
            .sum()
    }
}

/// Pivots normalized lines of `flow` into a per-month category table.
pub fn category_breakdown(lines: &[NormalizedLine], flow: &FlowType) -> CategoryBreakdown {
    let mut breakdown = CategoryBreakdown {
        flow_type: Some(flow.clone()),
        ..CategoryBreakdown::default()
    };
    for line in lines.iter().filter(|line| &line.item.flow_type == flow) {
        if !breakdown.categories.contains(&line.item.category) {
            breakdown.categories.push(line.item.category.clone());
        }
        *breakdown
            .months
            .entry(line.item.month)
            .or_default()
            .entry(line.item.category.clone())
            .or_insert(0.0) += line.amount_eur;
    }
    breakdown.categories.sort();
    breakdown
}

/// Checks that every row continues the previous balance by exactly its net.
pub fn running_balance_holds(rows: &[MonthlySummary], starting_savings: f64, tolerance: f64) -> bool {
    let mut previous = starting_savings;
    rows.iter().all(|row| {
        let consistent = (row.savings_start - previous).abs() <= tolerance
            && (row.savings_end - (previous + row.net)).abs() <= tolerance
            && (row.net - (row.total_income - row.total_expense)).abs() <= tolerance;
        previous = row.savings_end;
        consistent
    })
}
