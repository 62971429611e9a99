use std::collections::BTreeMap;

use strsim::levenshtein;

use crate::errors::FinanceError;

use super::FlowType;

pub const STARTING_SAVINGS_KEY: &str = "starting_savings";
pub const INCOME_CATEGORIES_KEY: &str = "income_categories";
pub const EXPENSE_CATEGORIES_KEY: &str = "expense_categories";
pub const EXPENSE_PEOPLE_KEY: &str = "expense_people";

/// Values written on first use when a key is absent.
pub const DEFAULT_SETTINGS: [(&str, &str); 4] = [
    (STARTING_SAVINGS_KEY, "0"),
    (EXPENSE_CATEGORIES_KEY, "Rent,Groceries,Transport,Utilities,Other"),
    (INCOME_CATEGORIES_KEY, "Salary,Other_income"),
    (EXPENSE_PEOPLE_KEY, ""),
];

/// Typed view over the scalar settings map.
///
/// Category lists are advisory labels for data entry. Nothing stops a ledger row
/// from using a category that is not listed here.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub starting_savings: f64,
    pub income_categories: Vec<String>,
    pub expense_categories: Vec<String>,
    pub expense_people: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_map(&BTreeMap::new()).unwrap_or(Self {
            starting_savings: 0.0,
            income_categories: Vec::new(),
            expense_categories: Vec::new(),
            expense_people: Vec::new(),
        })
    }
}

impl Settings {
    /// Parses the raw map, falling back to defaults for missing keys.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, FinanceError> {
        let lookup = |key: &str| -> &str {
            map.get(key).map(String::as_str).unwrap_or_else(|| {
                DEFAULT_SETTINGS
                    .iter()
                    .find(|(name, _)| *name == key)
                    .map(|(_, value)| *value)
                    .unwrap_or("")
            })
        };

        let savings_raw = lookup(STARTING_SAVINGS_KEY).trim();
        let starting_savings = if savings_raw.is_empty() {
            0.0
        } else {
            parse_amount(savings_raw)?
        };

        Ok(Self {
            starting_savings,
            income_categories: split_list(lookup(INCOME_CATEGORIES_KEY)),
            expense_categories: split_list(lookup(EXPENSE_CATEGORIES_KEY)),
            expense_people: split_list(lookup(EXPENSE_PEOPLE_KEY)),
        })
    }

    pub fn categories_for(&self, flow: &FlowType) -> &[String] {
        match flow {
            FlowType::Income => &self.income_categories,
            FlowType::Expense | FlowType::ExpenseByPerson(_) => &self.expense_categories,
        }
    }

    pub fn is_known_category(&self, flow: &FlowType, name: &str) -> bool {
        self.categories_for(flow)
            .iter()
            .any(|known| known.eq_ignore_ascii_case(name.trim()))
    }

    /// Closest advisory category to `name`, when one is reasonably near.
    pub fn suggest_category(&self, flow: &FlowType, name: &str) -> Option<&str> {
        let needle = name.trim().to_lowercase();
        let threshold = (needle.len() / 3).max(2);
        self.categories_for(flow)
            .iter()
            .map(|known| (levenshtein(&known.to_lowercase(), &needle), known))
            .filter(|(distance, _)| *distance > 0 && *distance <= threshold)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, known)| known.as_str())
    }
}

/// Splits a comma-separated list, trimming entries and dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| item.as_ref().trim())
        .filter(|item| !item.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn parse_amount(raw: &str) -> Result<f64, FinanceError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| FinanceError::InvalidInput(format!("`{}` is not a number", raw)))?;
    if !value.is_finite() {
        return Err(FinanceError::InvalidInput(format!(
            "`{}` is not a finite amount",
            raw
        )));
    }
    Ok(value)
}
