use std::fmt;

use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::errors::FinanceError;

use super::MonthKey;

const EXPENSE_PERSON_PREFIX: &str = "expense_";

/// Ledger partition a line item belongs to.
///
/// `Expense` is the combined household ledger used for totals; `ExpenseByPerson`
/// rows are informational breakdowns of the same spending.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FlowType {
    Income,
    Expense,
    ExpenseByPerson(String),
}

impl FlowType {
    pub fn expense_for(person: &str) -> Result<Self, FinanceError> {
        let slug = person_slug(person);
        if slug.is_empty() {
            return Err(FinanceError::InvalidInput(
                "person name cannot be empty".into(),
            ));
        }
        Ok(FlowType::ExpenseByPerson(slug))
    }

    pub fn parse(raw: &str) -> Result<Self, FinanceError> {
        let value = raw.trim().to_lowercase();
        match value.as_str() {
            "income" => Ok(FlowType::Income),
            "expense" => Ok(FlowType::Expense),
            other => match other.strip_prefix(EXPENSE_PERSON_PREFIX) {
                Some(person) => FlowType::expense_for(person),
                None => Err(FinanceError::InvalidInput(format!(
                    "unknown flow type `{}`",
                    raw
                ))),
            },
        }
    }

    /// True for flow types that feed monthly totals.
    pub fn is_canonical(&self) -> bool {
        matches!(self, FlowType::Income | FlowType::Expense)
    }

    pub fn is_expense(&self) -> bool {
        !matches!(self, FlowType::Income)
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowType::Income => f.write_str("income"),
            FlowType::Expense => f.write_str("expense"),
            FlowType::ExpenseByPerson(person) => write!(f, "{}{}", EXPENSE_PERSON_PREFIX, person),
        }
    }
}

impl TryFrom<String> for FlowType {
    type Error = FinanceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FlowType::parse(&value)
    }
}

impl From<FlowType> for String {
    fn from(value: FlowType) -> Self {
        value.to_string()
    }
}

fn person_slug(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// One categorized amount inside a (month, flow type) partition, as handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryLine {
    pub category: String,
    pub amount: f64,
    pub currency: Option<Currency>,
}

impl EntryLine {
    pub fn new(category: impl Into<String>, amount: f64) -> Self {
        Self {
            category: category.into(),
            amount,
            currency: None,
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    /// Explicit currency, falling back to the category-name convention.
    pub fn resolved_currency(&self) -> Currency {
        self.currency
            .unwrap_or_else(|| Currency::infer_from_category(&self.category))
    }
}

impl<S: Into<String>> From<(S, f64)> for EntryLine {
    fn from((category, amount): (S, f64)) -> Self {
        EntryLine::new(category, amount)
    }
}

/// Persisted ledger row, unique per (month, flow type, category).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LineItemRow")]
pub struct LineItem {
    pub month: MonthKey,
    pub flow_type: FlowType,
    pub category: String,
    pub amount: f64,
    pub currency: Currency,
}

impl LineItem {
    pub fn new(
        month: MonthKey,
        flow_type: FlowType,
        category: impl Into<String>,
        amount: f64,
    ) -> Self {
        let category = category.into();
        let currency = Currency::infer_from_category(&category);
        Self {
            month,
            flow_type,
            category,
            amount,
            currency,
        }
    }

    pub fn from_entry(month: MonthKey, flow_type: FlowType, entry: &EntryLine) -> Self {
        Self {
            month,
            flow_type,
            category: entry.category.clone(),
            amount: entry.amount,
            currency: entry.resolved_currency(),
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn is_foreign(&self) -> bool {
        self.currency.is_foreign()
    }
}

/// Wire shape accepting rows written before the currency column existed.
#[derive(Deserialize)]
struct LineItemRow {
    month: MonthKey,
    flow_type: FlowType,
    category: String,
    amount: f64,
    #[serde(default)]
    currency: Option<Currency>,
}

impl From<LineItemRow> for LineItem {
    fn from(row: LineItemRow) -> Self {
        let currency = row
            .currency
            .unwrap_or_else(|| Currency::infer_from_category(&row.category));
        LineItem {
            month: row.month,
            flow_type: row.flow_type,
            category: row.category,
            amount: row.amount,
            currency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_types_round_trip_through_labels() {
        assert_eq!(FlowType::parse("income").unwrap(), FlowType::Income);
        assert_eq!(FlowType::parse("Expense").unwrap(), FlowType::Expense);
        let person = FlowType::parse("expense_Tatiana").unwrap();
        assert_eq!(person, FlowType::ExpenseByPerson("tatiana".into()));
        assert_eq!(person.to_string(), "expense_tatiana");
        assert!(FlowType::parse("savings").is_err());
        assert!(FlowType::parse("expense_").is_err());
    }

    #[test]
    fn only_income_and_combined_expense_are_canonical() {
        assert!(FlowType::Income.is_canonical());
        assert!(FlowType::Expense.is_canonical());
        assert!(!FlowType::ExpenseByPerson("ben".into()).is_canonical());
    }

    #[test]
    fn legacy_rows_infer_currency_from_category() {
        let json = r#"{"month":"2025-01","flow_type":"income","category":"Salary_Moscow","amount":120000.0}"#;
        let item: LineItem = serde_json::from_str(json).expect("legacy row");
        assert_eq!(item.currency, Currency::Rub);

        let explicit = r#"{"month":"2025-01","flow_type":"income","category":"Salary_Moscow","amount":10.0,"currency":"EUR"}"#;
        let item: LineItem = serde_json::from_str(explicit).expect("explicit row");
        assert_eq!(item.currency, Currency::Eur);
    }

    #[test]
    fn entry_lines_prefer_explicit_currency() {
        let inferred = EntryLine::new("credit moscow", 5.0);
        assert_eq!(inferred.resolved_currency(), Currency::Rub);
        let explicit = EntryLine::new("credit moscow", 5.0).with_currency(Currency::Eur);
        assert_eq!(explicit.resolved_currency(), Currency::Eur);
    }
}
