//! Currency handling: the EUR reporting currency, the single foreign currency (RUB),
//! per-month conversion rates and the normalizer that brings line items into EUR.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ledger::{LineItem, MonthKey};

/// Substring that marks a category as RUB-denominated in rows without an explicit currency.
pub const FOREIGN_CATEGORY_MARKER: &str = "moscow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Rub,
}

impl Currency {
    pub const REPORTING: Currency = Currency::Eur;

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Rub => "RUB",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Eur => "€",
            Currency::Rub => "₽",
        }
    }

    pub fn is_foreign(&self) -> bool {
        *self != Currency::REPORTING
    }

    /// Back-compat inference for rows that predate the explicit currency field.
    pub fn infer_from_category(category: &str) -> Currency {
        if is_foreign(category) {
            Currency::Rub
        } else {
            Currency::Eur
        }
    }

    pub fn parse(raw: &str) -> Option<Currency> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "EUR" => Some(Currency::Eur),
            "RUB" => Some(Currency::Rub),
            _ => None,
        }
    }
}

/// Category-name convention: a category is RUB-denominated iff it mentions Moscow.
pub fn is_foreign(category: &str) -> bool {
    category.to_lowercase().contains(FOREIGN_CATEGORY_MARKER)
}

/// RUB→EUR rate recorded for one month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FxRate {
    pub month: MonthKey,
    pub rate: f64,
}

/// Month → RUB→EUR rate lookup.
pub type FxTable = BTreeMap<MonthKey, f64>;

/// Returns the usable rate for `month`, ignoring non-positive or non-finite entries.
pub fn usable_rate(fx: &FxTable, month: &MonthKey) -> Option<f64> {
    fx.get(month)
        .copied()
        .filter(|rate| rate.is_finite() && *rate > 0.0)
}

/// A line item with its amount expressed in the reporting currency.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLine {
    pub item: LineItem,
    pub amount_eur: f64,
}

/// Output of [`normalize`]: converted lines plus the months that lacked a rate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalization {
    pub lines: Vec<NormalizedLine>,
    /// Months holding non-zero foreign activity without a positive rate. Their
    /// foreign lines were counted as 0.0 EUR; callers must surface this.
    pub missing_fx_months: Vec<MonthKey>,
}

impl Normalization {
    pub fn has_missing_rates(&self) -> bool {
        !self.missing_fx_months.is_empty()
    }
}

/// Converts every line to EUR. Foreign lines without a usable rate become 0.0
/// rather than being summed at face value.
pub fn normalize(lines: &[LineItem], fx: &FxTable) -> Normalization {
    let mut missing = BTreeSet::new();
    let normalized = lines
        .iter()
        .map(|item| {
            let amount_eur = if item.is_foreign() {
                match usable_rate(fx, &item.month) {
                    Some(rate) => item.amount * rate,
                    None => {
                        if item.amount != 0.0 {
                            missing.insert(item.month);
                        }
                        0.0
                    }
                }
            } else {
                item.amount
            };
            NormalizedLine {
                item: item.clone(),
                amount_eur,
            }
        })
        .collect();

    if !missing.is_empty() {
        tracing::warn!(
            months = ?missing.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "foreign-currency lines without an exchange rate were counted as zero"
        );
    }

    Normalization {
        lines: normalized,
        missing_fx_months: missing.into_iter().collect(),
    }
}

/// Formats an EUR amount with thousands grouping and two decimals, e.g. `-1,234.50 €`.
pub fn format_eur(amount: f64) -> String {
    format!("{} {}", format_number(amount, 2), Currency::Eur.symbol())
}

pub fn format_number(value: f64, precision: usize) -> String {
    let body = format!("{:.*}", precision, value.abs());
    let (int_part, frac_part) = match body.find('.') {
        Some(pos) => (&body[..pos], &body[pos..]),
        None => (body.as_str(), ""),
    };
    let sign = if value < 0.0 && body.chars().any(|ch| ch.is_ascii_digit() && ch != '0') {
        "-"
    } else {
        ""
    };
    format!("{}{}{}", sign, group_digits(int_part, ','), frac_part)
}

fn group_digits(digits: &str, separator: char) -> String {
    let mut grouped = String::new();
    for (count, ch) in digits.chars().rev().enumerate() {
        if count != 0 && count % 3 == 0 {
            grouped.insert(0, separator);
        }
        grouped.insert(0, ch);
    }
    grouped
}
