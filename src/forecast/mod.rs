//! Savings projection: extrapolates monthly cashflow with exponential smoothing,
//! applies growth scenarios and carries the running balance forward with an
//! uncertainty band.

pub mod ets;
pub mod optimizer;

use serde::Serialize;

use crate::errors::{FinanceError, Result};
use crate::ledger::MonthKey;
use crate::summary::MonthlySummary;

pub use ets::{ExponentialSmoothing, FitError, FittedModel, SmoothingBackend};

/// Fewest historical months a forecast accepts.
pub const MIN_HISTORY_MONTHS: usize = 2;
/// From this many months on, income and expense are modelled separately.
pub const SEPARABLE_MIN_HISTORY: usize = 6;
/// Longest horizon, in months, a forecast may request.
pub const MAX_FORECAST_PERIODS: usize = 120;
/// Two-sided 95% normal quantile used for the savings band.
pub const BAND_Z: f64 = 1.96;

/// User growth assumptions, in percent, applied on top of the fitted forecast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Scenario {
    pub income_growth_pct: f64,
    pub expense_growth_pct: f64,
}

impl Scenario {
    pub fn new(income_growth_pct: f64, expense_growth_pct: f64) -> Self {
        Self {
            income_growth_pct,
            expense_growth_pct,
        }
    }

    pub fn income_factor(&self) -> f64 {
        1.0 + self.income_growth_pct / 100.0
    }

    pub fn expense_factor(&self) -> f64 {
        1.0 + self.expense_growth_pct / 100.0
    }

    /// Approximation used when only net cashflow is modelled.
    pub fn net_factor(&self) -> f64 {
        1.0 + (self.income_growth_pct - self.expense_growth_pct) / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ForecastMode {
    /// Income and expense forecast as independent series.
    Separable,
    /// Net cashflow forecast as a single series.
    NetOnly,
}

impl ForecastMode {
    pub fn for_history(months: usize) -> Self {
        if months >= SEPARABLE_MIN_HISTORY {
            ForecastMode::Separable
        } else {
            ForecastMode::NetOnly
        }
    }
}

/// One month of the combined history + projection table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    pub month: MonthKey,
    /// `None` on projected rows in net-only mode.
    pub total_income: Option<f64>,
    pub total_expense: Option<f64>,
    pub net: f64,
    pub savings_start: f64,
    pub savings_end: f64,
    pub is_forecast: bool,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl ForecastRow {
    pub fn band_width(&self) -> Option<f64> {
        Some(self.upper? - self.lower?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub rows: Vec<ForecastRow>,
    pub mode: ForecastMode,
    pub sigma: f64,
    /// Set when smoothing could not be fit and the projection is a flat
    /// continuation of the last observed values.
    pub degraded: bool,
    pub seasonal: bool,
}

impl Forecast {
    pub fn history(&self) -> impl Iterator<Item = &ForecastRow> {
        self.rows.iter().filter(|row| !row.is_forecast)
    }

    pub fn projected(&self) -> impl Iterator<Item = &ForecastRow> {
        self.rows.iter().filter(|row| row.is_forecast)
    }
}

struct Projection {
    income: Option<Vec<f64>>,
    expense: Option<Vec<f64>>,
    net: Vec<f64>,
    residuals: Vec<f64>,
    seasonal: bool,
}

/// Forecast driver, generic over the smoothing backend.
#[derive(Debug, Clone, Default)]
pub struct Forecaster<B = ExponentialSmoothing> {
    backend: B,
}

impl Forecaster<ExponentialSmoothing> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: SmoothingBackend> Forecaster<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the history followed by `periods` projected months.
    ///
    /// `scenario = None` leaves the fitted forecast untouched; a zero scenario is
    /// equivalent.
    pub fn forecast(
        &self,
        summary: &[MonthlySummary],
        starting_savings: f64,
        periods: usize,
        scenario: Option<Scenario>,
    ) -> Result<Forecast> {
        if periods == 0 || periods > MAX_FORECAST_PERIODS {
            return Err(FinanceError::InvalidInput(format!(
                "forecast horizon must be between 1 and {} months, got {}",
                MAX_FORECAST_PERIODS, periods
            )));
        }
        if summary.len() < MIN_HISTORY_MONTHS {
            return Err(FinanceError::InsufficientHistory {
                required: MIN_HISTORY_MONTHS,
                available: summary.len(),
            });
        }

        let mut history = summary.to_vec();
        history.sort_by_key(|row| row.month);
        let future_months = history[history.len() - 1].month.following(periods)?;
        let mode = ForecastMode::for_history(history.len());
        let nets: Vec<f64> = history.iter().map(|row| row.net).collect();

        let (projection, degraded) = match self.project(&history, mode, periods) {
            Ok(projection) => (projection, false),
            Err(err) => {
                tracing::warn!(error = %err, ?mode, "smoothing fit failed, using flat continuation");
                (flat_projection(&history, mode, periods), true)
            }
        };
        let projection = apply_scenario(projection, mode, scenario);

        let sigma = if degraded {
            0.0
        } else if projection.residuals.len() >= 3 {
            sample_std(&projection.residuals).unwrap_or(0.0)
        } else {
            sample_std(&nets).unwrap_or(0.0)
        };

        let mut rows = Vec::with_capacity(history.len() + periods);
        let mut balance = starting_savings;
        for row in &history {
            let savings_start = balance;
            balance += row.net;
            rows.push(ForecastRow {
                month: row.month,
                total_income: Some(row.total_income),
                total_expense: Some(row.total_expense),
                net: row.net,
                savings_start,
                savings_end: balance,
                is_forecast: false,
                lower: None,
                upper: None,
            });
        }

        for (index, month) in future_months.into_iter().enumerate() {
            let net = projection.net[index];
            let savings_start = balance;
            balance += net;
            let band = BAND_Z * sigma * ((index + 1) as f64).sqrt();
            rows.push(ForecastRow {
                month,
                total_income: projection.income.as_ref().map(|values| values[index]),
                total_expense: projection.expense.as_ref().map(|values| values[index]),
                net,
                savings_start,
                savings_end: balance,
                is_forecast: true,
                lower: Some(balance - band),
                upper: Some(balance + band),
            });
        }

        tracing::debug!(
            history = history.len(),
            periods,
            ?mode,
            sigma,
            degraded,
            "forecast computed"
        );

        Ok(Forecast {
            rows,
            mode,
            sigma,
            degraded,
            seasonal: projection.seasonal,
        })
    }

    fn project(
        &self,
        history: &[MonthlySummary],
        mode: ForecastMode,
        periods: usize,
    ) -> std::result::Result<Projection, FitError> {
        let actual_net: Vec<f64> = history.iter().map(|row| row.net).collect();
        match mode {
            ForecastMode::Separable => {
                let income: Vec<f64> = history.iter().map(|row| row.total_income).collect();
                let expense: Vec<f64> = history.iter().map(|row| row.total_expense).collect();
                let income_model = self.backend.fit(&income)?;
                let expense_model = self.backend.fit(&expense)?;

                let residuals = actual_net
                    .iter()
                    .zip(income_model.fitted_values())
                    .zip(expense_model.fitted_values())
                    .map(|((net, inc), exp)| net - (inc - exp))
                    .collect();
                let income_fc = income_model.forecast(periods);
                let expense_fc = expense_model.forecast(periods);
                let net = difference(&income_fc, &expense_fc);
                Ok(Projection {
                    seasonal: income_model.seasonal_period().is_some()
                        || expense_model.seasonal_period().is_some(),
                    income: Some(income_fc),
                    expense: Some(expense_fc),
                    net,
                    residuals,
                })
            }
            ForecastMode::NetOnly => {
                let model = self.backend.fit(&actual_net)?;
                let residuals = actual_net
                    .iter()
                    .zip(model.fitted_values())
                    .map(|(net, fitted)| net - fitted)
                    .collect();
                Ok(Projection {
                    seasonal: model.seasonal_period().is_some(),
                    income: None,
                    expense: None,
                    net: model.forecast(periods),
                    residuals,
                })
            }
        }
    }
}

/// Convenience entry point using the default smoothing backend.
pub fn forecast(
    summary: &[MonthlySummary],
    starting_savings: f64,
    periods: usize,
    scenario: Option<Scenario>,
) -> Result<Forecast> {
    Forecaster::new().forecast(summary, starting_savings, periods, scenario)
}

fn flat_projection(history: &[MonthlySummary], mode: ForecastMode, periods: usize) -> Projection {
    let last = &history[history.len() - 1];
    match mode {
        ForecastMode::Separable => {
            let income = vec![last.total_income; periods];
            let expense = vec![last.total_expense; periods];
            Projection {
                net: difference(&income, &expense),
                income: Some(income),
                expense: Some(expense),
                residuals: Vec::new(),
                seasonal: false,
            }
        }
        ForecastMode::NetOnly => Projection {
            income: None,
            expense: None,
            net: vec![last.net; periods],
            residuals: Vec::new(),
            seasonal: false,
        },
    }
}

fn apply_scenario(
    mut projection: Projection,
    mode: ForecastMode,
    scenario: Option<Scenario>,
) -> Projection {
    let Some(scenario) = scenario else {
        return projection;
    };
    match mode {
        ForecastMode::Separable => {
            if let (Some(income), Some(expense)) =
                (projection.income.as_mut(), projection.expense.as_mut())
            {
                income.iter_mut().for_each(|v| *v *= scenario.income_factor());
                expense.iter_mut().for_each(|v| *v *= scenario.expense_factor());
                projection.net = difference(income, expense);
            }
        }
        ForecastMode::NetOnly => {
            let factor = scenario.net_factor();
            projection.net.iter_mut().for_each(|v| *v *= factor);
        }
    }
    projection
}

fn difference(left: &[f64], right: &[f64]) -> Vec<f64> {
    left.iter().zip(right).map(|(a, b)| a - b).collect()
}

/// Sample standard deviation (n - 1 denominator); `None` below two finite points.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return None;
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    let variance =
        finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (finite.len() - 1) as f64;
    let std = variance.sqrt();
    std.is_finite().then_some(std)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(rows: &[(&str, f64, f64)], starting: f64) -> Vec<MonthlySummary> {
        let mut balance = starting;
        rows.iter()
            .map(|(month, income, expense)| {
                let net = income - expense;
                let start = balance;
                balance += net;
                MonthlySummary {
                    month: MonthKey::parse(month).unwrap(),
                    total_income: *income,
                    total_expense: *expense,
                    net,
                    savings_start: start,
                    savings_end: balance,
                }
            })
            .collect()
    }

    fn linear_history(months: usize) -> Vec<MonthlySummary> {
        let start = MonthKey::parse("2024-01").unwrap();
        let labels: Vec<String> = (0..months as i32)
            .map(|i| start.offset(i).to_string())
            .collect();
        let rows: Vec<(&str, f64, f64)> = labels
            .iter()
            .enumerate()
            .map(|(t, label)| (label.as_str(), 3_000.0 + 50.0 * t as f64, 2_000.0 + 20.0 * t as f64))
            .collect();
        history(&rows, 1_000.0)
    }

    struct FailingBackend;

    impl SmoothingBackend for FailingBackend {
        fn fit(&self, _series: &[f64]) -> std::result::Result<Box<dyn FittedModel>, FitError> {
            Err(FitError::DidNotConverge)
        }
    }

    #[test]
    fn rejects_short_history_and_empty_horizon() {
        let one = history(&[("2025-01", 100.0, 50.0)], 0.0);
        assert!(matches!(
            forecast(&one, 0.0, 3, None),
            Err(FinanceError::InsufficientHistory { required: 2, available: 1 })
        ));
        let two = history(&[("2025-01", 100.0, 50.0), ("2025-02", 100.0, 60.0)], 0.0);
        assert!(matches!(
            forecast(&two, 0.0, 0, None),
            Err(FinanceError::InvalidInput(_))
        ));
    }

    #[test]
    fn oversized_horizons_are_rejected() {
        let two = history(&[("2025-01", 100.0, 50.0), ("2025-02", 100.0, 60.0)], 0.0);
        for periods in [MAX_FORECAST_PERIODS + 1, usize::MAX] {
            assert!(matches!(
                forecast(&two, 0.0, periods, None),
                Err(FinanceError::InvalidInput(_))
            ));
        }
        let longest = forecast(&two, 0.0, MAX_FORECAST_PERIODS, None).unwrap();
        assert_eq!(longest.projected().count(), MAX_FORECAST_PERIODS);

        let near_end = history(&[("9999-08", 100.0, 50.0), ("9999-09", 100.0, 60.0)], 0.0);
        assert!(matches!(
            forecast(&near_end, 0.0, 6, None),
            Err(FinanceError::InvalidInput(_))
        ));
    }

    #[test]
    fn horizon_rows_follow_last_month() {
        let summary = history(
            &[("2025-09", 2_000.0, 1_500.0), ("2025-10", 2_100.0, 1_400.0), ("2025-11", 2_050.0, 1_700.0)],
            0.0,
        );
        let result = forecast(&summary, 0.0, 3, None).expect("forecast");
        assert_eq!(result.rows.len(), 6);
        assert_eq!(result.mode, ForecastMode::NetOnly);
        let months: Vec<String> = result.projected().map(|row| row.month.to_string()).collect();
        assert_eq!(months, vec!["2025-12", "2026-01", "2026-02"]);
        assert!(result.history().all(|row| row.lower.is_none() && row.upper.is_none()));
        assert!(result.projected().all(|row| row.total_income.is_none()));
    }

    #[test]
    fn separable_mode_extrapolates_each_series() {
        let summary = linear_history(8);
        let result = forecast(&summary, 1_000.0, 2, None).expect("forecast");
        assert_eq!(result.mode, ForecastMode::Separable);
        assert!(!result.degraded);

        let first = result.projected().next().expect("projected row");
        assert!((first.total_income.unwrap() - 3_400.0).abs() < 1e-6);
        assert!((first.total_expense.unwrap() - 2_160.0).abs() < 1e-6);
        assert!((first.net - 1_240.0).abs() < 1e-6);

        let last_history = result.history().last().unwrap().savings_end;
        assert!((first.savings_start - last_history).abs() < 1e-9);
        assert!((first.savings_end - (last_history + first.net)).abs() < 1e-9);
    }

    #[test]
    fn exact_fit_yields_zero_width_band() {
        let result = forecast(&linear_history(8), 0.0, 3, None).expect("forecast");
        assert!(result.sigma < 1e-6);
    }

    #[test]
    fn growth_scenarios_scale_after_fitting() {
        let summary = linear_history(8);
        let result = forecast(&summary, 0.0, 1, Some(Scenario::new(10.0, -50.0))).unwrap();
        let row = result.projected().next().unwrap();
        assert!((row.total_income.unwrap() - 3_740.0).abs() < 1e-6);
        assert!((row.total_expense.unwrap() - 1_080.0).abs() < 1e-6);
        assert!((row.net - 2_660.0).abs() < 1e-6);

        let short = history(&[("2025-01", 1_000.0, 600.0), ("2025-02", 1_000.0, 500.0)], 0.0);
        let plain = forecast(&short, 0.0, 1, None).unwrap();
        let scaled = forecast(&short, 0.0, 1, Some(Scenario::new(15.0, 5.0))).unwrap();
        let base = plain.projected().next().unwrap().net;
        let adjusted = scaled.projected().next().unwrap().net;
        assert!((adjusted - base * 1.10).abs() < 1e-9);
    }

    #[test]
    fn zero_scenario_matches_no_scenario() {
        let summary = history(
            &[("2025-01", 2_000.0, 1_800.0), ("2025-02", 2_300.0, 1_500.0), ("2025-03", 1_900.0, 1_950.0), ("2025-04", 2_400.0, 1_700.0)],
            250.0,
        );
        let plain = forecast(&summary, 250.0, 4, None).unwrap();
        let neutral = forecast(&summary, 250.0, 4, Some(Scenario::default())).unwrap();
        assert_eq!(plain, neutral);
    }

    #[test]
    fn band_widens_with_horizon() {
        let summary = history(
            &[("2025-01", 2_000.0, 1_800.0), ("2025-02", 2_300.0, 1_500.0), ("2025-03", 1_900.0, 1_950.0), ("2025-04", 2_400.0, 1_700.0), ("2025-05", 2_000.0, 2_100.0)],
            0.0,
        );
        let result = forecast(&summary, 0.0, 6, None).unwrap();
        assert!(result.sigma > 0.0);
        let widths: Vec<f64> = result.projected().filter_map(ForecastRow::band_width).collect();
        assert_eq!(widths.len(), 6);
        assert!(widths.windows(2).all(|pair| pair[1] > pair[0]));
        let first = result.projected().next().unwrap();
        assert!((first.band_width().unwrap() - 2.0 * BAND_Z * result.sigma).abs() < 1e-9);
    }

    #[test]
    fn two_months_use_raw_net_spread() {
        let summary = history(&[("2025-01", 1_000.0, 900.0), ("2025-02", 1_000.0, 700.0)], 0.0);
        let result = forecast(&summary, 0.0, 2, None).unwrap();
        let expected = sample_std(&[100.0, 300.0]).unwrap();
        assert!((result.sigma - expected).abs() < 1e-9);
    }

    #[test]
    fn failed_fit_degrades_to_flat_continuation() {
        let summary = linear_history(7);
        let result = Forecaster::with_backend(FailingBackend)
            .forecast(&summary, 0.0, 3, None)
            .expect("degraded forecast");
        assert!(result.degraded);
        assert_eq!(result.sigma, 0.0);
        let last = summary.last().unwrap();
        for row in result.projected() {
            assert_eq!(row.total_income, Some(last.total_income));
            assert_eq!(row.net, last.net);
            assert_eq!(row.band_width(), Some(0.0));
        }
    }

    #[test]
    fn savings_continue_from_starting_balance() {
        let summary = linear_history(3);
        let result = forecast(&summary, 5_000.0, 2, None).unwrap();
        let mut previous = 5_000.0;
        for row in &result.rows {
            assert!((row.savings_start - previous).abs() < 1e-9);
            assert!((row.savings_end - (previous + row.net)).abs() < 1e-9);
            previous = row.savings_end;
        }
    }

    #[test]
    fn sample_std_needs_two_points() {
        assert_eq!(sample_std(&[]), None);
        assert_eq!(sample_std(&[4.0]), None);
        assert!((sample_std(&[2.0, 4.0]).unwrap() - 2f64.sqrt()).abs() < 1e-12);
    }
}
