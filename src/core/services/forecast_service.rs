use serde::Serialize;

use crate::{
    config::Config,
    errors::{FinanceError, Result},
    forecast::{Forecast, Forecaster, Scenario, SmoothingBackend, MIN_HISTORY_MONTHS},
    ledger::MonthKey,
    storage::LedgerStore,
};

use super::SummaryService;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastRequest {
    pub periods: usize,
    pub scenario: Option<Scenario>,
    /// Refuse to forecast below this many months; never lower than the forecaster's own floor.
    pub min_history_months: usize,
}

impl Default for ForecastRequest {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ForecastRequest {
    pub fn from_config(config: &Config) -> Self {
        Self {
            periods: config.forecast_periods,
            scenario: None,
            min_history_months: config.min_history_months,
        }
    }

    pub fn with_periods(mut self, periods: usize) -> Self {
        self.periods = periods;
        self
    }

    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = Some(scenario);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport {
    pub forecast: Forecast,
    pub starting_savings: f64,
    pub missing_fx_months: Vec<MonthKey>,
}

impl ForecastReport {
    /// Projected balance at the end of the horizon.
    pub fn final_savings(&self) -> Option<f64> {
        self.forecast.projected().last().map(|row| row.savings_end)
    }
}

pub struct ForecastService;

impl ForecastService {
    pub fn forecast(store: &dyn LedgerStore, request: &ForecastRequest) -> Result<ForecastReport> {
        Self::forecast_with(store, request, &Forecaster::new())
    }

    pub fn forecast_with<B: SmoothingBackend>(
        store: &dyn LedgerStore,
        request: &ForecastRequest,
        forecaster: &Forecaster<B>,
    ) -> Result<ForecastReport> {
        let report = SummaryService::summary(store)?;
        let required = request.min_history_months.max(MIN_HISTORY_MONTHS);
        if report.rows.len() < required {
            return Err(FinanceError::InsufficientHistory {
                required,
                available: report.rows.len(),
            });
        }
        let forecast = forecaster.forecast(
            &report.rows,
            report.starting_savings,
            request.periods,
            request.scenario,
        )?;
        if forecast.degraded {
            tracing::warn!(periods = request.periods, "forecast degraded to flat continuation");
        }
        Ok(ForecastReport {
            forecast,
            starting_savings: report.starting_savings,
            missing_fx_months: report.missing_fx_months,
        })
    }
}
