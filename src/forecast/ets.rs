//! Additive exponential smoothing (Holt's linear trend, optionally Holt-Winters
//! additive seasonality) behind a pluggable backend trait.

use thiserror::Error;

use super::optimizer::NelderMead;

/// Seasonal cycle length for monthly data.
pub const SEASON_LENGTH: usize = 12;
/// Seasonality is only modelled once two full cycles are available.
pub const MIN_SEASONAL_POINTS: usize = 2 * SEASON_LENGTH;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("series has {available} points, smoothing needs at least {required}")]
    TooShort { required: usize, available: usize },
    #[error("series contains non-finite values")]
    NonFinite,
    #[error("parameter search did not reach a finite in-sample error")]
    DidNotConverge,
}

/// A smoothing strategy able to fit a univariate series.
pub trait SmoothingBackend {
    fn fit(&self, series: &[f64]) -> Result<Box<dyn FittedModel>, FitError>;
}

/// A fitted model: in-sample one-step predictions and out-of-sample extrapolation.
pub trait FittedModel {
    /// One-step-ahead predictions aligned with the input series.
    fn fitted_values(&self) -> &[f64];
    /// Point forecasts for steps `1..=horizon` after the last observation.
    fn forecast(&self, horizon: usize) -> Vec<f64>;
    fn seasonal_period(&self) -> Option<usize> {
        None
    }
}

/// Smoothing weights, each within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// Additive-trend exponential smoothing with parameters fit by minimizing the
/// in-sample sum of squared one-step errors.
#[derive(Debug, Clone)]
pub struct ExponentialSmoothing {
    pub season_length: usize,
    pub min_seasonal_points: usize,
    pub optimizer: NelderMead,
}

impl Default for ExponentialSmoothing {
    fn default() -> Self {
        Self {
            season_length: SEASON_LENGTH,
            min_seasonal_points: MIN_SEASONAL_POINTS,
            optimizer: NelderMead::default(),
        }
    }
}

impl ExponentialSmoothing {
    fn season_for(&self, len: usize) -> Option<usize> {
        let required = self.min_seasonal_points.max(2 * self.season_length);
        (self.season_length > 1 && len >= required).then_some(self.season_length)
    }
}

impl SmoothingBackend for ExponentialSmoothing {
    fn fit(&self, series: &[f64]) -> Result<Box<dyn FittedModel>, FitError> {
        if series.len() < 2 {
            return Err(FitError::TooShort {
                required: 2,
                available: series.len(),
            });
        }
        if series.iter().any(|value| !value.is_finite()) {
            return Err(FitError::NonFinite);
        }

        let season = self.season_for(series.len());
        let start = [logit(0.5), logit(0.1), logit(0.1)];
        let dims = if season.is_some() { 3 } else { 2 };
        let objective = |point: &[f64]| run(series, params_from(point), season).sse;
        let minimum = self.optimizer.minimize(objective, &start[..dims]);
        if !minimum.value.is_finite() {
            return Err(FitError::DidNotConverge);
        }

        let params = params_from(&minimum.point);
        let pass = run(series, params, season);
        if !pass.sse.is_finite() || !pass.level.is_finite() || !pass.trend.is_finite() {
            return Err(FitError::DidNotConverge);
        }
        tracing::debug!(
            points = series.len(),
            seasonal = season.is_some(),
            alpha = params.alpha,
            beta = params.beta,
            gamma = params.gamma,
            iterations = minimum.iterations,
            converged = minimum.converged,
            "fitted exponential smoothing"
        );

        Ok(Box::new(SmoothingFit {
            params,
            season,
            observations: series.len(),
            level: pass.level,
            trend: pass.trend,
            seasonals: pass.seasonals,
            fitted: pass.fitted,
        }))
    }
}

/// State after fitting; forecasts extend the final level, trend and seasonal terms.
#[derive(Debug, Clone)]
pub struct SmoothingFit {
    pub params: SmoothingParams,
    season: Option<usize>,
    observations: usize,
    level: f64,
    trend: f64,
    seasonals: Vec<f64>,
    fitted: Vec<f64>,
}

impl FittedModel for SmoothingFit {
    fn fitted_values(&self) -> &[f64] {
        &self.fitted
    }

    fn forecast(&self, horizon: usize) -> Vec<f64> {
        (1..=horizon)
            .map(|step| {
                let seasonal = match self.season {
                    Some(period) => self.seasonals[(self.observations - 1 + step) % period],
                    None => 0.0,
                };
                self.level + step as f64 * self.trend + seasonal
            })
            .collect()
    }

    fn seasonal_period(&self) -> Option<usize> {
        self.season
    }
}

struct Pass {
    fitted: Vec<f64>,
    level: f64,
    trend: f64,
    seasonals: Vec<f64>,
    sse: f64,
}

/// Runs the smoothing recursions over `series`.
///
/// `seasonals[p]` always holds the latest seasonal term for phase `p = t % period`.
/// Initial states are chosen so that an exactly linear (or linear plus exactly
/// periodic) series is reproduced with zero error.
fn run(series: &[f64], params: SmoothingParams, season: Option<usize>) -> Pass {
    let (mut level, mut trend, mut seasonals) = initial_state(series, season);
    let mut fitted = Vec::with_capacity(series.len());
    let mut sse = 0.0;

    for (t, &observed) in series.iter().enumerate() {
        let phase = season.map(|period| t % period);
        let seasonal = phase.map(|p| seasonals[p]).unwrap_or(0.0);
        let predicted = level + trend + seasonal;
        fitted.push(predicted);
        let error = observed - predicted;
        sse += error * error;

        let previous_level = level;
        let previous_trend = trend;
        level = params.alpha * (observed - seasonal)
            + (1.0 - params.alpha) * (previous_level + previous_trend);
        trend = params.beta * (level - previous_level) + (1.0 - params.beta) * previous_trend;
        if let Some(p) = phase {
            seasonals[p] = params.gamma * (observed - previous_level - previous_trend)
                + (1.0 - params.gamma) * seasonals[p];
        }
    }

    Pass {
        fitted,
        level,
        trend,
        seasonals,
        sse,
    }
}

fn initial_state(series: &[f64], season: Option<usize>) -> (f64, f64, Vec<f64>) {
    match season {
        Some(period) => {
            let first = mean(&series[..period]);
            let second = mean(&series[period..2 * period]);
            let trend = (second - first) / period as f64;
            let center = (period as f64 - 1.0) / 2.0;
            let seasonals = series[..period]
                .iter()
                .enumerate()
                .map(|(i, value)| value - (first + trend * (i as f64 - center)))
                .collect();
            let level = first - trend * (center + 1.0);
            (level, trend, seasonals)
        }
        None => {
            let trend = series[1] - series[0];
            (series[0] - trend, trend, Vec::new())
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn params_from(point: &[f64]) -> SmoothingParams {
    let at = |index: usize| point.get(index).copied().map(sigmoid).unwrap_or(0.0);
    SmoothingParams {
        alpha: at(0),
        beta: at(1),
        gamma: at(2),
    }
}

fn sigmoid(value: f64) -> f64 {
    1.0 / (1.0 + (-value).exp())
}

fn logit(probability: f64) -> f64 {
    (probability / (1.0 - probability)).ln()
}
