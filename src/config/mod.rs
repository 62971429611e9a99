use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    errors::{FinanceError, Result},
    forecast::{MAX_FORECAST_PERIODS, MIN_HISTORY_MONTHS},
    utils::{ensure_dir, write_atomic, PathResolver},
};

pub const DEFAULT_FORECAST_PERIODS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ledger file; relative paths resolve against the application home.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_file: Option<PathBuf>,
    pub forecast_periods: usize,
    pub min_history_months: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    pub reporting_currency: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_file: None,
            forecast_periods: DEFAULT_FORECAST_PERIODS,
            min_history_months: MIN_HISTORY_MONTHS,
            log_filter: None,
            reporting_currency: "EUR".into(),
        }
    }
}

impl Config {
    /// Rejects values the forecaster cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.forecast_periods == 0 || self.forecast_periods > MAX_FORECAST_PERIODS {
            return Err(FinanceError::Config(format!(
                "forecast_periods must be between 1 and {}",
                MAX_FORECAST_PERIODS
            )));
        }
        if self.min_history_months < MIN_HISTORY_MONTHS {
            return Err(FinanceError::Config(format!(
                "min_history_months must be at least {}",
                MIN_HISTORY_MONTHS
            )));
        }
        Ok(())
    }
}

/// Loads and saves `config/config.json` beneath the application home.
pub struct ConfigManager {
    base: PathBuf,
    path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        Self::from_base(PathResolver::base_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self> {
        Self::from_base(base)
    }

    fn from_base(base: PathBuf) -> Result<Self> {
        ensure_dir(&base)?;
        ensure_dir(&PathResolver::config_dir_in(&base))?;
        Ok(Self {
            path: PathResolver::config_file_in(&base),
            base,
        })
    }

    /// Missing file yields defaults; a present but invalid file is an error.
    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            return Ok(Config::default());
        }
        let data = fs::read_to_string(&self.path)?;
        let config: Config = serde_json::from_str(&data)
            .map_err(|err| FinanceError::Config(format!("{}: {}", self.path.display(), err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;
        let json = serde_json::to_string_pretty(config)?;
        write_atomic(&self.path, &json)?;
        tracing::debug!(path = %self.path.display(), "configuration saved");
        Ok(())
    }

    /// Ledger file for `config`, defaulting to `data/ledger.json` under the home.
    pub fn store_path(&self, config: &Config) -> PathBuf {
        match &config.store_file {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.base.join(path),
            None => PathResolver::store_file_in(&self.base),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager() -> (ConfigManager, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let manager = ConfigManager::with_base_dir(temp.path().to_path_buf()).expect("manager");
        (manager, temp)
    }

    #[test]
    fn missing_file_loads_defaults() {
        let (manager, _guard) = manager();
        let config = manager.load().expect("load");
        assert_eq!(config, Config::default());
        assert_eq!(config.forecast_periods, 6);
        assert_eq!(config.min_history_months, 2);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let (manager, _guard) = manager();
        let config = Config {
            forecast_periods: 12,
            log_filter: Some("household_finance=debug".into()),
            ..Config::default()
        };
        manager.save(&config).expect("save");
        assert_eq!(manager.load().expect("load"), config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let (manager, _guard) = manager();
        fs::write(manager.path(), r#"{"forecast_periods": 3}"#).unwrap();
        let config = manager.load().expect("load");
        assert_eq!(config.forecast_periods, 3);
        assert_eq!(config.reporting_currency, "EUR");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let (manager, _guard) = manager();
        fs::write(manager.path(), r#"{"forecast_periods": 0}"#).unwrap();
        assert!(matches!(manager.load(), Err(FinanceError::Config(_))));
        fs::write(manager.path(), r#"{"forecast_periods": 121}"#).unwrap();
        assert!(matches!(manager.load(), Err(FinanceError::Config(_))));
        fs::write(manager.path(), "not json").unwrap();
        assert!(matches!(manager.load(), Err(FinanceError::Config(_))));
    }

    #[test]
    fn store_path_resolves_relative_overrides() {
        let (manager, guard) = manager();
        let default = manager.store_path(&Config::default());
        assert_eq!(default, guard.path().join("data").join("ledger.json"));
        let custom = Config {
            store_file: Some(PathBuf::from("alt.json")),
            ..Config::default()
        };
        assert_eq!(manager.store_path(&custom), guard.path().join("alt.json"));
    }
}
