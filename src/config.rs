//! Runtime configuration.
//!
//! One TOML file drives every analytics layer. All sections and fields
//! are optional and fall back to NIFTY weekly-chain conventions. Dates
//! (holidays) are written as quoted `"YYYY-MM-DD"` strings.
//!
//! ```toml
//! underlying = "NIFTY"
//! holidays = ["2024-08-15", "2024-10-02"]
//!
//! [indicators]
//! risk_free_rate = 0.065
//! strike_step = "100"
//!
//! [alerts]
//! pcr_high = 1.4
//! ```

use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alerts::AlertRules;
use crate::backtest::BacktestConfig;
use crate::buildup::BuildupConfig;
use crate::indicators::IndicatorConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Width of the intraday buildup windows.
    pub window_minutes: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { window_minutes: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub underlying: String,
    /// Exchange holidays, excluded from trading-day arithmetic.
    pub holidays: Vec<NaiveDate>,
    pub indicators: IndicatorConfig,
    pub buildup: BuildupConfig,
    pub session: SessionConfig,
    pub backtest: BacktestConfig,
    pub alerts: AlertRules,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            underlying: "NIFTY".to_string(),
            holidays: Vec::new(),
            indicators: IndicatorConfig::default(),
            buildup: BuildupConfig::default(),
            session: SessionConfig::default(),
            backtest: BacktestConfig::default(),
            alerts: AlertRules::default(),
        }
    }
}

impl AnalyticsConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make downstream math nonsensical.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.underlying.trim().is_empty() {
            return invalid("underlying must not be empty".to_string());
        }
        let rate = self.indicators.risk_free_rate;
        if !rate.is_finite() || !(-1.0..1.0).contains(&rate) {
            return invalid(format!("indicators.risk_free_rate out of range: {rate}"));
        }
        let dividend = self.indicators.dividend_yield;
        if !dividend.is_finite() || !(0.0..1.0).contains(&dividend) {
            return invalid(format!("indicators.dividend_yield out of range: {dividend}"));
        }
        if self.indicators.strike_step <= Decimal::ZERO {
            return invalid(format!(
                "indicators.strike_step must be positive, got {}",
                self.indicators.strike_step
            ));
        }
        if self.buildup.oi_change_epsilon < 0 {
            return invalid(format!(
                "buildup.oi_change_epsilon must not be negative, got {}",
                self.buildup.oi_change_epsilon
            ));
        }
        if self.buildup.min_total_oi < 0 {
            return invalid(format!(
                "buildup.min_total_oi must not be negative, got {}",
                self.buildup.min_total_oi
            ));
        }
        if self.session.window_minutes <= 0 {
            return invalid(format!(
                "session.window_minutes must be positive, got {}",
                self.session.window_minutes
            ));
        }
        if self.backtest.lookback_days < 0 {
            return invalid(format!(
                "backtest.lookback_days must not be negative, got {}",
                self.backtest.lookback_days
            ));
        }
        let tolerance = self.backtest.tolerance_pct;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return invalid(format!("backtest.tolerance_pct out of range: {tolerance}"));
        }

        for (name, value) in [
            ("alerts.pcr_high", self.alerts.pcr_high),
            ("alerts.pcr_low", self.alerts.pcr_low),
            ("alerts.pin_proximity_pct", self.alerts.pin_proximity_pct),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return invalid(format!("{name} must be positive, got {v}"));
                }
            }
        }
        if let (Some(low), Some(high)) = (self.alerts.pcr_low, self.alerts.pcr_high) {
            if low >= high {
                return invalid(format!(
                    "alerts.pcr_low ({low}) must sit under alerts.pcr_high ({high})"
                ));
            }
        }
        if let Some(points) = self.alerts.max_pain_move_points {
            if points <= Decimal::ZERO {
                return invalid(format!(
                    "alerts.max_pain_move_points must be positive, got {points}"
                ));
            }
        }

        Ok(())
    }
}
