//! Max pain prediction versus settlement.
//!
//! The question a backtest answers: had we taken the max pain level a
//! few days before expiry as the settlement forecast, how far off would
//! we have been? Evaluation picks the newest indicator set at or before
//! the lookback cutoff, so late sets never leak future information into
//! the prediction.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::indicators::IndicatorSet;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BacktestError {
    #[error("No indicator history supplied")]
    EmptyHistory,

    #[error("History mixes chains: expected {expected}, found {found}")]
    MixedHistory { expected: String, found: String },

    #[error("Settlement must be positive, got {0}")]
    NonPositiveSettlement(Decimal),

    #[error("No indicator set on or before {cutoff}")]
    InsufficientHistory { cutoff: NaiveDate },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Calendar days before expiry at which the prediction is frozen.
    pub lookback_days: i64,
    /// Relative error at or under this percentage counts as a hit.
    pub tolerance_pct: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            lookback_days: 1,
            tolerance_pct: 1.0,
        }
    }
}

/// One expiry's evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub underlying: String,
    pub expiry: NaiveDate,
    pub predicted_at: DateTime<Utc>,
    pub predicted: Decimal,
    pub settlement: Decimal,
    /// Absolute relative error as a percentage of settlement.
    pub error_pct: f64,
    pub within_tolerance: bool,
}

/// One unit of batch work: an expiry's indicator history and how it
/// settled.
#[derive(Debug, Clone)]
pub struct BacktestItem {
    pub history: Vec<IndicatorSet>,
    pub settlement: Decimal,
}

pub struct BacktestComparator {
    config: BacktestConfig,
}

impl BacktestComparator {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Evaluate one expiry: freeze the prediction at the lookback cutoff
    /// and compare it against the settlement print.
    pub fn evaluate(
        &self,
        history: &[IndicatorSet],
        settlement: Decimal,
    ) -> Result<BacktestResult, BacktestError> {
        let first = history.first().ok_or(BacktestError::EmptyHistory)?;
        if settlement <= Decimal::ZERO {
            return Err(BacktestError::NonPositiveSettlement(settlement));
        }
        let expected = (first.underlying.as_str(), first.expiry);
        for set in history {
            if (set.underlying.as_str(), set.expiry) != expected {
                return Err(BacktestError::MixedHistory {
                    expected: format!("{} {}", expected.0, expected.1),
                    found: format!("{} {}", set.underlying, set.expiry),
                });
            }
        }

        let cutoff = first.expiry - Duration::days(self.config.lookback_days);
        // History order is not assumed; scan for the newest eligible set.
        let candidate = history
            .iter()
            .filter(|set| set.computed_at.date_naive() <= cutoff)
            .max_by_key(|set| set.computed_at)
            .ok_or(BacktestError::InsufficientHistory { cutoff })?;

        let gap = (candidate.max_pain - settlement).abs();
        let error_pct = (gap / settlement * Decimal::ONE_HUNDRED)
            .to_f64()
            .unwrap_or(f64::NAN);

        Ok(BacktestResult {
            underlying: first.underlying.clone(),
            expiry: first.expiry,
            predicted_at: candidate.computed_at,
            predicted: candidate.max_pain,
            settlement,
            error_pct,
            within_tolerance: error_pct <= self.config.tolerance_pct,
        })
    }

    /// Evaluate many expiries in parallel. Output order matches input
    /// order, and one bad expiry fails alone rather than poisoning the
    /// batch.
    pub fn evaluate_batch(
        &self,
        items: &[BacktestItem],
    ) -> Vec<Result<BacktestResult, BacktestError>> {
        info!(items = items.len(), "evaluating backtest batch");
        items
            .par_iter()
            .map(|item| self.evaluate(&item.history, item.settlement))
            .collect()
    }
}

#[derive(Error, Debug)]
pub enum SettlementBookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Settlement prints by expiry, loaded from a TOML file:
///
/// ```toml
/// underlying = "NIFTY"
///
/// [settlements]
/// 2024-06-27 = "23537.85"
/// 2024-07-04 = "24302.15"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementBook {
    pub underlying: String,
    pub settlements: BTreeMap<NaiveDate, Decimal>,
}

impl SettlementBook {
    pub fn from_toml_file(path: &Path) -> Result<Self, SettlementBookError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn settlement(&self, expiry: NaiveDate) -> Option<Decimal> {
        self.settlements.get(&expiry).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn set_on(day: u32, hour: u32, max_pain: Decimal) -> IndicatorSet {
        IndicatorSet {
            underlying: "NIFTY".to_string(),
            computed_at: Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap(),
            expiry: NaiveDate::from_ymd_opt(2024, 6, 27).unwrap(),
            spot: dec!(23480),
            pcr_oi: 1.0,
            pcr_volume: 1.0,
            max_pain,
            max_pain_loss: dec!(1000000),
            total_call_oi: 10_000,
            total_put_oi: 10_000,
            total_call_volume: 5_000,
            total_put_volume: 5_000,
            atm_strike: dec!(23500),
            atm_call_iv: Some(0.14),
            atm_put_iv: Some(0.15),
            greeks: Vec::new(),
            skipped_sides: 0,
        }
    }

    fn comparator() -> BacktestComparator {
        BacktestComparator::new(BacktestConfig::default())
    }

    #[test]
    fn test_exact_prediction_passes() {
        let history = vec![set_on(26, 10, dec!(18000))];
        let result = comparator().evaluate(&history, dec!(18000)).unwrap();
        assert_eq!(result.error_pct, 0.0);
        assert!(result.within_tolerance);
        assert_eq!(result.predicted, dec!(18000));
    }

    #[test]
    fn test_miss_beyond_tolerance_fails() {
        let history = vec![set_on(26, 10, dec!(18000))];
        let result = comparator().evaluate(&history, dec!(18500)).unwrap();
        assert_relative_eq!(result.error_pct, 100.0 * 500.0 / 18500.0, epsilon = 1e-9);
        assert!(!result.within_tolerance);
    }

    #[test]
    fn test_lookback_freezes_prediction() {
        // Expiry the 27th, lookback 2: only sets up to the 25th count.
        let history = vec![
            set_on(24, 10, dec!(23300)),
            set_on(25, 10, dec!(23400)),
            set_on(26, 10, dec!(23600)),
        ];
        let comparator = BacktestComparator::new(BacktestConfig {
            lookback_days: 2,
            ..BacktestConfig::default()
        });
        let result = comparator.evaluate(&history, dec!(23450)).unwrap();
        assert_eq!(result.predicted, dec!(23400));
        assert_eq!(
            result.predicted_at,
            Utc.with_ymd_and_hms(2024, 6, 25, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_unsorted_history_still_picks_newest_eligible() {
        let history = vec![
            set_on(25, 14, dec!(23500)),
            set_on(24, 10, dec!(23300)),
            set_on(25, 10, dec!(23400)),
        ];
        let comparator = BacktestComparator::new(BacktestConfig {
            lookback_days: 2,
            ..BacktestConfig::default()
        });
        let result = comparator.evaluate(&history, dec!(23450)).unwrap();
        assert_eq!(result.predicted, dec!(23500));
    }

    #[test]
    fn test_insufficient_history() {
        // Everything is newer than the cutoff.
        let history = vec![set_on(27, 9, dec!(23400))];
        let err = comparator().evaluate(&history, dec!(23450)).unwrap_err();
        assert_eq!(
            err,
            BacktestError::InsufficientHistory {
                cutoff: NaiveDate::from_ymd_opt(2024, 6, 26).unwrap()
            }
        );
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(
            comparator().evaluate(&[], dec!(23450)).unwrap_err(),
            BacktestError::EmptyHistory
        );
        let history = vec![set_on(26, 10, dec!(18000))];
        assert!(matches!(
            comparator().evaluate(&history, dec!(0)).unwrap_err(),
            BacktestError::NonPositiveSettlement(_)
        ));

        let mut mixed = vec![set_on(24, 10, dec!(23300)), set_on(25, 10, dec!(23400))];
        mixed[1].underlying = "BANKNIFTY".to_string();
        assert!(matches!(
            comparator().evaluate(&mixed, dec!(23450)).unwrap_err(),
            BacktestError::MixedHistory { .. }
        ));
    }

    #[test]
    fn test_batch_preserves_order_and_isolates_failures() {
        let items = vec![
            BacktestItem {
                history: vec![set_on(26, 10, dec!(18000))],
                settlement: dec!(18000),
            },
            BacktestItem {
                history: Vec::new(),
                settlement: dec!(18000),
            },
            BacktestItem {
                history: vec![set_on(26, 10, dec!(18000))],
                settlement: dec!(18500),
            },
        ];
        let outcomes = comparator().evaluate_batch(&items);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].as_ref().unwrap().within_tolerance);
        assert_eq!(outcomes[1], Err(BacktestError::EmptyHistory));
        assert!(!outcomes[2].as_ref().unwrap().within_tolerance);
    }

    #[test]
    fn test_settlement_book_parses() {
        let book: SettlementBook = toml::from_str(
            r#"
            underlying = "NIFTY"

            [settlements]
            2024-06-27 = "23537.85"
            2024-07-04 = "24302.15"
            "#,
        )
        .unwrap();
        assert_eq!(book.underlying, "NIFTY");
        assert_eq!(
            book.settlement(NaiveDate::from_ymd_opt(2024, 6, 27).unwrap()),
            Some(dec!(23537.85))
        );
        assert_eq!(
            book.settlement(NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()),
            None
        );
    }
}
