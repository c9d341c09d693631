//! Aggregate statistics over a batch of backtest outcomes.

use serde::{Deserialize, Serialize};

use super::comparator::{BacktestError, BacktestResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub total: usize,
    pub evaluated: usize,
    pub failed: usize,
    pub within_tolerance: usize,
    pub mean_error_pct: Option<f64>,
    pub median_error_pct: Option<f64>,
    pub worst_error_pct: Option<f64>,
}

impl BacktestReport {
    pub fn from_outcomes(outcomes: &[Result<BacktestResult, BacktestError>]) -> Self {
        let total = outcomes.len();
        let results: Vec<&BacktestResult> =
            outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
        let evaluated = results.len();
        let within_tolerance = results.iter().filter(|r| r.within_tolerance).count();

        let mut errors: Vec<f64> = results
            .iter()
            .map(|r| r.error_pct)
            .filter(|e| e.is_finite())
            .collect();
        errors.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        Self {
            total,
            evaluated,
            failed: total - evaluated,
            within_tolerance,
            mean_error_pct: mean(&errors),
            median_error_pct: median(&errors),
            worst_error_pct: errors.last().copied(),
        }
    }

    /// Fraction of evaluated expiries inside tolerance.
    pub fn hit_rate(&self) -> Option<f64> {
        if self.evaluated == 0 {
            return None;
        }
        Some(self.within_tolerance as f64 / self.evaluated as f64)
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str("Backtest Report\n");
        out.push_str(&format!("  expiries:         {}\n", self.total));
        out.push_str(&format!("  evaluated:        {}\n", self.evaluated));
        out.push_str(&format!("  failed:           {}\n", self.failed));
        match self.hit_rate() {
            Some(rate) => out.push_str(&format!(
                "  within tolerance: {} ({:.1}%)\n",
                self.within_tolerance,
                rate * 100.0
            )),
            None => out.push_str("  within tolerance: n/a\n"),
        }
        out.push_str(&format!("  mean error:       {}\n", fmt_pct(self.mean_error_pct)));
        out.push_str(&format!("  median error:     {}\n", fmt_pct(self.median_error_pct)));
        out.push_str(&format!("  worst error:      {}\n", fmt_pct(self.worst_error_pct)));
        out
    }
}

fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v),
        None => "n/a".to_string(),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median of an already sorted slice.
fn median(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn result(error_pct: f64, within_tolerance: bool) -> Result<BacktestResult, BacktestError> {
        Ok(BacktestResult {
            underlying: "NIFTY".to_string(),
            expiry: NaiveDate::from_ymd_opt(2024, 6, 27).unwrap(),
            predicted_at: Utc.with_ymd_and_hms(2024, 6, 26, 10, 0, 0).unwrap(),
            predicted: dec!(23400),
            settlement: dec!(23500),
            error_pct,
            within_tolerance,
        })
    }

    #[test]
    fn test_report_over_mixed_outcomes() {
        let outcomes = vec![
            result(0.0, true),
            result(2.5, false),
            Err(BacktestError::EmptyHistory),
            result(0.8, true),
        ];
        let report = BacktestReport::from_outcomes(&outcomes);

        assert_eq!(report.total, 4);
        assert_eq!(report.evaluated, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.within_tolerance, 2);
        assert_relative_eq!(report.mean_error_pct.unwrap(), 1.1, epsilon = 1e-12);
        assert_relative_eq!(report.median_error_pct.unwrap(), 0.8);
        assert_relative_eq!(report.worst_error_pct.unwrap(), 2.5);
        assert_relative_eq!(report.hit_rate().unwrap(), 2.0 / 3.0);
    }

    #[test]
    fn test_even_count_median_averages() {
        let outcomes = vec![
            result(1.0, true),
            result(2.0, false),
            result(3.0, false),
            result(4.0, false),
        ];
        let report = BacktestReport::from_outcomes(&outcomes);
        assert_relative_eq!(report.median_error_pct.unwrap(), 2.5);
    }

    #[test]
    fn test_empty_batch() {
        let report = BacktestReport::from_outcomes(&[]);
        assert_eq!(report.total, 0);
        assert_eq!(report.mean_error_pct, None);
        assert_eq!(report.hit_rate(), None);
        assert!(report.summary().contains("n/a"));
    }

    #[test]
    fn test_non_finite_errors_excluded_from_stats() {
        let outcomes = vec![result(f64::NAN, false), result(2.0, false)];
        let report = BacktestReport::from_outcomes(&outcomes);
        assert_eq!(report.evaluated, 2);
        assert_relative_eq!(report.mean_error_pct.unwrap(), 2.0);
    }

    #[test]
    fn test_summary_format() {
        let report = BacktestReport::from_outcomes(&[result(0.5, true)]);
        let text = report.summary();
        assert!(text.contains("Backtest Report"));
        assert!(text.contains("within tolerance: 1 (100.0%)"));
        assert!(text.contains("mean error:       0.50%"));
    }
}
