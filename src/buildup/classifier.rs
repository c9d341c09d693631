//! OI buildup classification between two chain snapshots.
//!
//! Compares open interest and premium movement per strike per side and
//! names the positioning flow behind the move. Rising OI means fresh
//! positions, falling OI means positions closing; the premium direction
//! says which way the aggressor leaned.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::types::{OptionChainSnapshot, OptionType};

/// Positioning flow behind an OI and premium move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildupCategory {
    /// OI up, premium up: fresh longs paying up.
    LongBuildup,
    /// OI up, premium down: fresh shorts leaning on the quote.
    ShortBuildup,
    /// OI down, premium up: shorts buying back.
    ShortCovering,
    /// OI down, premium down: longs getting out.
    LongUnwinding,
    /// Flat OI or flat premium.
    Neutral,
}

impl BuildupCategory {
    /// Tie-break precedence for dominance follows this order.
    pub const ALL: [BuildupCategory; 5] = [
        Self::LongBuildup,
        Self::ShortBuildup,
        Self::ShortCovering,
        Self::LongUnwinding,
        Self::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LongBuildup => "Long Buildup",
            Self::ShortBuildup => "Short Buildup",
            Self::ShortCovering => "Short Covering",
            Self::LongUnwinding => "Long Unwinding",
            Self::Neutral => "Neutral",
        }
    }

    /// Whether the flow reads as upside positioning.
    pub fn is_bullish(&self) -> bool {
        matches!(self, Self::LongBuildup | Self::ShortCovering)
    }

    /// Whether the flow reads as downside positioning.
    pub fn is_bearish(&self) -> bool {
        matches!(self, Self::ShortBuildup | Self::LongUnwinding)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildupError {
    #[error("Snapshots compare different underlyings: {prev} vs {curr}")]
    UnderlyingMismatch { prev: String, curr: String },

    #[error("Snapshots compare different expiries: {prev} vs {curr}")]
    ExpiryMismatch { prev: NaiveDate, curr: NaiveDate },

    #[error("Current snapshot ({curr}) does not follow previous ({prev})")]
    NonIncreasingTime {
        prev: DateTime<Utc>,
        curr: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildupConfig {
    /// OI moves up to this magnitude count as flat.
    pub oi_change_epsilon: i64,
    /// Strikes whose combined OI sits below this floor are excluded.
    pub min_total_oi: i64,
}

impl Default for BuildupConfig {
    fn default() -> Self {
        Self {
            oi_change_epsilon: 0,
            min_total_oi: 0,
        }
    }
}

/// Classification of one side of one strike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideBuildup {
    pub strike: Decimal,
    pub side: OptionType,
    pub oi_change: i64,
    pub price_change: Decimal,
    pub category: BuildupCategory,
}

/// Outcome of comparing two snapshots of the same chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildupReport {
    pub underlying: String,
    pub expiry: NaiveDate,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub entries: Vec<SideBuildup>,
    /// Strikes under the liquidity floor in the current snapshot.
    pub excluded_illiquid: usize,
    /// Strikes present in only one of the two snapshots.
    pub unmatched_strikes: usize,
}

impl BuildupReport {
    pub fn category_count(&self, category: BuildupCategory) -> usize {
        self.entries
            .iter()
            .filter(|e| e.category == category)
            .count()
    }

    /// Most frequent non-neutral category. Ties resolve by the order of
    /// `BuildupCategory::ALL`; a report with no non-neutral entries is
    /// `Neutral`.
    pub fn dominant(&self) -> BuildupCategory {
        let mut counts = [0usize; 5];
        for entry in &self.entries {
            if let Some(pos) = BuildupCategory::ALL.iter().position(|c| *c == entry.category) {
                counts[pos] += 1;
            }
        }
        dominant_from_counts(&counts)
    }

    pub fn side_entries(&self, side: OptionType) -> Vec<&SideBuildup> {
        self.entries.iter().filter(|e| e.side == side).collect()
    }
}

pub(crate) fn dominant_from_counts(counts: &[usize; 5]) -> BuildupCategory {
    let mut best = BuildupCategory::Neutral;
    let mut best_count = 0usize;
    for (idx, category) in BuildupCategory::ALL.iter().enumerate() {
        if *category == BuildupCategory::Neutral {
            continue;
        }
        if counts[idx] > best_count {
            best = *category;
            best_count = counts[idx];
        }
    }
    best
}

/// Name the flow for one side from its OI and premium change.
pub fn classify_side(oi_change: i64, price_change: Decimal, epsilon: i64) -> BuildupCategory {
    if oi_change.abs() <= epsilon || price_change == Decimal::ZERO {
        return BuildupCategory::Neutral;
    }
    match (oi_change > 0, price_change > Decimal::ZERO) {
        (true, true) => BuildupCategory::LongBuildup,
        (true, false) => BuildupCategory::ShortBuildup,
        (false, true) => BuildupCategory::ShortCovering,
        (false, false) => BuildupCategory::LongUnwinding,
    }
}

/// Classify every matched, liquid strike between two snapshots of the
/// same chain. Strikes missing on either end and strikes under the
/// liquidity floor are counted, not silently dropped.
pub fn classify(
    prev: &OptionChainSnapshot,
    curr: &OptionChainSnapshot,
    config: &BuildupConfig,
) -> Result<BuildupReport, BuildupError> {
    if prev.underlying != curr.underlying {
        return Err(BuildupError::UnderlyingMismatch {
            prev: prev.underlying.clone(),
            curr: curr.underlying.clone(),
        });
    }
    if prev.expiry != curr.expiry {
        return Err(BuildupError::ExpiryMismatch {
            prev: prev.expiry,
            curr: curr.expiry,
        });
    }
    if curr.captured_at <= prev.captured_at {
        return Err(BuildupError::NonIncreasingTime {
            prev: prev.captured_at,
            curr: curr.captured_at,
        });
    }

    let mut entries = Vec::new();
    let mut excluded_illiquid = 0usize;
    let mut unmatched_strikes = 0usize;

    for record in curr.records() {
        let prev_record = match prev.record_at(record.strike) {
            Some(r) => r,
            None => {
                unmatched_strikes += 1;
                continue;
            }
        };
        if !record.is_liquid(config.min_total_oi) {
            excluded_illiquid += 1;
            continue;
        }
        for side in [OptionType::Call, OptionType::Put] {
            let oi_change = record.oi(side) - prev_record.oi(side);
            let price_change = record.ltp(side) - prev_record.ltp(side);
            entries.push(SideBuildup {
                strike: record.strike,
                side,
                oi_change,
                price_change,
                category: classify_side(oi_change, price_change, config.oi_change_epsilon),
            });
        }
    }
    for record in prev.records() {
        if curr.record_at(record.strike).is_none() {
            unmatched_strikes += 1;
        }
    }

    Ok(BuildupReport {
        underlying: curr.underlying.clone(),
        expiry: curr.expiry,
        from: prev.captured_at,
        to: curr.captured_at,
        entries,
        excluded_illiquid,
        unmatched_strikes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::StrikeRecord;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn record(
        strike: Decimal,
        call_oi: i64,
        call_ltp: Decimal,
        put_oi: i64,
        put_ltp: Decimal,
    ) -> StrikeRecord {
        StrikeRecord {
            strike,
            call_oi,
            call_volume: 500,
            call_iv: 0.14,
            call_ltp,
            put_oi,
            put_volume: 400,
            put_iv: 0.15,
            put_ltp,
        }
    }

    fn snapshot_at(minute: u32, records: Vec<StrikeRecord>) -> OptionChainSnapshot {
        OptionChainSnapshot::new(
            Utc.with_ymd_and_hms(2024, 6, 20, 10, minute, 0).unwrap(),
            "NIFTY".to_string(),
            dec!(23480),
            NaiveDate::from_ymd_opt(2024, 6, 27).unwrap(),
            records,
        )
        .unwrap()
    }

    #[test]
    fn test_sign_table() {
        assert_eq!(classify_side(500, dec!(4.5), 0), BuildupCategory::LongBuildup);
        assert_eq!(classify_side(500, dec!(-4.5), 0), BuildupCategory::ShortBuildup);
        assert_eq!(classify_side(-500, dec!(4.5), 0), BuildupCategory::ShortCovering);
        assert_eq!(classify_side(-500, dec!(-4.5), 0), BuildupCategory::LongUnwinding);
    }

    #[test]
    fn test_neutral_conditions() {
        // Flat OI or flat premium both read as no positioning signal.
        assert_eq!(classify_side(0, dec!(4.5), 0), BuildupCategory::Neutral);
        assert_eq!(classify_side(500, dec!(0), 0), BuildupCategory::Neutral);
        // Epsilon widens the flat-OI band inclusively.
        assert_eq!(classify_side(100, dec!(4.5), 100), BuildupCategory::Neutral);
        assert_eq!(classify_side(-100, dec!(4.5), 100), BuildupCategory::Neutral);
        assert_eq!(classify_side(101, dec!(4.5), 100), BuildupCategory::LongBuildup);
    }

    #[test]
    fn test_classify_matched_strikes() {
        let prev = snapshot_at(0, vec![
            record(dec!(23400), 1000, dec!(150), 2000, dec!(80)),
            record(dec!(23500), 1500, dec!(95), 1800, dec!(120)),
        ]);
        let curr = snapshot_at(15, vec![
            // Call: OI up, premium up. Put: OI down, premium down.
            record(dec!(23400), 1600, dec!(158), 1700, dec!(72)),
            // Call: OI up, premium down. Put: OI down, premium up.
            record(dec!(23500), 1900, dec!(88), 1500, dec!(131)),
        ]);

        let report = classify(&prev, &curr, &BuildupConfig::default()).unwrap();
        assert_eq!(report.entries.len(), 4);
        assert_eq!(report.excluded_illiquid, 0);
        assert_eq!(report.unmatched_strikes, 0);

        assert_eq!(report.entries[0].category, BuildupCategory::LongBuildup);
        assert_eq!(report.entries[1].category, BuildupCategory::LongUnwinding);
        assert_eq!(report.entries[2].category, BuildupCategory::ShortBuildup);
        assert_eq!(report.entries[3].category, BuildupCategory::ShortCovering);

        assert_eq!(report.entries[0].oi_change, 600);
        assert_eq!(report.entries[0].price_change, dec!(8));
    }

    #[test]
    fn test_mismatched_chains_rejected() {
        let prev = snapshot_at(0, vec![record(dec!(23400), 1000, dec!(150), 2000, dec!(80))]);
        let mut other = snapshot_at(15, vec![record(dec!(23400), 1100, dec!(152), 2000, dec!(80))]);
        other.underlying = "BANKNIFTY".to_string();
        assert!(matches!(
            classify(&prev, &other, &BuildupConfig::default()),
            Err(BuildupError::UnderlyingMismatch { .. })
        ));

        let stale = snapshot_at(0, vec![record(dec!(23400), 1100, dec!(152), 2000, dec!(80))]);
        assert!(matches!(
            classify(&prev, &stale, &BuildupConfig::default()),
            Err(BuildupError::NonIncreasingTime { .. })
        ));
    }

    #[test]
    fn test_liquidity_floor_counts_exclusions() {
        let prev = snapshot_at(0, vec![
            record(dec!(23400), 1000, dec!(150), 2000, dec!(80)),
            record(dec!(24000), 5, dec!(2), 3, dec!(400)),
        ]);
        let curr = snapshot_at(15, vec![
            record(dec!(23400), 1600, dec!(158), 2100, dec!(84)),
            record(dec!(24000), 6, dec!(2.1), 3, dec!(401)),
        ]);

        let config = BuildupConfig {
            min_total_oi: 100,
            ..BuildupConfig::default()
        };
        let report = classify(&prev, &curr, &config).unwrap();
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.excluded_illiquid, 1);
        assert!(report.entries.iter().all(|e| e.strike == dec!(23400)));
    }

    #[test]
    fn test_unmatched_strikes_counted_both_directions() {
        let prev = snapshot_at(0, vec![
            record(dec!(23300), 900, dec!(210), 700, dec!(40)),
            record(dec!(23400), 1000, dec!(150), 2000, dec!(80)),
        ]);
        let curr = snapshot_at(15, vec![
            record(dec!(23400), 1600, dec!(158), 2100, dec!(84)),
            record(dec!(23500), 1200, dec!(95), 1500, dec!(120)),
        ]);

        let report = classify(&prev, &curr, &BuildupConfig::default()).unwrap();
        // 23500 is new, 23300 disappeared.
        assert_eq!(report.unmatched_strikes, 2);
        assert_eq!(report.entries.len(), 2);
    }

    #[test]
    fn test_dominant_and_tie_break() {
        let report = BuildupReport {
            underlying: "NIFTY".to_string(),
            expiry: NaiveDate::from_ymd_opt(2024, 6, 27).unwrap(),
            from: Utc.with_ymd_and_hms(2024, 6, 20, 10, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2024, 6, 20, 10, 15, 0).unwrap(),
            entries: vec![
                SideBuildup {
                    strike: dec!(23400),
                    side: OptionType::Call,
                    oi_change: 500,
                    price_change: dec!(3),
                    category: BuildupCategory::LongBuildup,
                },
                SideBuildup {
                    strike: dec!(23400),
                    side: OptionType::Put,
                    oi_change: 400,
                    price_change: dec!(-2),
                    category: BuildupCategory::ShortBuildup,
                },
                SideBuildup {
                    strike: dec!(23500),
                    side: OptionType::Call,
                    oi_change: 0,
                    price_change: dec!(1),
                    category: BuildupCategory::Neutral,
                },
            ],
            excluded_illiquid: 0,
            unmatched_strikes: 0,
        };

        // One long buildup, one short buildup: the tie goes to the earlier
        // category in the precedence order.
        assert_eq!(report.dominant(), BuildupCategory::LongBuildup);
        assert_eq!(report.category_count(BuildupCategory::Neutral), 1);
    }

    #[test]
    fn test_all_neutral_report_is_neutral() {
        let prev = snapshot_at(0, vec![record(dec!(23400), 1000, dec!(150), 2000, dec!(80))]);
        let curr = snapshot_at(15, vec![record(dec!(23400), 1000, dec!(151), 2000, dec!(79))]);
        let report = classify(&prev, &curr, &BuildupConfig::default()).unwrap();
        assert_eq!(report.dominant(), BuildupCategory::Neutral);
    }
}
