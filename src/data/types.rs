//! Core data types for option-chain analytics.
//!
//! The fundamental unit is the `OptionChainSnapshot`: one underlying, one
//! expiry, one capture instant, and an ordered list of `StrikeRecord`s in
//! exchange display shape (both sides of each strike on one row). Snapshots
//! are validated at construction and never mutated afterwards, so they can
//! be shared freely across downstream consumers.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Option side (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "C" | "CE" | "CALL" => Some(Self::Call),
            "P" | "PE" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }

    /// Exchange-style side code (CE/PE).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "CE",
            Self::Put => "PE",
        }
    }
}

/// Sensitivities of a single option, as produced by the pricing models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    /// Per calendar day.
    pub theta: f64,
    /// Per 1 vol point.
    pub vega: f64,
    /// Per 1 rate point.
    pub rho: f64,
}

/// Malformed snapshot shape, rejected at construction, or a degenerate
/// snapshot rejected by a downstream computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("Empty option chain for {underlying} {expiry}")]
    EmptyChain {
        underlying: String,
        expiry: NaiveDate,
    },

    #[error("Strikes not sorted ascending: {prev} followed by {next}")]
    UnsortedStrikes { prev: Decimal, next: Decimal },

    #[error("Duplicate strike {0}")]
    DuplicateStrike(Decimal),

    #[error("Non-positive strike {0}")]
    NonPositiveStrike(Decimal),

    #[error("Negative {field} at strike {strike}")]
    NegativeField {
        field: &'static str,
        strike: Decimal,
    },

    #[error("Non-positive spot price {0}")]
    NonPositiveSpot(Decimal),

    #[error("Zero aggregate call open interest")]
    ZeroCallOpenInterest,

    #[error("Zero aggregate call volume")]
    ZeroCallVolume,
}

/// Both sides of a single strike, as displayed on an exchange chain page.
///
/// A side with no traded quote carries zero OI/volume/IV/LTP; the analytics
/// layers treat a non-positive IV as "no usable quote" for that side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeRecord {
    pub strike: Decimal,
    pub call_oi: i64,
    pub call_volume: i64,
    /// Annualized implied volatility as a fraction (0.14 = 14%).
    pub call_iv: f64,
    pub call_ltp: Decimal,
    pub put_oi: i64,
    pub put_volume: i64,
    pub put_iv: f64,
    pub put_ltp: Decimal,
}

impl StrikeRecord {
    pub fn oi(&self, side: OptionType) -> i64 {
        match side {
            OptionType::Call => self.call_oi,
            OptionType::Put => self.put_oi,
        }
    }

    pub fn volume(&self, side: OptionType) -> i64 {
        match side {
            OptionType::Call => self.call_volume,
            OptionType::Put => self.put_volume,
        }
    }

    pub fn iv(&self, side: OptionType) -> f64 {
        match side {
            OptionType::Call => self.call_iv,
            OptionType::Put => self.put_iv,
        }
    }

    pub fn ltp(&self, side: OptionType) -> Decimal {
        match side {
            OptionType::Call => self.call_ltp,
            OptionType::Put => self.put_ltp,
        }
    }

    /// Combined open interest across both sides.
    pub fn total_oi(&self) -> i64 {
        self.call_oi + self.put_oi
    }

    /// Check the strike clears a combined-OI liquidity floor.
    pub fn is_liquid(&self, min_total_oi: i64) -> bool {
        self.total_oi() >= min_total_oi
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        if self.strike <= Decimal::ZERO {
            return Err(SnapshotError::NonPositiveStrike(self.strike));
        }
        let fields: [(&'static str, bool); 8] = [
            ("call_oi", self.call_oi < 0),
            ("call_volume", self.call_volume < 0),
            ("call_iv", self.call_iv < 0.0),
            ("call_ltp", self.call_ltp < Decimal::ZERO),
            ("put_oi", self.put_oi < 0),
            ("put_volume", self.put_volume < 0),
            ("put_iv", self.put_iv < 0.0),
            ("put_ltp", self.put_ltp < Decimal::ZERO),
        ];
        for (field, negative) in fields {
            if negative {
                return Err(SnapshotError::NegativeField {
                    field,
                    strike: self.strike,
                });
            }
        }
        Ok(())
    }
}

/// One option chain for one underlying and expiry at a capture instant.
///
/// Invariants, enforced at construction: the chain is non-empty, strikes are
/// unique and sorted ascending, all quantities are non-negative, and the
/// spot is positive. The strike list is therefore binary-searchable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChainSnapshot {
    pub captured_at: DateTime<Utc>,
    pub underlying: String,
    pub spot: Decimal,
    pub expiry: NaiveDate,
    records: Vec<StrikeRecord>,
}

impl OptionChainSnapshot {
    /// Build a snapshot from records already sorted by strike.
    pub fn new(
        captured_at: DateTime<Utc>,
        underlying: String,
        spot: Decimal,
        expiry: NaiveDate,
        records: Vec<StrikeRecord>,
    ) -> Result<Self, SnapshotError> {
        if records.is_empty() {
            return Err(SnapshotError::EmptyChain { underlying, expiry });
        }
        if spot <= Decimal::ZERO {
            return Err(SnapshotError::NonPositiveSpot(spot));
        }
        for record in &records {
            record.validate()?;
        }
        for pair in records.windows(2) {
            if pair[0].strike > pair[1].strike {
                return Err(SnapshotError::UnsortedStrikes {
                    prev: pair[0].strike,
                    next: pair[1].strike,
                });
            }
            if pair[0].strike == pair[1].strike {
                return Err(SnapshotError::DuplicateStrike(pair[0].strike));
            }
        }

        Ok(Self {
            captured_at,
            underlying,
            spot,
            expiry,
            records,
        })
    }

    /// Build a snapshot from records in arbitrary order.
    pub fn from_records(
        captured_at: DateTime<Utc>,
        underlying: String,
        spot: Decimal,
        expiry: NaiveDate,
        mut records: Vec<StrikeRecord>,
    ) -> Result<Self, SnapshotError> {
        records.sort_by(|a, b| a.strike.cmp(&b.strike));
        Self::new(captured_at, underlying, spot, expiry, records)
    }

    /// Strike rows, sorted ascending by strike.
    pub fn records(&self) -> &[StrikeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn strikes(&self) -> Vec<Decimal> {
        self.records.iter().map(|r| r.strike).collect()
    }

    /// Find the row for an exact strike.
    pub fn record_at(&self, strike: Decimal) -> Option<&StrikeRecord> {
        self.records
            .binary_search_by(|r| r.strike.cmp(&strike))
            .ok()
            .map(|idx| &self.records[idx])
    }

    pub fn total_open_interest(&self, side: OptionType) -> i64 {
        self.records.iter().map(|r| r.oi(side)).sum()
    }

    pub fn total_volume(&self, side: OptionType) -> i64 {
        self.records.iter().map(|r| r.volume(side)).sum()
    }

    /// Calendar days from capture date to expiry. Negative once expired.
    pub fn days_to_expiry(&self) -> i64 {
        (self.expiry - self.captured_at.date_naive()).num_days()
    }

    /// Time to expiry in years (365-day convention).
    pub fn years_to_expiry(&self) -> f64 {
        self.days_to_expiry() as f64 / 365.0
    }

    /// Spot rounded to the nearest multiple of the strike step.
    pub fn atm_strike(&self, step: Decimal) -> Decimal {
        (self.spot / step).round() * step
    }

    /// Rows within `count` steps of the ATM strike.
    pub fn records_near_atm(&self, step: Decimal, count: u32) -> Vec<&StrikeRecord> {
        let atm = self.atm_strike(step);
        let span = step * Decimal::from(count);
        self.records
            .iter()
            .filter(|r| (r.strike - atm).abs() <= span)
            .collect()
    }
}
