//! Indicator engine: one validated snapshot in, one indicator set out.
//!
//! The set bundles the sentiment ratios (PCR by OI and by volume), the
//! max pain level, per-strike Greeks, and the ATM vol readings, stamped
//! with the capture instant so downstream consumers can line sets up
//! into a history.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::max_pain::max_pain;
use crate::data::types::{Greeks, OptionChainSnapshot, OptionType, SnapshotError, StrikeRecord};
use crate::pricing::{PricingError, PricingModel};

#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Degenerate chain: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Snapshot captured on or after expiry ({days} days to expiry)")]
    Expired { days: i64 },

    #[error("Pricing failed for {side:?} {strike}: {source}")]
    Pricing {
        side: OptionType,
        strike: Decimal,
        #[source]
        source: PricingError,
    },
}

/// Put-call ratio on open interest. Errors on a chain with no call OI
/// rather than inventing a value.
pub fn pcr_open_interest(snapshot: &OptionChainSnapshot) -> Result<f64, SnapshotError> {
    let calls = snapshot.total_open_interest(OptionType::Call);
    if calls == 0 {
        return Err(SnapshotError::ZeroCallOpenInterest);
    }
    Ok(snapshot.total_open_interest(OptionType::Put) as f64 / calls as f64)
}

/// Put-call ratio on traded volume. Errors on a chain with no call volume.
pub fn pcr_volume(snapshot: &OptionChainSnapshot) -> Result<f64, SnapshotError> {
    let calls = snapshot.total_volume(OptionType::Call);
    if calls == 0 {
        return Err(SnapshotError::ZeroCallVolume);
    }
    Ok(snapshot.total_volume(OptionType::Put) as f64 / calls as f64)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub risk_free_rate: f64,
    pub dividend_yield: f64,
    pub pricing_model: PricingModel,
    /// Strike grid spacing of the underlying (100 for NIFTY).
    pub strike_step: Decimal,
    /// Recover a missing IV from the last traded premium before giving up
    /// on a side.
    pub solve_missing_iv: bool,
    /// Fail the whole computation on the first side that cannot be priced
    /// instead of skipping it.
    pub strict_pricing: bool,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.065,
            dividend_yield: 0.012,
            pricing_model: PricingModel::default(),
            strike_step: Decimal::from(100),
            solve_missing_iv: true,
            strict_pricing: false,
        }
    }
}

/// Greeks for both sides of one strike, with the vol each side was
/// priced at. A side that could not be priced is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeGreeks {
    pub strike: Decimal,
    pub call: Option<Greeks>,
    pub put: Option<Greeks>,
    pub call_iv: Option<f64>,
    pub put_iv: Option<f64>,
}

/// Everything computed from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub underlying: String,
    pub computed_at: DateTime<Utc>,
    pub expiry: NaiveDate,
    pub spot: Decimal,
    pub pcr_oi: f64,
    pub pcr_volume: f64,
    pub max_pain: Decimal,
    pub max_pain_loss: Decimal,
    pub total_call_oi: i64,
    pub total_put_oi: i64,
    pub total_call_volume: i64,
    pub total_put_volume: i64,
    pub atm_strike: Decimal,
    pub atm_call_iv: Option<f64>,
    pub atm_put_iv: Option<f64>,
    pub greeks: Vec<StrikeGreeks>,
    /// Sides that had no usable quote or failed to price.
    pub skipped_sides: usize,
}

impl IndicatorSet {
    /// Distance from spot to max pain, as a percentage of max pain.
    pub fn pin_distance_pct(&self) -> f64 {
        let gap = (self.spot - self.max_pain).abs();
        (gap / self.max_pain * Decimal::ONE_HUNDRED)
            .to_f64()
            .unwrap_or(f64::NAN)
    }
}

pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Compute the full indicator set for one snapshot.
    pub fn compute(&self, snapshot: &OptionChainSnapshot) -> Result<IndicatorSet, IndicatorError> {
        let days = snapshot.days_to_expiry();
        if days <= 0 {
            return Err(IndicatorError::Expired { days });
        }
        let time = snapshot.years_to_expiry();

        let pcr_oi = pcr_open_interest(snapshot)?;
        let pcr_vol = pcr_volume(snapshot)?;
        let pain = max_pain(snapshot).ok_or_else(|| SnapshotError::EmptyChain {
            underlying: snapshot.underlying.clone(),
            expiry: snapshot.expiry,
        })?;

        let spot = snapshot.spot.to_f64().unwrap_or(0.0);
        let mut skipped_sides = 0usize;
        let mut greeks = Vec::with_capacity(snapshot.len());
        for record in snapshot.records() {
            let (call, call_iv) =
                self.side_greeks(spot, record, time, OptionType::Call, &mut skipped_sides)?;
            let (put, put_iv) =
                self.side_greeks(spot, record, time, OptionType::Put, &mut skipped_sides)?;
            greeks.push(StrikeGreeks {
                strike: record.strike,
                call,
                put,
                call_iv,
                put_iv,
            });
        }

        let atm_strike = snapshot.atm_strike(self.config.strike_step);
        let atm_row = greeks.iter().find(|g| g.strike == atm_strike);
        let atm_call_iv = atm_row.and_then(|g| g.call_iv);
        let atm_put_iv = atm_row.and_then(|g| g.put_iv);

        let set = IndicatorSet {
            underlying: snapshot.underlying.clone(),
            computed_at: snapshot.captured_at,
            expiry: snapshot.expiry,
            spot: snapshot.spot,
            pcr_oi,
            pcr_volume: pcr_vol,
            max_pain: pain.strike,
            max_pain_loss: pain.total_loss,
            total_call_oi: snapshot.total_open_interest(OptionType::Call),
            total_put_oi: snapshot.total_open_interest(OptionType::Put),
            total_call_volume: snapshot.total_volume(OptionType::Call),
            total_put_volume: snapshot.total_volume(OptionType::Put),
            atm_strike,
            atm_call_iv,
            atm_put_iv,
            greeks,
            skipped_sides,
        };

        debug!(
            underlying = %set.underlying,
            expiry = %set.expiry,
            pcr_oi = set.pcr_oi,
            max_pain = %set.max_pain,
            skipped_sides = set.skipped_sides,
            "computed indicator set"
        );
        Ok(set)
    }

    /// Price one side of one strike. Resolves the vol from the quoted IV,
    /// falling back to solving from premium when configured. Returns
    /// `(None, None)` and bumps the skip counter when the side has no
    /// usable quote; propagates the failure instead in strict mode when a
    /// pricing attempt itself fails.
    fn side_greeks(
        &self,
        spot: f64,
        record: &StrikeRecord,
        time: f64,
        side: OptionType,
        skipped: &mut usize,
    ) -> Result<(Option<Greeks>, Option<f64>), IndicatorError> {
        let strike = record.strike;
        let strike_f = strike.to_f64().unwrap_or(0.0);
        let cfg = &self.config;

        let vol = if record.iv(side) > 0.0 {
            Some(record.iv(side))
        } else if cfg.solve_missing_iv {
            let ltp = record.ltp(side).to_f64().unwrap_or(0.0);
            if ltp > 0.0 {
                match cfg.pricing_model.implied_vol(
                    cfg.risk_free_rate,
                    cfg.dividend_yield,
                    side,
                    ltp,
                    spot,
                    strike_f,
                    time,
                ) {
                    Ok(v) => Some(v),
                    Err(source) if cfg.strict_pricing => {
                        return Err(IndicatorError::Pricing {
                            side,
                            strike,
                            source,
                        });
                    }
                    Err(_) => None,
                }
            } else {
                None
            }
        } else {
            None
        };

        let vol = match vol {
            Some(v) => v,
            None => {
                *skipped += 1;
                return Ok((None, None));
            }
        };

        match cfg
            .pricing_model
            .greeks(cfg.risk_free_rate, cfg.dividend_yield, side, spot, strike_f, time, vol)
        {
            Ok(g) => Ok((Some(g), Some(vol))),
            Err(source) if cfg.strict_pricing => Err(IndicatorError::Pricing {
                side,
                strike,
                source,
            }),
            Err(_) => {
                *skipped += 1;
                Ok((None, None))
            }
        }
    }
}
