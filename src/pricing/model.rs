//! Model selection and shared pricing plumbing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::black76::Black76;
use super::black_scholes::BlackScholes;
use crate::data::types::{Greeks, OptionType};

pub(crate) const MAX_ITERATIONS: usize = 100;
pub(crate) const TOLERANCE: f64 = 1e-6;
pub(crate) const MIN_VOL: f64 = 0.001;
pub(crate) const MAX_VOL: f64 = 5.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    #[error("Underlying price must be positive, got {0}")]
    NonPositiveSpot(f64),

    #[error("Strike must be positive, got {0}")]
    NonPositiveStrike(f64),

    #[error("Time to expiry must be positive, got {0}")]
    NonPositiveTime(f64),

    #[error("Volatility must be positive, got {0}")]
    NonPositiveVol(f64),

    #[error("Implied vol did not converge for price {price} at strike {strike}")]
    NoConvergence { price: f64, strike: f64 },
}

pub(crate) fn check_inputs(underlying: f64, strike: f64, time: f64) -> Result<(), PricingError> {
    if underlying <= 0.0 {
        return Err(PricingError::NonPositiveSpot(underlying));
    }
    if strike <= 0.0 {
        return Err(PricingError::NonPositiveStrike(strike));
    }
    if time <= 0.0 {
        return Err(PricingError::NonPositiveTime(time));
    }
    Ok(())
}

pub(crate) fn check_vol(vol: f64) -> Result<(), PricingError> {
    if vol <= 0.0 {
        return Err(PricingError::NonPositiveVol(vol));
    }
    Ok(())
}

/// Which formula prices a side. Selected in configuration, so chains
/// captured against cash and chains captured against futures run
/// through the same engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PricingModel {
    #[default]
    BlackScholes,
    Black76,
}

impl PricingModel {
    pub fn price(
        &self,
        rate: f64,
        dividend: f64,
        option_type: OptionType,
        underlying: f64,
        strike: f64,
        time: f64,
        vol: f64,
    ) -> f64 {
        match self {
            PricingModel::BlackScholes => {
                BlackScholes::new(rate, dividend).price(option_type, underlying, strike, time, vol)
            }
            PricingModel::Black76 => {
                Black76::new(rate).price(option_type, underlying, strike, time, vol)
            }
        }
    }

    pub fn greeks(
        &self,
        rate: f64,
        dividend: f64,
        option_type: OptionType,
        underlying: f64,
        strike: f64,
        time: f64,
        vol: f64,
    ) -> Result<Greeks, PricingError> {
        match self {
            PricingModel::BlackScholes => {
                BlackScholes::new(rate, dividend).greeks(option_type, underlying, strike, time, vol)
            }
            PricingModel::Black76 => {
                Black76::new(rate).greeks(option_type, underlying, strike, time, vol)
            }
        }
    }

    pub fn implied_vol(
        &self,
        rate: f64,
        dividend: f64,
        option_type: OptionType,
        market_price: f64,
        underlying: f64,
        strike: f64,
        time: f64,
    ) -> Result<f64, PricingError> {
        match self {
            PricingModel::BlackScholes => BlackScholes::new(rate, dividend).implied_vol(
                option_type,
                market_price,
                underlying,
                strike,
                time,
            ),
            PricingModel::Black76 => {
                Black76::new(rate).implied_vol(option_type, market_price, underlying, strike, time)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_serde_kebab_case() {
        assert_eq!(
            serde_json::to_string(&PricingModel::BlackScholes).unwrap(),
            "\"black-scholes\""
        );
        let parsed: PricingModel = serde_json::from_str("\"black76\"").unwrap();
        assert_eq!(parsed, PricingModel::Black76);
    }

    #[test]
    fn test_default_is_black_scholes() {
        assert_eq!(PricingModel::default(), PricingModel::BlackScholes);
    }

    #[test]
    fn test_dispatch_matches_direct_call() {
        let model = PricingModel::BlackScholes;
        let direct = BlackScholes::new(0.065, 0.012).call_price(23480.0, 23500.0, 0.04, 0.14);
        let routed = model.price(0.065, 0.012, OptionType::Call, 23480.0, 23500.0, 0.04, 0.14);
        assert_relative_eq!(direct, routed);
    }

    #[test]
    fn test_black76_ignores_dividend() {
        let model = PricingModel::Black76;
        let with_div = model.price(0.065, 0.012, OptionType::Call, 23520.0, 23500.0, 0.04, 0.14);
        let without = model.price(0.065, 0.0, OptionType::Call, 23520.0, 23500.0, 0.04, 0.14);
        assert_relative_eq!(with_div, without);
    }
}
