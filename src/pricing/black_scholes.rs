//! Black-Scholes pricing for cash-settled index options.
//!
//! Prices and Greeks use continuous dividend yield. Greeks come back in
//! display units: theta per calendar day, vega and rho per percentage
//! point.

use statrs::distribution::{ContinuousCDF, Normal};

use super::model::{
    check_inputs, check_vol, PricingError, MAX_ITERATIONS, MAX_VOL, MIN_VOL, TOLERANCE,
};
use crate::data::types::{Greeks, OptionType};

#[derive(Debug, Clone, Copy)]
pub struct BlackScholes {
    pub risk_free_rate: f64,
    pub dividend_yield: f64,
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.065,
            dividend_yield: 0.012,
        }
    }
}

impl BlackScholes {
    pub fn new(risk_free_rate: f64, dividend_yield: f64) -> Self {
        Self {
            risk_free_rate,
            dividend_yield,
        }
    }

    fn norm_cdf(x: f64) -> f64 {
        let normal = Normal::new(0.0, 1.0).unwrap();
        normal.cdf(x)
    }

    fn norm_pdf(x: f64) -> f64 {
        (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
    }

    fn d1(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        ((spot / strike).ln()
            + (self.risk_free_rate - self.dividend_yield + 0.5 * vol * vol) * time)
            / (vol * time.sqrt())
    }

    fn d2(d1: f64, vol: f64, time: f64) -> f64 {
        d1 - vol * time.sqrt()
    }

    /// Call price. Collapses to intrinsic value at or past expiry.
    pub fn call_price(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        if time <= 0.0 || vol <= 0.0 {
            return (spot - strike).max(0.0);
        }
        let d1 = self.d1(spot, strike, time, vol);
        let d2 = Self::d2(d1, vol, time);
        spot * (-self.dividend_yield * time).exp() * Self::norm_cdf(d1)
            - strike * (-self.risk_free_rate * time).exp() * Self::norm_cdf(d2)
    }

    /// Put price. Collapses to intrinsic value at or past expiry.
    pub fn put_price(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        if time <= 0.0 || vol <= 0.0 {
            return (strike - spot).max(0.0);
        }
        let d1 = self.d1(spot, strike, time, vol);
        let d2 = Self::d2(d1, vol, time);
        strike * (-self.risk_free_rate * time).exp() * Self::norm_cdf(-d2)
            - spot * (-self.dividend_yield * time).exp() * Self::norm_cdf(-d1)
    }

    pub fn price(
        &self,
        option_type: OptionType,
        spot: f64,
        strike: f64,
        time: f64,
        vol: f64,
    ) -> f64 {
        match option_type {
            OptionType::Call => self.call_price(spot, strike, time, vol),
            OptionType::Put => self.put_price(spot, strike, time, vol),
        }
    }

    /// Full Greek set for one contract.
    pub fn greeks(
        &self,
        option_type: OptionType,
        spot: f64,
        strike: f64,
        time: f64,
        vol: f64,
    ) -> Result<Greeks, PricingError> {
        check_inputs(spot, strike, time)?;
        check_vol(vol)?;

        let sqrt_t = time.sqrt();
        let d1 = self.d1(spot, strike, time, vol);
        let d2 = Self::d2(d1, vol, time);
        let div_disc = (-self.dividend_yield * time).exp();
        let rate_disc = (-self.risk_free_rate * time).exp();
        let pdf_d1 = Self::norm_pdf(d1);

        let gamma = div_disc * pdf_d1 / (spot * vol * sqrt_t);
        let vega = spot * div_disc * pdf_d1 * sqrt_t / 100.0;
        let theta_core = -spot * div_disc * pdf_d1 * vol / (2.0 * sqrt_t);

        let (delta, theta, rho) = match option_type {
            OptionType::Call => {
                let delta = div_disc * Self::norm_cdf(d1);
                let theta = theta_core
                    - self.risk_free_rate * strike * rate_disc * Self::norm_cdf(d2)
                    + self.dividend_yield * spot * div_disc * Self::norm_cdf(d1);
                let rho = strike * time * rate_disc * Self::norm_cdf(d2) / 100.0;
                (delta, theta, rho)
            }
            OptionType::Put => {
                let delta = div_disc * (Self::norm_cdf(d1) - 1.0);
                let theta = theta_core
                    + self.risk_free_rate * strike * rate_disc * Self::norm_cdf(-d2)
                    - self.dividend_yield * spot * div_disc * Self::norm_cdf(-d1);
                let rho = -strike * time * rate_disc * Self::norm_cdf(-d2) / 100.0;
                (delta, theta, rho)
            }
        };

        Ok(Greeks {
            delta,
            gamma,
            theta: theta / 365.0,
            vega,
            rho,
        })
    }

    /// Newton-Raphson implied volatility from a traded premium.
    pub fn implied_vol(
        &self,
        option_type: OptionType,
        market_price: f64,
        spot: f64,
        strike: f64,
        time: f64,
    ) -> Result<f64, PricingError> {
        check_inputs(spot, strike, time)?;
        if market_price <= 0.0 {
            return Err(PricingError::NoConvergence {
                price: market_price,
                strike,
            });
        }

        // Brenner-Subrahmanyam starting point.
        let mut vol = ((2.0 * std::f64::consts::PI / time).sqrt() * market_price / spot)
            .clamp(0.05, 2.0);

        for _ in 0..MAX_ITERATIONS {
            let price = self.price(option_type, spot, strike, time, vol);
            let diff = price - market_price;
            if diff.abs() < TOLERANCE {
                return Ok(vol);
            }
            let d1 = self.d1(spot, strike, time, vol);
            let vega =
                spot * (-self.dividend_yield * time).exp() * Self::norm_pdf(d1) * time.sqrt();
            if vega.abs() < 1e-10 {
                break;
            }
            vol = (vol - diff / vega).clamp(MIN_VOL, MAX_VOL);
        }

        Err(PricingError::NoConvergence {
            price: market_price,
            strike,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn textbook() -> BlackScholes {
        BlackScholes::new(0.05, 0.0)
    }

    #[test]
    fn test_call_price_known_value() {
        let bs = textbook();
        let call = bs.call_price(100.0, 100.0, 1.0, 0.2);
        assert_relative_eq!(call, 10.4506, epsilon = 1e-3);
    }

    #[test]
    fn test_put_call_parity() {
        let bs = BlackScholes::new(0.065, 0.012);
        let spot = 23480.0;
        let strike = 23500.0;
        let time = 7.0 / 365.0;
        let vol = 0.14;

        let call = bs.call_price(spot, strike, time, vol);
        let put = bs.put_price(spot, strike, time, vol);
        let forward_leg = spot * (-bs.dividend_yield * time).exp()
            - strike * (-bs.risk_free_rate * time).exp();
        assert_relative_eq!(call - put, forward_leg, epsilon = 1e-8);
    }

    #[test]
    fn test_intrinsic_at_expiry() {
        let bs = textbook();
        assert_relative_eq!(bs.call_price(105.0, 100.0, 0.0, 0.2), 5.0);
        assert_relative_eq!(bs.put_price(95.0, 100.0, 0.0, 0.2), 5.0);
        assert_relative_eq!(bs.call_price(95.0, 100.0, 0.0, 0.2), 0.0);
    }

    #[test]
    fn test_greeks_atm_call() {
        let bs = textbook();
        let greeks = bs.greeks(OptionType::Call, 100.0, 100.0, 1.0, 0.2).unwrap();

        // d1 = 0.35 with these inputs.
        assert_relative_eq!(greeks.delta, 0.6368, epsilon = 1e-3);
        assert!(greeks.gamma > 0.0);
        assert!(greeks.theta < 0.0);
        assert!(greeks.vega > 0.0);
        assert!(greeks.rho > 0.0);
    }

    #[test]
    fn test_greeks_put_delta_negative() {
        let bs = textbook();
        let greeks = bs.greeks(OptionType::Put, 100.0, 100.0, 1.0, 0.2).unwrap();
        assert!(greeks.delta < 0.0);
        assert!(greeks.delta > -1.0);
        assert!(greeks.rho < 0.0);
    }

    #[test]
    fn test_delta_bounds_deep_itm_otm() {
        let bs = textbook();
        let itm = bs.greeks(OptionType::Call, 150.0, 100.0, 0.1, 0.2).unwrap();
        let otm = bs.greeks(OptionType::Call, 60.0, 100.0, 0.1, 0.2).unwrap();
        assert!(itm.delta > 0.95);
        assert!(otm.delta < 0.05);
    }

    #[test]
    fn test_greeks_rejects_bad_inputs() {
        let bs = textbook();
        assert!(matches!(
            bs.greeks(OptionType::Call, -1.0, 100.0, 1.0, 0.2),
            Err(PricingError::NonPositiveSpot(_))
        ));
        assert!(matches!(
            bs.greeks(OptionType::Call, 100.0, 100.0, 0.0, 0.2),
            Err(PricingError::NonPositiveTime(_))
        ));
        assert!(matches!(
            bs.greeks(OptionType::Call, 100.0, 100.0, 1.0, 0.0),
            Err(PricingError::NonPositiveVol(_))
        ));
    }

    #[test]
    fn test_implied_vol_round_trip() {
        let bs = BlackScholes::new(0.065, 0.012);
        let price = bs.call_price(23480.0, 23500.0, 14.0 / 365.0, 0.18);
        let vol = bs
            .implied_vol(OptionType::Call, price, 23480.0, 23500.0, 14.0 / 365.0)
            .unwrap();
        assert_relative_eq!(vol, 0.18, epsilon = 1e-4);
    }

    #[test]
    fn test_implied_vol_put_round_trip() {
        let bs = BlackScholes::new(0.065, 0.012);
        let price = bs.put_price(23480.0, 23200.0, 7.0 / 365.0, 0.22);
        let vol = bs
            .implied_vol(OptionType::Put, price, 23480.0, 23200.0, 7.0 / 365.0)
            .unwrap();
        assert_relative_eq!(vol, 0.22, epsilon = 1e-4);
    }

    #[test]
    fn test_implied_vol_rejects_sub_intrinsic_price() {
        let bs = textbook();
        // Deep ITM call quoted below intrinsic has no solution.
        let result = bs.implied_vol(OptionType::Call, 5.0, 150.0, 100.0, 0.1);
        assert!(matches!(result, Err(PricingError::NoConvergence { .. })));
    }
}
