//! Black-76 pricing against a futures quote.
//!
//! Index option desks often quote against the near futures contract
//! rather than cash. Carry is inside the futures price, so the model
//! takes no dividend yield and discounts the whole payoff at the
//! risk-free rate.

use statrs::distribution::{ContinuousCDF, Normal};

use super::model::{
    check_inputs, check_vol, PricingError, MAX_ITERATIONS, MAX_VOL, MIN_VOL, TOLERANCE,
};
use crate::data::types::{Greeks, OptionType};

#[derive(Debug, Clone, Copy)]
pub struct Black76 {
    pub risk_free_rate: f64,
}

impl Default for Black76 {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.065,
        }
    }
}

impl Black76 {
    pub fn new(risk_free_rate: f64) -> Self {
        Self { risk_free_rate }
    }

    fn norm_cdf(x: f64) -> f64 {
        let normal = Normal::new(0.0, 1.0).unwrap();
        normal.cdf(x)
    }

    fn norm_pdf(x: f64) -> f64 {
        (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
    }

    fn d1(futures: f64, strike: f64, time: f64, vol: f64) -> f64 {
        ((futures / strike).ln() + 0.5 * vol * vol * time) / (vol * time.sqrt())
    }

    pub fn call_price(&self, futures: f64, strike: f64, time: f64, vol: f64) -> f64 {
        if time <= 0.0 || vol <= 0.0 {
            return (futures - strike).max(0.0);
        }
        let d1 = Self::d1(futures, strike, time, vol);
        let d2 = d1 - vol * time.sqrt();
        (-self.risk_free_rate * time).exp()
            * (futures * Self::norm_cdf(d1) - strike * Self::norm_cdf(d2))
    }

    pub fn put_price(&self, futures: f64, strike: f64, time: f64, vol: f64) -> f64 {
        if time <= 0.0 || vol <= 0.0 {
            return (strike - futures).max(0.0);
        }
        let d1 = Self::d1(futures, strike, time, vol);
        let d2 = d1 - vol * time.sqrt();
        (-self.risk_free_rate * time).exp()
            * (strike * Self::norm_cdf(-d2) - futures * Self::norm_cdf(-d1))
    }

    pub fn price(
        &self,
        option_type: OptionType,
        futures: f64,
        strike: f64,
        time: f64,
        vol: f64,
    ) -> f64 {
        match option_type {
            OptionType::Call => self.call_price(futures, strike, time, vol),
            OptionType::Put => self.put_price(futures, strike, time, vol),
        }
    }

    /// Full Greek set. Delta and gamma are against the futures quote.
    pub fn greeks(
        &self,
        option_type: OptionType,
        futures: f64,
        strike: f64,
        time: f64,
        vol: f64,
    ) -> Result<Greeks, PricingError> {
        check_inputs(futures, strike, time)?;
        check_vol(vol)?;

        let sqrt_t = time.sqrt();
        let d1 = Self::d1(futures, strike, time, vol);
        let d2 = d1 - vol * sqrt_t;
        let disc = (-self.risk_free_rate * time).exp();
        let pdf_d1 = Self::norm_pdf(d1);

        let gamma = disc * pdf_d1 / (futures * vol * sqrt_t);
        let vega = futures * disc * pdf_d1 * sqrt_t / 100.0;
        let theta_core = -futures * disc * pdf_d1 * vol / (2.0 * sqrt_t);

        let (delta, theta, rho) = match option_type {
            OptionType::Call => {
                let price = self.call_price(futures, strike, time, vol);
                let delta = disc * Self::norm_cdf(d1);
                let theta = theta_core
                    + self.risk_free_rate * futures * disc * Self::norm_cdf(d1)
                    - self.risk_free_rate * strike * disc * Self::norm_cdf(d2);
                // Discounting is the only rate exposure on a futures option.
                let rho = -time * price / 100.0;
                (delta, theta, rho)
            }
            OptionType::Put => {
                let price = self.put_price(futures, strike, time, vol);
                let delta = -disc * Self::norm_cdf(-d1);
                let theta = theta_core
                    - self.risk_free_rate * futures * disc * Self::norm_cdf(-d1)
                    + self.risk_free_rate * strike * disc * Self::norm_cdf(-d2);
                let rho = -time * price / 100.0;
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
        futures: f64,
        strike: f64,
        time: f64,
    ) -> Result<f64, PricingError> {
        check_inputs(futures, strike, time)?;
        if market_price <= 0.0 {
            return Err(PricingError::NoConvergence {
                price: market_price,
                strike,
            });
        }

        let mut vol = ((2.0 * std::f64::consts::PI / time).sqrt() * market_price / futures)
            .clamp(0.05, 2.0);

        for _ in 0..MAX_ITERATIONS {
            let price = self.price(option_type, futures, strike, time, vol);
            let diff = price - market_price;
            if diff.abs() < TOLERANCE {
                return Ok(vol);
            }
            let d1 = Self::d1(futures, strike, time, vol);
            let vega =
                futures * (-self.risk_free_rate * time).exp() * Self::norm_pdf(d1) * time.sqrt();
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
