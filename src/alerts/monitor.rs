//! Threshold alerts over computed indicator sets.
//!
//! The monitor is stateless: every call gets the current set and, for
//! the move rule, whichever prior set the caller holds. Emitting,
//! deduplicating and routing the events is the caller's business.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::indicators::IndicatorSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    PcrHigh,
    PcrLow,
    MaxPainMove,
    PinProximity,
}

/// Threshold set. A rule left as `None` never fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertRules {
    /// Fires when PCR(OI) exceeds this level.
    pub pcr_high: Option<f64>,
    /// Fires when PCR(OI) drops under this level.
    pub pcr_low: Option<f64>,
    /// Fires when max pain moved at least this many points since the
    /// prior set.
    pub max_pain_move_points: Option<Decimal>,
    /// Fires when spot sits within this percentage of max pain.
    pub pin_proximity_pct: Option<f64>,
}

impl Default for AlertRules {
    fn default() -> Self {
        Self {
            pcr_high: Some(1.5),
            pcr_low: Some(0.5),
            max_pain_move_points: Some(Decimal::from(100)),
            pin_proximity_pct: Some(0.25),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub underlying: String,
    pub expiry: NaiveDate,
    pub observed_at: DateTime<Utc>,
    /// The measured value that tripped the rule.
    pub value: f64,
    pub threshold: f64,
    pub message: String,
}

pub struct AlertMonitor {
    rules: AlertRules,
}

impl AlertMonitor {
    pub fn new(rules: AlertRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &AlertRules {
        &self.rules
    }

    /// Check the current set against every configured rule. The move rule
    /// only runs when a prior set for the same chain is supplied.
    pub fn check(
        &self,
        previous: Option<&IndicatorSet>,
        current: &IndicatorSet,
    ) -> Vec<AlertEvent> {
        let mut events = Vec::new();

        if let Some(threshold) = self.rules.pcr_high {
            if current.pcr_oi > threshold {
                events.push(self.event(
                    current,
                    AlertKind::PcrHigh,
                    current.pcr_oi,
                    threshold,
                    format!("PCR(OI) {:.2} above {:.2}", current.pcr_oi, threshold),
                ));
            }
        }
        if let Some(threshold) = self.rules.pcr_low {
            if current.pcr_oi < threshold {
                events.push(self.event(
                    current,
                    AlertKind::PcrLow,
                    current.pcr_oi,
                    threshold,
                    format!("PCR(OI) {:.2} under {:.2}", current.pcr_oi, threshold),
                ));
            }
        }
        if let (Some(min_points), Some(prev)) = (self.rules.max_pain_move_points, previous) {
            let comparable =
                prev.underlying == current.underlying && prev.expiry == current.expiry;
            if comparable {
                let moved = (current.max_pain - prev.max_pain).abs();
                if moved >= min_points {
                    events.push(self.event(
                        current,
                        AlertKind::MaxPainMove,
                        moved.to_f64().unwrap_or(f64::NAN),
                        min_points.to_f64().unwrap_or(f64::NAN),
                        format!(
                            "Max pain moved {} points ({} to {})",
                            moved, prev.max_pain, current.max_pain
                        ),
                    ));
                }
            }
        }
        if let Some(threshold) = self.rules.pin_proximity_pct {
            let distance = current.pin_distance_pct();
            if distance <= threshold {
                events.push(self.event(
                    current,
                    AlertKind::PinProximity,
                    distance,
                    threshold,
                    format!(
                        "Spot {} within {:.2}% of max pain {}",
                        current.spot, distance, current.max_pain
                    ),
                ));
            }
        }

        for event in &events {
            warn!(
                kind = ?event.kind,
                underlying = %event.underlying,
                value = event.value,
                threshold = event.threshold,
                "{}", event.message
            );
        }
        events
    }

    fn event(
        &self,
        set: &IndicatorSet,
        kind: AlertKind,
        value: f64,
        threshold: f64,
        message: String,
    ) -> AlertEvent {
        AlertEvent {
            kind,
            underlying: set.underlying.clone(),
            expiry: set.expiry,
            observed_at: set.computed_at,
            value,
            threshold,
            message,
        }
    }
}
