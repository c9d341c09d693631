//! Max pain: the settlement level where option writers pay out the least.
//!
//! For each candidate settlement (every strike in the chain), sum the
//! intrinsic payout owed to holders across all strikes, weighted by open
//! interest. The strike with the smallest total is the max pain level.
//! All arithmetic stays in `Decimal`, so the profile is exact and ties
//! are real ties.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::types::OptionChainSnapshot;

/// Writer payout if the underlying settles at `strike`, split by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PainPoint {
    pub strike: Decimal,
    pub call_loss: Decimal,
    pub put_loss: Decimal,
    pub total_loss: Decimal,
}

/// Writer loss at every candidate settlement, ascending by strike.
pub fn pain_profile(snapshot: &OptionChainSnapshot) -> Vec<PainPoint> {
    let records = snapshot.records();
    records
        .iter()
        .map(|candidate| {
            let mut call_loss = Decimal::ZERO;
            let mut put_loss = Decimal::ZERO;
            for record in records {
                // Calls pay out when settlement clears the strike.
                if candidate.strike > record.strike {
                    call_loss +=
                        (candidate.strike - record.strike) * Decimal::from(record.call_oi);
                }
                // Puts pay out when settlement undercuts the strike.
                if candidate.strike < record.strike {
                    put_loss += (record.strike - candidate.strike) * Decimal::from(record.put_oi);
                }
            }
            PainPoint {
                strike: candidate.strike,
                call_loss,
                put_loss,
                total_loss: call_loss + put_loss,
            }
        })
        .collect()
}

/// The strike minimizing writer loss. Ties resolve to the lowest strike.
/// `None` only for a profile with no strikes, which a validated snapshot
/// cannot produce.
pub fn max_pain(snapshot: &OptionChainSnapshot) -> Option<PainPoint> {
    pain_profile(snapshot)
        .into_iter()
        .min_by(|a, b| a.total_loss.cmp(&b.total_loss))
}
