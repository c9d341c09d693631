//! Raw chain rows as delivered by an external feed collaborator.
//!
//! The engine itself performs no network I/O. A feed layer (broker API
//! client, exchange page fetcher, file reader) produces `RawChainRecord`
//! rows in the exchange display shape; `records_to_snapshots` groups them
//! into validated `OptionChainSnapshot`s.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{OptionChainSnapshot, SnapshotError, StrikeRecord};

/// One flat row of an option-chain page: both sides of one strike.
///
/// Field names follow the feed's camelCase JSON. Side fields missing from
/// the feed default to zero. The exchange also publishes a session ΔOI per
/// side; it is carried through for completeness but the analytics derive
/// changes from snapshot pairs instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChainRecord {
    pub underlying: String,
    pub captured_at: DateTime<Utc>,
    pub expiry: NaiveDate,
    pub strike: f64,
    pub spot: f64,

    // Call side
    #[serde(default)]
    pub call_oi: Option<i64>,
    #[serde(default)]
    pub call_oi_change: Option<i64>,
    #[serde(default)]
    pub call_volume: Option<i64>,
    #[serde(default)]
    pub call_iv: Option<f64>,
    #[serde(default)]
    pub call_ltp: Option<f64>,

    // Put side
    #[serde(default)]
    pub put_oi: Option<i64>,
    #[serde(default)]
    pub put_oi_change: Option<i64>,
    #[serde(default)]
    pub put_volume: Option<i64>,
    #[serde(default)]
    pub put_iv: Option<f64>,
    #[serde(default)]
    pub put_ltp: Option<f64>,
}

impl RawChainRecord {
    /// Convert to a strike row. `None` when the strike itself is unusable.
    pub fn to_strike_record(&self) -> Option<StrikeRecord> {
        let strike = Decimal::try_from(self.strike).ok()?;
        Some(StrikeRecord {
            strike,
            call_oi: self.call_oi.unwrap_or(0),
            call_volume: self.call_volume.unwrap_or(0),
            call_iv: self.call_iv.unwrap_or(0.0),
            call_ltp: Decimal::try_from(self.call_ltp.unwrap_or(0.0)).ok()?,
            put_oi: self.put_oi.unwrap_or(0),
            put_volume: self.put_volume.unwrap_or(0),
            put_iv: self.put_iv.unwrap_or(0.0),
            put_ltp: Decimal::try_from(self.put_ltp.unwrap_or(0.0)).ok()?,
        })
    }
}

/// Group raw rows into validated snapshots.
///
/// Rows are grouped by (underlying, capture instant, expiry); the spot is
/// taken from the first row of each group. Output is ordered by capture
/// instant, then expiry.
pub fn records_to_snapshots(
    records: &[RawChainRecord],
) -> Result<Vec<OptionChainSnapshot>, SnapshotError> {
    type GroupKey = (String, DateTime<Utc>, NaiveDate);
    let mut groups: BTreeMap<GroupKey, (Decimal, Vec<StrikeRecord>)> = BTreeMap::new();

    for raw in records {
        let Some(record) = raw.to_strike_record() else {
            continue;
        };
        let key = (raw.underlying.clone(), raw.captured_at, raw.expiry);
        let spot = Decimal::try_from(raw.spot).unwrap_or(Decimal::ZERO);
        groups
            .entry(key)
            .or_insert_with(|| (spot, Vec::new()))
            .1
            .push(record);
    }

    let mut snapshots = Vec::with_capacity(groups.len());
    for ((underlying, captured_at, expiry), (spot, rows)) in groups {
        snapshots.push(OptionChainSnapshot::from_records(
            captured_at,
            underlying,
            spot,
            expiry,
            rows,
        )?);
    }
    snapshots.sort_by(|a, b| (a.captured_at, a.expiry).cmp(&(b.captured_at, b.expiry)));
    Ok(snapshots)
}
