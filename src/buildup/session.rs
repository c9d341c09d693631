//! Windowed buildup summaries over a trading session.
//!
//! Takes the day's snapshots in capture order, classifies every
//! consecutive pair, and buckets the results into fixed-width windows
//! measured from the first capture. The last window's dominant flow is
//! the session's closing trend.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::classifier::{
    classify, dominant_from_counts, BuildupCategory, BuildupConfig, BuildupError,
};
use crate::data::types::OptionChainSnapshot;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Need at least two snapshots to summarize, got {count}")]
    TooFewSnapshots { count: usize },

    #[error("Window length must be positive, got {minutes} minutes")]
    NonPositiveWindow { minutes: i64 },

    #[error(transparent)]
    Buildup(#[from] BuildupError),
}

/// One fixed-width slice of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub index: usize,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Snapshot pairs whose later capture fell in this window.
    pub pairs: usize,
    pub dominant: BuildupCategory,
    pub bullish_entries: usize,
    pub bearish_entries: usize,
}

/// Whole-session view: windows in order plus the closing trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub underlying: String,
    pub expiry: NaiveDate,
    pub session_start: DateTime<Utc>,
    pub session_end: DateTime<Utc>,
    pub windows: Vec<WindowSummary>,
    pub final_trend: BuildupCategory,
}

#[derive(Default)]
struct WindowAccumulator {
    pairs: usize,
    counts: [usize; 5],
    bullish: usize,
    bearish: usize,
}

/// Summarize a session of snapshots into buildup windows.
///
/// Snapshots must share one underlying and expiry and arrive in strictly
/// increasing capture order; violations surface as `BuildupError`s from
/// the pairwise classification. Windows with no pairs still appear, as
/// `Neutral`, so the timeline stays contiguous.
pub fn summarize_session(
    snapshots: &[OptionChainSnapshot],
    window_minutes: i64,
    config: &BuildupConfig,
) -> Result<SessionSummary, SessionError> {
    if snapshots.len() < 2 {
        return Err(SessionError::TooFewSnapshots {
            count: snapshots.len(),
        });
    }
    if window_minutes <= 0 {
        return Err(SessionError::NonPositiveWindow {
            minutes: window_minutes,
        });
    }

    let start = snapshots[0].captured_at;
    let end = snapshots[snapshots.len() - 1].captured_at;

    let mut buckets: BTreeMap<usize, WindowAccumulator> = BTreeMap::new();
    for pair in snapshots.windows(2) {
        let report = classify(&pair[0], &pair[1], config)?;
        let offset_minutes = (pair[1].captured_at - start).num_minutes();
        let index = (offset_minutes / window_minutes) as usize;

        let bucket = buckets.entry(index).or_default();
        bucket.pairs += 1;
        for entry in &report.entries {
            if let Some(pos) = BuildupCategory::ALL.iter().position(|c| *c == entry.category) {
                bucket.counts[pos] += 1;
            }
            if entry.category.is_bullish() {
                bucket.bullish += 1;
            } else if entry.category.is_bearish() {
                bucket.bearish += 1;
            }
        }
    }

    // The map cannot be empty here: len >= 2 guarantees at least one pair.
    let last_index = buckets.keys().next_back().copied().unwrap_or(0);
    let mut windows = Vec::with_capacity(last_index + 1);
    for index in 0..=last_index {
        let starts_at = start + Duration::minutes(index as i64 * window_minutes);
        let ends_at = starts_at + Duration::minutes(window_minutes);
        let window = match buckets.get(&index) {
            Some(bucket) => WindowSummary {
                index,
                starts_at,
                ends_at,
                pairs: bucket.pairs,
                dominant: dominant_from_counts(&bucket.counts),
                bullish_entries: bucket.bullish,
                bearish_entries: bucket.bearish,
            },
            None => WindowSummary {
                index,
                starts_at,
                ends_at,
                pairs: 0,
                dominant: BuildupCategory::Neutral,
                bullish_entries: 0,
                bearish_entries: 0,
            },
        };
        windows.push(window);
    }

    let final_trend = windows
        .last()
        .map(|w| w.dominant)
        .unwrap_or(BuildupCategory::Neutral);

    debug!(
        underlying = %snapshots[0].underlying,
        windows = windows.len(),
        final_trend = final_trend.as_str(),
        "summarized session"
    );

    Ok(SessionSummary {
        underlying: snapshots[0].underlying.clone(),
        expiry: snapshots[0].expiry,
        session_start: start,
        session_end: end,
        windows,
        final_trend,
    })
}
