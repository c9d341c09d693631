//! Backtesting the max pain prediction against realized settlements.
//!
//! - Per-expiry evaluation with a lookback cutoff (`comparator`)
//! - Parallel batch evaluation over many expiries
//! - Aggregate hit-rate and error statistics (`report`)

pub mod comparator;
pub mod report;

pub use comparator::{
    BacktestComparator, BacktestConfig, BacktestError, BacktestItem, BacktestResult,
    SettlementBook, SettlementBookError,
};
pub use report::BacktestReport;
