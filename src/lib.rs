pub mod alerts;
pub mod backtest;
pub mod buildup;
pub mod config;
pub mod data;
pub mod indicators;
pub mod pricing;

// Re-export commonly used types
pub use data::{ChainLoader, OptionChainSnapshot, OptionType, RecordLog, StrikeRecord};
pub use pricing::{Black76, BlackScholes, PricingModel};
pub use indicators::{IndicatorConfig, IndicatorEngine, IndicatorSet, PainPoint};
pub use buildup::{BuildupCategory, BuildupConfig, BuildupReport, SessionSummary};
pub use backtest::{BacktestComparator, BacktestConfig, BacktestReport, BacktestResult};
pub use alerts::{AlertEvent, AlertMonitor, AlertRules};
pub use config::AnalyticsConfig;
