pub mod monitor;

pub use monitor::{AlertEvent, AlertKind, AlertMonitor, AlertRules};
