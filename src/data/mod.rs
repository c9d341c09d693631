pub mod calendar;
pub mod feed;
pub mod history;
pub mod loader;
pub mod types;

pub use feed::{records_to_snapshots, RawChainRecord};
pub use history::{HistoryError, RecordLog};
pub use loader::{ChainLoader, LoaderError, EXPECTED_COLUMNS};
pub use types::{Greeks, OptionChainSnapshot, OptionType, SnapshotError, StrikeRecord};
