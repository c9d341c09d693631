//! Chain file loader.
//!
//! Loads captured option-chain files (parquet) into validated snapshots for
//! offline analysis. Files hold one row per strike in exchange display
//! shape, both sides on the row:
//! - underlying, captured_at (RFC 3339), expiry (YYYY-MM-DD), strike, spot
//! - call_oi, call_volume, call_iv, call_ltp
//! - put_oi, put_volume, put_iv, put_ltp

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;
use thiserror::Error;

use super::feed::{records_to_snapshots, RawChainRecord};
use super::types::{OptionChainSnapshot, SnapshotError};

/// Expected columns in captured chain files.
pub const EXPECTED_COLUMNS: &[&str] = &[
    "underlying",
    "captured_at",
    "expiry",
    "strike",
    "spot",
    "call_oi",
    "call_volume",
    "call_iv",
    "call_ltp",
    "put_oi",
    "put_volume",
    "put_iv",
    "put_ltp",
];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parquet loader for captured chain files.
pub struct ChainLoader {
    data_dir: PathBuf,
}

impl ChainLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Parquet files in the data directory, sorted by name. File naming is
    /// free-form; capture time ordering comes from the rows themselves.
    pub fn chain_files(&self) -> Result<Vec<PathBuf>, LoaderError> {
        if !self.data_dir.exists() {
            return Err(LoaderError::FileNotFound(
                self.data_dir.to_string_lossy().to_string(),
            ));
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.extension().map(|x| x == "parquet").unwrap_or(false) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Load all snapshots from one file.
    pub fn load_file(&self, path: &Path) -> Result<Vec<OptionChainSnapshot>, LoaderError> {
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.to_string_lossy().to_string()));
        }
        let df = LazyFrame::scan_parquet(path, ScanArgsParquet::default())?.collect()?;
        check_schema(&df)?;
        let raws = df_to_raw_records(&df)?;
        Ok(records_to_snapshots(&raws)?)
    }

    /// Load every file in the directory, ordered by capture instant then
    /// expiry.
    pub fn load_dir(&self) -> Result<Vec<OptionChainSnapshot>, LoaderError> {
        let files = self.chain_files()?;
        if files.is_empty() {
            return Err(LoaderError::InvalidData(format!(
                "No parquet files in {}",
                self.data_dir.to_string_lossy()
            )));
        }
        let mut snapshots = Vec::new();
        for file in files {
            snapshots.extend(self.load_file(&file)?);
        }
        snapshots.sort_by(|a, b| (a.captured_at, a.expiry).cmp(&(b.captured_at, b.expiry)));
        Ok(snapshots)
    }

    /// Load the directory, keeping only one expiry.
    pub fn load_expiry(&self, expiry: NaiveDate) -> Result<Vec<OptionChainSnapshot>, LoaderError> {
        let mut snapshots = self.load_dir()?;
        snapshots.retain(|s| s.expiry == expiry);
        Ok(snapshots)
    }
}

/// Verify all expected columns are present.
fn check_schema(df: &DataFrame) -> Result<(), LoaderError> {
    let present: HashSet<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    let missing: Vec<&str> = EXPECTED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !present.contains(*c))
        .collect();
    if !missing.is_empty() {
        return Err(LoaderError::InvalidData(format!(
            "Missing columns: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

/// Accept RFC 3339 or a plain UTC `YYYY-MM-DD HH:MM:SS` stamp.
fn parse_captured_at(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn df_to_raw_records(df: &DataFrame) -> Result<Vec<RawChainRecord>, LoaderError> {
    let underlying = df.column("underlying")?.str()?;
    let captured_at = df.column("captured_at")?.str()?;
    let expiry = df.column("expiry")?.str()?;
    let strike = df.column("strike")?.f64()?;
    let spot = df.column("spot")?.f64()?;
    let call_oi = df.column("call_oi")?.i64()?;
    let call_volume = df.column("call_volume")?.i64()?;
    let call_iv = df.column("call_iv")?.f64()?;
    let call_ltp = df.column("call_ltp")?.f64()?;
    let put_oi = df.column("put_oi")?.i64()?;
    let put_volume = df.column("put_volume")?.i64()?;
    let put_iv = df.column("put_iv")?.f64()?;
    let put_ltp = df.column("put_ltp")?.f64()?;

    let mut records = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let row_err = |field: &str| {
            LoaderError::InvalidData(format!("Row {}: missing or invalid {}", idx, field))
        };

        let captured = captured_at
            .get(idx)
            .and_then(parse_captured_at)
            .ok_or_else(|| row_err("captured_at"))?;
        let expiry_date = expiry
            .get(idx)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .ok_or_else(|| row_err("expiry"))?;

        records.push(RawChainRecord {
            underlying: underlying.get(idx).ok_or_else(|| row_err("underlying"))?.to_string(),
            captured_at: captured,
            expiry: expiry_date,
            strike: strike.get(idx).ok_or_else(|| row_err("strike"))?,
            spot: spot.get(idx).ok_or_else(|| row_err("spot"))?,
            call_oi: call_oi.get(idx),
            call_oi_change: None,
            call_volume: call_volume.get(idx),
            call_iv: call_iv.get(idx),
            call_ltp: call_ltp.get(idx),
            put_oi: put_oi.get(idx),
            put_oi_change: None,
            put_volume: put_volume.get(idx),
            put_iv: put_iv.get(idx),
            put_ltp: put_ltp.get(idx),
        });
    }
    Ok(records)
}
