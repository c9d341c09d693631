//! Append-only JSONL logs of flat analytic records.
//!
//! One JSON record per line, appended per snapshot/expiry, so indicator and
//! backtest history accumulates across runs without rewriting files.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Append-only log of one record type.
pub struct RecordLog<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> RecordLog<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a JSON line.
    pub fn append(&self, record: &T) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }

    pub fn append_all(&self, records: &[T]) -> Result<(), HistoryError> {
        for record in records {
            self.append(record)?;
        }
        Ok(())
    }

    /// Read every record back, in append order. A missing file is an empty
    /// log, not an error.
    pub fn read_all(&self) -> Result<Vec<T>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        expiry: String,
        value: f64,
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log: RecordLog<Row> = RecordLog::new(dir.path().join("rows.jsonl"));

        log.append(&Row {
            expiry: "2024-06-27".to_string(),
            value: 23450.0,
        })
        .unwrap();
        log.append(&Row {
            expiry: "2024-07-25".to_string(),
            value: 23600.0,
        })
        .unwrap();

        let rows = log.read_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].expiry, "2024-06-27");
        assert_eq!(rows[1].value, 23600.0);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log: RecordLog<Row> = RecordLog::new(dir.path().join("absent.jsonl"));
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_append_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("nifty").join("rows.jsonl");
        let log: RecordLog<Row> = RecordLog::new(&nested);
        log.append(&Row {
            expiry: "2024-06-27".to_string(),
            value: 1.0,
        })
        .unwrap();
        assert!(nested.exists());
    }
}
