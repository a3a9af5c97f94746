//! Spreadsheet append sink for classification entries
//!
//! The pricing workflow persists item classifications to a shared
//! sheet. The sink contract is append-only with a caller-declared dedup
//! key: rows whose key already exists in the sink are silently skipped.
//! A CSV-file implementation backs local runs and tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink is missing dedup column '{0}'")]
    MissingDedupColumn(String),

    #[error("sink header does not match entry columns (expected {expected:?})")]
    HeaderMismatch { expected: Vec<String> },

    #[error("sink IO error: {0}")]
    Io(String),
}

/// A batch of rows headed for the sink, with explicit column order.
#[derive(Debug, Clone)]
pub struct SinkBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Append-only tabular sink with key-based dedup.
pub trait SheetSink {
    /// Append rows, skipping any whose dedup key already exists.
    /// Returns the number of rows actually written.
    fn append(&mut self, batch: &SinkBatch, dedup_columns: &[String]) -> Result<usize, SinkError>;
}

/// CSV-file sink. The first appended batch defines the header.
pub struct CsvSheetSink {
    path: PathBuf,
}

impl CsvSheetSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn read_existing(&self) -> Result<Option<(Vec<String>, Vec<Vec<String>>)>, SinkError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut reader = csv::Reader::from_path(&self.path)
            .map_err(|e| SinkError::Io(e.to_string()))?;
        let header: Vec<String> = reader
            .headers()
            .map_err(|e| SinkError::Io(e.to_string()))?
            .iter()
            .map(|h| h.to_string())
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| SinkError::Io(e.to_string()))?;
            rows.push(record.iter().map(|c| c.to_string()).collect());
        }
        Ok(Some((header, rows)))
    }
}

fn key_of(columns: &[String], row: &[String], dedup: &[String]) -> Result<Vec<String>, SinkError> {
    dedup
        .iter()
        .map(|col| {
            columns
                .iter()
                .position(|c| c == col)
                .map(|i| row.get(i).cloned().unwrap_or_default())
                .ok_or_else(|| SinkError::MissingDedupColumn(col.clone()))
        })
        .collect()
}

impl SheetSink for CsvSheetSink {
    fn append(&mut self, batch: &SinkBatch, dedup_columns: &[String]) -> Result<usize, SinkError> {
        let existing = self.read_existing()?;
        let (header, mut rows) = match existing {
            Some((header, rows)) => {
                if header != batch.columns {
                    return Err(SinkError::HeaderMismatch { expected: header });
                }
                (header, rows)
            }
            None => (batch.columns.clone(), Vec::new()),
        };

        let mut seen: HashSet<Vec<String>> = HashSet::new();
        for row in &rows {
            seen.insert(key_of(&header, row, dedup_columns)?);
        }

        let mut written = 0usize;
        for row in &batch.rows {
            let key = key_of(&batch.columns, row, dedup_columns)?;
            if seen.insert(key) {
                rows.push(row.clone());
                written += 1;
            }
        }

        let mut writer =
            csv::Writer::from_path(&self.path).map_err(|e| SinkError::Io(e.to_string()))?;
        writer
            .write_record(&header)
            .map_err(|e| SinkError::Io(e.to_string()))?;
        for row in &rows {
            writer
                .write_record(row)
                .map_err(|e| SinkError::Io(e.to_string()))?;
        }
        writer.flush().map_err(|e| SinkError::Io(e.to_string()))?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(rows: Vec<Vec<&str>>) -> SinkBatch {
        SinkBatch {
            columns: vec!["rfq_id".into(), "item_id".into(), "mp_id".into(), "category".into()],
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(String::from).collect())
                .collect(),
        }
    }

    fn dedup() -> Vec<String> {
        vec!["rfq_id".into(), "item_id".into(), "mp_id".into()]
    }

    #[test]
    fn duplicate_keys_are_silently_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.csv");
        let mut sink = CsvSheetSink::new(&path);

        let first = sink
            .append(&batch(vec![vec!["1", "10", "mp1", "Castings"]]), &dedup())
            .unwrap();
        assert_eq!(first, 1);

        // Same key again, different payload: skipped. New key: written.
        let second = sink
            .append(
                &batch(vec![
                    vec!["1", "10", "mp1", "Forgings"],
                    vec!["1", "11", "mp1", "Castings"],
                ]),
                &dedup(),
            )
            .unwrap();
        assert_eq!(second, 1);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.records().count(), 2);
    }

    #[test]
    fn unknown_dedup_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSheetSink::new(&dir.path().join("entries.csv"));
        let err = sink
            .append(&batch(vec![vec!["1", "10", "mp1", "x"]]), &["nope".into()])
            .unwrap_err();
        assert!(matches!(err, SinkError::MissingDedupColumn(_)));
    }
}
