//! Search audit log
//!
//! Raw-materials searches are recorded so supply chain can see who
//! looked for what, and when. The log's schema comes from a template
//! file at initialization and is locked from then on: an entry that
//! does not carry exactly the template's columns is rejected with the
//! columns it is missing, and a rejected entry leaves the log
//! untouched.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("unsupported template format '.{0}' (expected .csv or .tsv)")]
    UnsupportedFormat(String),

    #[error("entry does not match the log schema; missing columns: {missing:?}")]
    SchemaMismatch { missing: Vec<String> },

    #[error("search log at {0} has not been initialized from a template")]
    NotInitialized(PathBuf),

    #[error("search log error: {0}")]
    Io(String),
}

const TABLE: &str = "search_log";

/// The append-only search log, stored as a single-table SQLite file.
pub struct SearchLog {
    path: PathBuf,
}

impl SearchLog {
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, AuditError> {
        Connection::open(&self.path).map_err(|e| AuditError::Io(e.to_string()))
    }

    fn table_exists(conn: &Connection) -> Result<bool, AuditError> {
        conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [TABLE],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n > 0)
        .map_err(|e| AuditError::Io(e.to_string()))
    }

    /// Create the log with the template's columns. A no-op returning
    /// `false` when the log already exists; re-running can never clobber
    /// recorded searches.
    pub fn init_from_template(&self, template: &Path) -> Result<bool, AuditError> {
        let conn = self.connect()?;
        if Self::table_exists(&conn)? {
            return Ok(false);
        }

        let columns = read_template_columns(template)?;
        let column_defs: Vec<String> = columns.iter().map(|c| format!("\"{c}\" TEXT")).collect();
        conn.execute(
            &format!("CREATE TABLE {TABLE} ({})", column_defs.join(", ")),
            [],
        )
        .map_err(|e| AuditError::Io(e.to_string()))?;
        Ok(true)
    }

    /// The log's column set, in template order.
    pub fn columns(&self) -> Result<Vec<String>, AuditError> {
        let conn = self.connect()?;
        if !Self::table_exists(&conn)? {
            return Err(AuditError::NotInitialized(self.path.clone()));
        }
        let stmt = conn
            .prepare(&format!("SELECT * FROM {TABLE} LIMIT 0"))
            .map_err(|e| AuditError::Io(e.to_string()))?;
        Ok(stmt.column_names().iter().map(|c| c.to_string()).collect())
    }

    /// Append one entry. The entry's columns must match the schema
    /// exactly; on mismatch, nothing is written and the error names
    /// every missing column.
    pub fn append(&self, entry: &[(String, String)]) -> Result<(), AuditError> {
        let columns = self.columns()?;

        let entry_cols: HashSet<&str> = entry.iter().map(|(k, _)| k.as_str()).collect();
        let log_cols: HashSet<&str> = columns.iter().map(String::as_str).collect();
        if entry_cols != log_cols {
            let mut missing: Vec<String> = columns
                .iter()
                .filter(|c| !entry_cols.contains(c.as_str()))
                .cloned()
                .collect();
            missing.sort();
            return Err(AuditError::SchemaMismatch { missing });
        }

        let ordered: Vec<&str> = columns
            .iter()
            .map(|c| {
                entry
                    .iter()
                    .find(|(k, _)| k == c)
                    .map(|(_, v)| v.as_str())
                    .unwrap_or("")
            })
            .collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let quoted: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();

        let conn = self.connect()?;
        conn.execute(
            &format!(
                "INSERT INTO {TABLE} ({}) VALUES ({})",
                quoted.join(", "),
                placeholders.join(", ")
            ),
            rusqlite::params_from_iter(ordered),
        )
        .map_err(|e| AuditError::Io(e.to_string()))?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize, AuditError> {
        let conn = self.connect()?;
        if !Self::table_exists(&conn)? {
            return Err(AuditError::NotInitialized(self.path.clone()));
        }
        conn.query_row(&format!("SELECT count(*) FROM {TABLE}"), [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| n as usize)
        .map_err(|e| AuditError::Io(e.to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, AuditError> {
        Ok(self.len()? == 0)
    }
}

fn read_template_columns(template: &Path) -> Result<Vec<String>, AuditError> {
    let extension = template
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let delimiter = match extension.as_str() {
        "csv" => b',',
        "tsv" => b'\t',
        _ => return Err(AuditError::UnsupportedFormat(extension)),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(template)
        .map_err(|e| AuditError::Io(e.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|e| AuditError::Io(e.to_string()))?;
    Ok(headers.iter().map(|h| h.trim().to_string()).collect())
}

/// A raw-materials search, ready to be logged.
#[derive(Debug)]
pub struct RawMaterialsSearchEntry {
    pub user: String,
    pub state: String,
    pub products: Vec<String>,
    pub mps: Vec<String>,
    pub region: bool,
    pub quotes: bool,
    pub wos: bool,
    pub status: bool,
    pub mp_type: bool,
    pub score: bool,
}

impl RawMaterialsSearchEntry {
    /// Flatten to log columns. Lists are joined with "; ".
    pub fn into_pairs(self, timestamp: DateTime<Utc>) -> Vec<(String, String)> {
        vec![
            ("user".into(), self.user),
            ("date".into(), timestamp.to_rfc3339()),
            ("state".into(), self.state),
            ("products".into(), self.products.join("; ")),
            ("mps".into(), self.mps.join("; ")),
            ("region".into(), self.region.to_string()),
            ("quotes".into(), self.quotes.to_string()),
            ("wos".into(), self.wos.to_string()),
            ("status".into(), self.status.to_string()),
            ("type".into(), self.mp_type.to_string()),
            ("score".into(), self.score.to_string()),
        ]
    }
}
