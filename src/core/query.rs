//! Query definitions supplied literally or from a file
//!
//! Reconciliation queries live in versioned `.sql` files for the
//! recurring jobs, but callers can also pass query text inline. The
//! caller declares which, there is no guessing.

use std::fs;
use std::path::PathBuf;

use crate::core::source::SourceError;

/// SQL text for one of the datastores, either inline or a path to a file.
#[derive(Debug, Clone)]
pub enum QueryText {
    Literal(String),
    File(PathBuf),
}

impl QueryText {
    /// Produce the query string, reading the file if necessary.
    pub fn resolve(&self) -> Result<String, SourceError> {
        match self {
            QueryText::Literal(sql) => Ok(sql.clone()),
            QueryText::File(path) => fs::read_to_string(path).map_err(|e| {
                SourceError::Io(format!("cannot read query file {}: {e}", path.display()))
            }),
        }
    }
}

impl From<&str> for QueryText {
    fn from(sql: &str) -> Self {
        QueryText::Literal(sql.to_string())
    }
}
