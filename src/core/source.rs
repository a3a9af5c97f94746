//! Datastore adapter seams
//!
//! The engines never talk to Metabase or Salesforce directly. They are
//! handed three capabilities: run a query against the analytics store,
//! run a query against the record store, and write a single field on a
//! single record. Everything else (auth, sessions, HTTP) lives behind
//! these traits.

use std::collections::HashMap;

use thiserror::Error;

use crate::core::query::QueryText;
use crate::core::value::FieldValue;

/// Errors raised while executing a read query. Always fatal to the
/// enclosing operation.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("query execution failed: {0}")]
    Query(String),

    #[error("result is missing column '{column}'")]
    MissingColumn { column: String },

    #[error("paged fetch requires an ordering column")]
    OrderColumnRequired,

    #[error("IO error: {0}")]
    Io(String),
}

/// A single-record write failure. Collected, never propagated.
#[derive(Debug, Error)]
#[error("write to {object_type} {record_id}.{field} failed: {message}")]
pub struct MutationError {
    pub object_type: String,
    pub record_id: String,
    pub field: String,
    pub message: String,
}

/// One row of a query result, keyed by column name.
#[derive(Debug, Clone, Default)]
pub struct SourceRow {
    values: HashMap<String, FieldValue>,
    /// Column order as returned by the store; some operations discover
    /// their metric column positionally.
    columns: Vec<String>,
}

impl SourceRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: &str, value: FieldValue) {
        if !self.values.contains_key(column) {
            self.columns.push(column.to_string());
        }
        self.values.insert(column.to_string(), value);
    }

    pub fn with(mut self, column: &str, value: FieldValue) -> Self {
        self.set(column, value);
        self
    }

    /// Column names in result order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, column: &str) -> FieldValue {
        self.values.get(column).cloned().unwrap_or(FieldValue::Null)
    }

    /// Required text cell; missing or null is a `MissingColumn` error.
    pub fn require_text(&self, column: &str) -> Result<String, SourceError> {
        match self.values.get(column) {
            Some(FieldValue::Text(s)) => Ok(s.clone()),
            Some(v) if !v.is_null() => Ok(v.to_string()),
            _ => Err(SourceError::MissingColumn {
                column: column.to_string(),
            }),
        }
    }

    /// Required cell that may legitimately hold null.
    pub fn require(&self, column: &str) -> Result<FieldValue, SourceError> {
        self.values
            .get(column)
            .cloned()
            .ok_or_else(|| SourceError::MissingColumn {
                column: column.to_string(),
            })
    }

    /// First column after the given identifier columns, for operations
    /// whose metric column is discovered positionally.
    pub fn metric_column(&self, id_columns: &[&str]) -> Option<String> {
        self.columns
            .iter()
            .find(|c| !id_columns.contains(&c.as_str()))
            .cloned()
    }
}

/// Result of an analytics query that may have been cut off at the
/// store's page size. Paging is a normal branch for the caller, not
/// exception-driven control flow.
#[derive(Debug)]
pub enum QueryOutcome {
    /// The full result set.
    Complete(Vec<SourceRow>),
    /// Only the first page; the caller must re-run with an ordering
    /// column via `run_query_paged` to assemble the rest.
    Truncated(Vec<SourceRow>),
}

/// The analytics store ("Metabase" side). Read-only.
pub trait AnalyticsSource {
    fn run_query(&self, sql: &str) -> Result<QueryOutcome, SourceError>;

    /// Ordered paging fallback. The adapter pages internally by
    /// `order_column` and returns the fully assembled result.
    fn run_query_paged(&self, sql: &str, order_column: &str) -> Result<Vec<SourceRow>, SourceError>;
}

/// The authoritative record store ("Salesforce" side). Read path.
pub trait RecordStore {
    fn run_query(&self, sql: &str) -> Result<Vec<SourceRow>, SourceError>;
}

/// The record store's write path: best-effort single-field writes.
pub trait RecordMutator {
    fn update_field(
        &self,
        object_type: &str,
        record_id: &str,
        field: &str,
        value: &FieldValue,
    ) -> Result<(), MutationError>;
}

/// Resolve a query and fetch the complete analytics result set,
/// falling back to ordered paging when the store truncates.
pub fn fetch_analytics(
    source: &dyn AnalyticsSource,
    query: &QueryText,
    order_column: Option<&str>,
) -> Result<Vec<SourceRow>, SourceError> {
    let sql = query.resolve()?;
    match source.run_query(&sql)? {
        QueryOutcome::Complete(rows) => Ok(rows),
        QueryOutcome::Truncated(_) => {
            let order = order_column.ok_or(SourceError::OrderColumnRequired)?;
            source.run_query_paged(&sql, order)
        }
    }
}

/// Resolve a query and fetch the record-store result set.
pub fn fetch_records(
    store: &dyn RecordStore,
    query: &QueryText,
) -> Result<Vec<SourceRow>, SourceError> {
    let sql = query.resolve()?;
    store.run_query(&sql)
}
