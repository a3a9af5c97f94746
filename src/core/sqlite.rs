//! SQLite-backed adapter implementations
//!
//! The live deployment points these seams at the hosted analytics and
//! CRM services. For local runs, dry runs, and the test suite, the same
//! engines work against plain SQLite files through the adapters below.
//! The analytics adapter reproduces the hosted store's page-size
//! behavior: results past the page size come back truncated and must be
//! re-fetched with ordered paging.

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::core::source::{
    AnalyticsSource, MutationError, QueryOutcome, RecordMutator, RecordStore, SourceError,
    SourceRow,
};
use crate::core::value::FieldValue;

/// Default page size matching the hosted analytics store.
pub const DEFAULT_PAGE_SIZE: usize = 2000;

fn open_connection(path: &Path) -> Result<Connection, SourceError> {
    Connection::open(path).map_err(|e| SourceError::Io(format!("{}: {e}", path.display())))
}

fn value_from_sql(value: ValueRef<'_>) -> FieldValue {
    match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(i) => FieldValue::Int(i),
        ValueRef::Real(f) => FieldValue::Float(f),
        ValueRef::Text(t) => FieldValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => FieldValue::Null,
    }
}

fn run_select(conn: &Connection, sql: &str) -> Result<Vec<SourceRow>, SourceError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| SourceError::Query(e.to_string()))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut rows = Vec::new();
    let mut result = stmt
        .query([])
        .map_err(|e| SourceError::Query(e.to_string()))?;
    while let Some(row) = result.next().map_err(|e| SourceError::Query(e.to_string()))? {
        let mut out = SourceRow::new();
        for (i, name) in columns.iter().enumerate() {
            let value = row
                .get_ref(i)
                .map_err(|e| SourceError::Query(e.to_string()))?;
            out.set(name, value_from_sql(value));
        }
        rows.push(out);
    }
    Ok(rows)
}

/// Analytics store over a local SQLite file.
pub struct SqliteAnalyticsSource {
    conn: Connection,
    page_size: usize,
}

impl SqliteAnalyticsSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        Ok(Self {
            conn: open_connection(path)?,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

impl AnalyticsSource for SqliteAnalyticsSource {
    fn run_query(&self, sql: &str) -> Result<QueryOutcome, SourceError> {
        let rows = run_select(&self.conn, sql)?;
        if rows.len() > self.page_size {
            let mut page = rows;
            page.truncate(self.page_size);
            Ok(QueryOutcome::Truncated(page))
        } else {
            Ok(QueryOutcome::Complete(rows))
        }
    }

    fn run_query_paged(&self, sql: &str, order_column: &str) -> Result<Vec<SourceRow>, SourceError> {
        let mut all = Vec::new();
        let mut offset = 0usize;
        loop {
            let paged = format!(
                "SELECT * FROM ({sql}) ORDER BY \"{order_column}\" LIMIT {} OFFSET {offset}",
                self.page_size
            );
            let page = run_select(&self.conn, &paged)?;
            let page_len = page.len();
            all.extend(page);
            if page_len < self.page_size {
                return Ok(all);
            }
            offset += page_len;
        }
    }
}

/// Record-store read path over a local SQLite file.
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        Ok(Self {
            conn: open_connection(path)?,
        })
    }
}

impl RecordStore for SqliteRecordStore {
    fn run_query(&self, sql: &str) -> Result<Vec<SourceRow>, SourceError> {
        run_select(&self.conn, sql)
    }
}

/// Record-store write path: one table per object type, keyed by `Id`.
pub struct SqliteRecordMutator {
    conn: Connection,
    id_column: String,
}

impl SqliteRecordMutator {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        Ok(Self {
            conn: open_connection(path)?,
            id_column: "Id".to_string(),
        })
    }

    pub fn with_id_column(mut self, id_column: &str) -> Self {
        self.id_column = id_column.to_string();
        self
    }
}

impl RecordMutator for SqliteRecordMutator {
    fn update_field(
        &self,
        object_type: &str,
        record_id: &str,
        field: &str,
        value: &FieldValue,
    ) -> Result<(), MutationError> {
        let fail = |message: String| MutationError {
            object_type: object_type.to_string(),
            record_id: record_id.to_string(),
            field: field.to_string(),
            message,
        };

        let sql = format!(
            "UPDATE \"{object_type}\" SET \"{field}\" = ?1 WHERE \"{}\" = ?2",
            self.id_column
        );
        let changed = match value {
            FieldValue::Null => self
                .conn
                .execute(&sql, rusqlite::params![rusqlite::types::Null, record_id]),
            FieldValue::Bool(b) => self.conn.execute(&sql, rusqlite::params![b, record_id]),
            FieldValue::Int(i) => self.conn.execute(&sql, rusqlite::params![i, record_id]),
            FieldValue::Float(f) => self.conn.execute(&sql, rusqlite::params![f, record_id]),
            FieldValue::Text(s) => self.conn.execute(&sql, rusqlite::params![s, record_id]),
        }
        .map_err(|e| fail(e.to_string()))?;

        if changed == 0 {
            return Err(fail("no record with that id".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE metrics (salesforce_id TEXT, total INTEGER);
            INSERT INTO metrics VALUES ('a', 1), ('b', 2), ('c', 3), ('d', 4), ('e', 5);
            CREATE TABLE Account (Id TEXT PRIMARY KEY, Account_Status__c TEXT);
            INSERT INTO Account VALUES ('a', 'Active'), ('b', 'Inactive');
            "#,
        )
        .unwrap();
    }

    #[test]
    fn small_results_come_back_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mb.db");
        fixture(&path);

        let source = SqliteAnalyticsSource::open(&path).unwrap();
        match source.run_query("SELECT * FROM metrics").unwrap() {
            QueryOutcome::Complete(rows) => assert_eq!(rows.len(), 5),
            QueryOutcome::Truncated(_) => panic!("should not truncate under page size"),
        }
    }

    #[test]
    fn oversized_results_truncate_and_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mb.db");
        fixture(&path);

        let source = SqliteAnalyticsSource::open(&path).unwrap().with_page_size(2);
        match source.run_query("SELECT * FROM metrics").unwrap() {
            QueryOutcome::Truncated(rows) => assert_eq!(rows.len(), 2),
            QueryOutcome::Complete(_) => panic!("expected truncation"),
        }

        let all = source
            .run_query_paged("SELECT * FROM metrics", "salesforce_id")
            .unwrap();
        assert_eq!(all.len(), 5);
        let ids: Vec<String> = all.iter().map(|r| r.require_text("salesforce_id").unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn mutator_updates_one_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sf.db");
        fixture(&path);

        let mutator = SqliteRecordMutator::open(&path).unwrap();
        mutator
            .update_field("Account", "b", "Account_Status__c", &FieldValue::Text("Active".into()))
            .unwrap();

        let store = SqliteRecordStore::open(&path).unwrap();
        let rows = store
            .run_query("SELECT Account_Status__c FROM Account WHERE Id = 'b'")
            .unwrap();
        assert_eq!(rows[0].get("Account_Status__c"), FieldValue::Text("Active".into()));
    }

    #[test]
    fn mutator_reports_unknown_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sf.db");
        fixture(&path);

        let mutator = SqliteRecordMutator::open(&path).unwrap();
        let err = mutator
            .update_field("Account", "zzz", "Account_Status__c", &FieldValue::Null)
            .unwrap_err();
        assert_eq!(err.record_id, "zzz");
    }
}
