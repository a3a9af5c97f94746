//! Reconciliation engine
//!
//! Each operation reads the corrected state from the analytics store,
//! reads the current state from the record store, diffs the two, and
//! writes only the differing fields back. Reads are fatal on failure;
//! individual writes are not. A failed write is collected into the
//! report and the run continues, so one bad record never aborts a
//! thousand-record sweep.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::core::query::QueryText;
use crate::core::source::{
    fetch_analytics, fetch_records, AnalyticsSource, RecordMutator, RecordStore, SourceError,
};
use crate::core::value::FieldValue;
use crate::recon::classify::{
    classify_by, general_label, merge_signals, DivergentPartner, MainProcess, ProcessCountRow,
    Signal, CAPABILITY_FIELDS,
};
use crate::recon::scorecard::{extract_scorecard, ScoreGrid, ScorecardError};

/// Fatal errors for a reconciliation run. Write failures are never in
/// here; they land in the `WriteReport`.
#[derive(Debug, Error)]
pub enum ReconError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Scorecard(#[from] ScorecardError),
}

/// One collected write failure.
#[derive(Debug, Clone)]
pub struct WriteFailure {
    pub record_id: String,
    pub field: String,
    pub value: FieldValue,
    pub message: String,
}

/// Outcome of the write phase of an operation.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub attempted: usize,
    pub failures: Vec<WriteFailure>,
}

impl WriteReport {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }

    pub fn merge(&mut self, other: WriteReport) {
        self.attempted += other.attempted;
        self.failures.extend(other.failures);
    }
}

/// Outcome of a main-process run: the writes plus the partners whose
/// two signals disagreed. Divergent partners are reported, never
/// written; escalation stays a human decision.
#[derive(Debug)]
pub struct MainProcessOutcome {
    pub report: WriteReport,
    pub divergent: Vec<DivergentPartner>,
}

const OBJECT_TYPE: &str = "Account";
const ID_COLUMN: &str = "salesforce_id";

pub struct ReconEngine<'a> {
    analytics: &'a dyn AnalyticsSource,
    records: &'a dyn RecordStore,
    mutator: &'a dyn RecordMutator,
    throttle: Duration,
}

impl<'a> ReconEngine<'a> {
    pub fn new(
        analytics: &'a dyn AnalyticsSource,
        records: &'a dyn RecordStore,
        mutator: &'a dyn RecordMutator,
    ) -> Self {
        Self {
            analytics,
            records,
            mutator,
            throttle: Duration::ZERO,
        }
    }

    /// Sleep between writes. The record store rate-limits; this is a
    /// pacing knob, not a correctness mechanism.
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    fn write_all<I>(&self, field_writes: I) -> WriteReport
    where
        I: IntoIterator<Item = (String, String, FieldValue)>,
    {
        let mut report = WriteReport::default();
        for (record_id, field, value) in field_writes {
            report.attempted += 1;
            if let Err(err) = self
                .mutator
                .update_field(OBJECT_TYPE, &record_id, &field, &value)
            {
                report.failures.push(WriteFailure {
                    record_id,
                    field,
                    value,
                    message: err.message,
                });
            }
            if !self.throttle.is_zero() {
                std::thread::sleep(self.throttle);
            }
        }
        report
    }

    /// Update partner statuses. The query itself selects only the
    /// partners whose status is wrong, so every returned row is
    /// written as-is to `Account_Status__c`.
    pub fn update_status(&self, query: &QueryText) -> Result<WriteReport, ReconError> {
        let rows = fetch_analytics(self.analytics, query, Some(ID_COLUMN))?;
        let Some(status_column) = rows.first().and_then(|r| r.metric_column(&[ID_COLUMN])) else {
            return Ok(WriteReport::default());
        };

        let mut writes = Vec::new();
        for row in &rows {
            let id = row.require_text(ID_COLUMN)?;
            writes.push((id, "Account_Status__c".to_string(), row.get(&status_column)));
        }
        Ok(self.write_all(writes))
    }

    /// Reconcile work-order and quote counts. Counts are null-or-
    /// positive on the record store, so a zero on either side is
    /// treated as null; when the corrected count is zero the field is
    /// cleared, never written as a literal `0`.
    pub fn update_wos_quotes(
        &self,
        analytics_query: &QueryText,
        records_query: &QueryText,
    ) -> Result<WriteReport, ReconError> {
        let analytics_rows = fetch_analytics(self.analytics, analytics_query, Some(ID_COLUMN))?;
        let record_rows = fetch_records(self.records, records_query)?;

        let mut current: HashMap<String, (FieldValue, FieldValue)> = HashMap::new();
        for row in &record_rows {
            current.insert(
                row.require_text("Id")?,
                (
                    row.get("Completed_Work_Orders__c").normalize_count(),
                    row.get("Number_of_RFQs_MP_has_quoted__c").normalize_count(),
                ),
            );
        }

        let mut writes = Vec::new();
        for row in &analytics_rows {
            let id = row.require_text(ID_COLUMN)?;
            let corrected_wos = row.require("mb_wos")?.normalize_count();
            let corrected_quotes = row.require("mb_quotes")?.normalize_count();
            let (stored_wos, stored_quotes) = current
                .get(&id)
                .cloned()
                .unwrap_or((FieldValue::Null, FieldValue::Null));

            if !corrected_wos.loose_eq(&stored_wos) {
                writes.push((id.clone(), "Completed_Work_Orders__c".to_string(), corrected_wos));
            }
            if !corrected_quotes.loose_eq(&stored_quotes) {
                writes.push((
                    id,
                    "Number_of_RFQs_MP_has_quoted__c".to_string(),
                    corrected_quotes,
                ));
            }
        }
        Ok(self.write_all(writes))
    }

    /// Reconcile the on-time-in-full metric. Both queries return an id
    /// column plus one metric column; the metric column's name is
    /// discovered positionally, and the record-store column name is
    /// what gets written. Partners present only on the record side get
    /// their metric cleared.
    pub fn update_otif(
        &self,
        analytics_query: &QueryText,
        records_query: &QueryText,
    ) -> Result<WriteReport, ReconError> {
        let analytics_rows = fetch_analytics(self.analytics, analytics_query, Some(ID_COLUMN))?;
        let record_rows = fetch_records(self.records, records_query)?;

        let analytics_metric = analytics_rows
            .first()
            .and_then(|r| r.metric_column(&[ID_COLUMN]))
            .ok_or(SourceError::MissingColumn {
                column: "<metric>".to_string(),
            })?;
        let record_metric = record_rows
            .first()
            .and_then(|r| r.metric_column(&["Id"]))
            .ok_or(SourceError::MissingColumn {
                column: "<metric>".to_string(),
            })?;

        let mut corrected: HashMap<String, FieldValue> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for row in &analytics_rows {
            let id = row.require_text(ID_COLUMN)?;
            corrected.insert(id.clone(), row.get(&analytics_metric));
            order.push(id);
        }

        let mut stored: HashMap<String, FieldValue> = HashMap::new();
        for row in &record_rows {
            let id = row.require_text("Id")?;
            if !corrected.contains_key(&id) {
                order.push(id.clone());
            }
            stored.insert(id, row.get(&record_metric));
        }

        let mut writes = Vec::new();
        for id in order {
            let new = corrected.get(&id).cloned().unwrap_or(FieldValue::Null);
            let old = stored.get(&id).cloned().unwrap_or(FieldValue::Null);
            if !new.loose_eq(&old) {
                writes.push((id, record_metric.clone(), new));
            }
        }
        Ok(self.write_all(writes))
    }

    /// Reconcile each partner's most recent work-order date. Analytics
    /// timestamps come back in mixed shapes; both sides are normalized
    /// to `YYYY-MM-DD` before comparison, so the diff is a plain string
    /// compare.
    pub fn update_last_wo_date(
        &self,
        analytics_query: &QueryText,
        records_query: &QueryText,
    ) -> Result<WriteReport, ReconError> {
        let analytics_rows = fetch_analytics(self.analytics, analytics_query, Some("sf_id"))?;
        let record_rows = fetch_records(self.records, records_query)?;

        let mut stored: HashMap<String, FieldValue> = HashMap::new();
        for row in &record_rows {
            stored.insert(row.require_text("Id")?, row.get("last_wo_date__c"));
        }

        let mut writes = Vec::new();
        for row in &analytics_rows {
            let id = row.require_text("sf_id")?;
            let new = match row.require("date_last_wo")?.as_str().and_then(normalize_date) {
                Some(date) => FieldValue::Text(date),
                None => FieldValue::Null,
            };
            let old = stored.get(&id).cloned().unwrap_or(FieldValue::Null);
            if !new.loose_eq(&old) {
                writes.push((id, "last_wo_date__c".to_string(), new));
            }
        }
        Ok(self.write_all(writes))
    }

    /// Push one scorecard sheet's KPI values onto its partner record.
    /// A sheet without an id anchor is a recoverable error; the caller
    /// decides whether to skip the file or stop.
    pub fn update_scorecards(&self, sheet: &Path) -> Result<WriteReport, ReconError> {
        let grid = ScoreGrid::from_csv(sheet)?;
        let card = extract_scorecard(&grid)?;

        let writes = card
            .scores
            .into_iter()
            .map(|(field, value)| (card.salesforce_id.clone(), field.to_string(), value));
        Ok(self.write_all(writes))
    }

    /// Classify every partner's main process from quote and work-order
    /// signals, write the labels that changed, then backfill the
    /// general capability entry for partners whose main process has one
    /// but whose capability field is empty.
    pub fn update_main_process(
        &self,
        analytics_query: &QueryText,
        records_query: &QueryText,
    ) -> Result<MainProcessOutcome, ReconError> {
        let analytics_rows = fetch_analytics(self.analytics, analytics_query, Some(ID_COLUMN))?;
        let mut count_rows = Vec::with_capacity(analytics_rows.len());
        let mut names: HashMap<String, String> = HashMap::new();
        for row in &analytics_rows {
            let parsed = ProcessCountRow::from_source(row)?;
            names
                .entry(parsed.salesforce_id.clone())
                .or_insert_with(|| parsed.mp_name.clone());
            count_rows.push(parsed);
        }

        let by_quotes = classify_by(&count_rows, Signal::Quotes);
        let by_wos = classify_by(&count_rows, Signal::WorkOrders);
        let classification = merge_signals(&by_quotes, &by_wos, &names);

        let record_rows = fetch_records(self.records, records_query)?;
        let mut stored: HashMap<String, FieldValue> = HashMap::new();
        for row in &record_rows {
            stored.insert(row.require_text("Id")?, row.get("main_process__c"));
        }

        let mut writes = Vec::new();
        for (id, process) in &classification.authoritative {
            let label = FieldValue::Text(process.label().to_string());
            let current = stored.get(id).cloned().unwrap_or(FieldValue::Null);
            if !label.loose_eq(&current) {
                writes.push((id.clone(), "main_process__c".to_string(), label));
            }
        }
        let mut report = self.write_all(writes);
        report.merge(self.backfill_capabilities()?);

        // A divergent partner whose stored label already matches one of
        // the signals has been settled by hand; only the rest need eyes.
        let divergent = classification
            .divergent
            .into_iter()
            .filter(|d| {
                let current = stored
                    .get(&d.salesforce_id)
                    .and_then(|v| v.as_str().map(str::to_string));
                current.as_deref() != Some(d.by_quotes.label())
                    && current.as_deref() != Some(d.by_wos.label())
            })
            .collect();

        Ok(MainProcessOutcome { report, divergent })
    }

    fn backfill_capabilities(&self) -> Result<WriteReport, ReconError> {
        let sql = format!(
            "select Id, main_process__c, {} from Account where main_process__c is not null",
            CAPABILITY_FIELDS.join(", ")
        );
        let rows = fetch_records(self.records, &QueryText::Literal(sql))?;

        let mut writes = Vec::new();
        for row in &rows {
            let id = row.require_text("Id")?;
            let Some(process) = row
                .get("main_process__c")
                .as_str()
                .and_then(|s| s.parse::<MainProcess>().ok())
            else {
                continue;
            };
            let field = process.capability_field();
            let Some(general) = general_label(field) else {
                continue;
            };
            if row.get(field).is_null() {
                writes.push((id, field.to_string(), FieldValue::Text(general.to_string())));
            }
        }
        Ok(self.write_all(writes))
    }
}

/// Normalize a date-ish string to `YYYY-MM-DD`, or None if it does not
/// parse. Analytics exports mix RFC 3339 timestamps with bare dates.
fn normalize_date(raw: &str) -> Option<String> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.format("%Y-%m-%d").to_string());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt.format("%Y-%m-%d").to_string());
    }
    if let Ok(d) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d.format("%Y-%m-%d").to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sqlite::{SqliteAnalyticsSource, SqliteRecordMutator, SqliteRecordStore};
    use rusqlite::Connection;
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        analytics_path: PathBuf,
        records_path: PathBuf,
    }

    impl Fixture {
        fn new(analytics_sql: &str, records_sql: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let analytics_path = dir.path().join("mb.db");
            let records_path = dir.path().join("sf.db");
            Connection::open(&analytics_path)
                .unwrap()
                .execute_batch(analytics_sql)
                .unwrap();
            Connection::open(&records_path)
                .unwrap()
                .execute_batch(records_sql)
                .unwrap();
            Self {
                _dir: dir,
                analytics_path,
                records_path,
            }
        }

        fn with<T>(&self, run: impl FnOnce(&ReconEngine) -> T) -> T {
            let analytics = SqliteAnalyticsSource::open(&self.analytics_path).unwrap();
            let records = SqliteRecordStore::open(&self.records_path).unwrap();
            let mutator = SqliteRecordMutator::open(&self.records_path).unwrap();
            let engine = ReconEngine::new(&analytics, &records, &mutator);
            run(&engine)
        }

        fn record_text(&self, sql: &str) -> Option<String> {
            let conn = Connection::open(&self.records_path).unwrap();
            conn.query_row(sql, [], |row| row.get::<_, Option<String>>(0))
                .unwrap()
        }

        fn record_f64(&self, sql: &str) -> Option<f64> {
            let conn = Connection::open(&self.records_path).unwrap();
            conn.query_row(sql, [], |row| row.get::<_, Option<f64>>(0))
                .unwrap()
        }
    }

    #[test]
    fn status_writes_every_returned_row() {
        let fx = Fixture::new(
            r#"
            CREATE TABLE wrong_status (salesforce_id TEXT, correct_status TEXT);
            INSERT INTO wrong_status VALUES ('a1', 'Active'), ('a2', 'Inactive');
            "#,
            r#"
            CREATE TABLE Account (Id TEXT PRIMARY KEY, Account_Status__c TEXT);
            INSERT INTO Account VALUES ('a1', 'Inactive'), ('a2', 'Active');
            "#,
        );

        let report = fx
            .with(|e| e.update_status(&"SELECT * FROM wrong_status".into()))
            .unwrap();
        assert_eq!(report.attempted, 2);
        assert!(report.failures.is_empty());
        assert_eq!(
            fx.record_text("SELECT Account_Status__c FROM Account WHERE Id = 'a1'"),
            Some("Active".to_string())
        );
    }

    #[test]
    fn write_failures_are_collected_not_fatal() {
        let fx = Fixture::new(
            r#"
            CREATE TABLE wrong_status (salesforce_id TEXT, correct_status TEXT);
            INSERT INTO wrong_status VALUES ('missing', 'Active'), ('a2', 'Inactive');
            "#,
            r#"
            CREATE TABLE Account (Id TEXT PRIMARY KEY, Account_Status__c TEXT);
            INSERT INTO Account VALUES ('a2', 'Active');
            "#,
        );

        let report = fx
            .with(|e| e.update_status(&"SELECT * FROM wrong_status".into()))
            .unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].record_id, "missing");
        // The run kept going past the failure.
        assert_eq!(
            fx.record_text("SELECT Account_Status__c FROM Account WHERE Id = 'a2'"),
            Some("Inactive".to_string())
        );
    }

    #[test]
    fn wos_quotes_diff_treats_zero_as_null() {
        let fx = Fixture::new(
            r#"
            CREATE TABLE counts (salesforce_id TEXT, mb_wos REAL, mb_quotes REAL);
            INSERT INTO counts VALUES
                ('a1', 0, 5),      -- wos zero vs stored 3: clear; quotes equal: skip
                ('a2', 4, 0),      -- wos new; quotes zero vs stored null: skip
                ('a3', 7, 7);      -- both already equal
            "#,
            r#"
            CREATE TABLE Account (
                Id TEXT PRIMARY KEY,
                Completed_Work_Orders__c REAL,
                Number_of_RFQs_MP_has_quoted__c REAL
            );
            INSERT INTO Account VALUES ('a1', 3, 5), ('a2', NULL, NULL), ('a3', 7, 7);
            "#,
        );

        let report = fx
            .with(|e| {
                e.update_wos_quotes(
                    &"SELECT * FROM counts".into(),
                    &"SELECT Id, Completed_Work_Orders__c, Number_of_RFQs_MP_has_quoted__c FROM Account".into(),
                )
            })
            .unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(
            fx.record_f64("SELECT Completed_Work_Orders__c FROM Account WHERE Id = 'a1'"),
            None
        );
        assert_eq!(
            fx.record_f64("SELECT Completed_Work_Orders__c FROM Account WHERE Id = 'a2'"),
            Some(4.0)
        );
        assert_eq!(
            fx.record_f64("SELECT Number_of_RFQs_MP_has_quoted__c FROM Account WHERE Id = 'a2'"),
            None
        );
    }

    #[test]
    fn second_run_with_no_external_change_writes_nothing() {
        let fx = Fixture::new(
            r#"
            CREATE TABLE counts (salesforce_id TEXT, mb_wos REAL, mb_quotes REAL);
            INSERT INTO counts VALUES ('a1', 0, 5), ('a2', 4, 0);
            CREATE TABLE otif (salesforce_id TEXT, corrected_otif REAL);
            INSERT INTO otif VALUES ('a1', 0.95), ('a2', 0.80);
            "#,
            r#"
            CREATE TABLE Account (
                Id TEXT PRIMARY KEY,
                Completed_Work_Orders__c REAL,
                Number_of_RFQs_MP_has_quoted__c REAL,
                otif__c REAL
            );
            INSERT INTO Account VALUES ('a1', 3, 5, 0.60), ('a2', NULL, NULL, NULL);
            "#,
        );
        let run = || {
            let wos = fx
                .with(|e| {
                    e.update_wos_quotes(
                        &"SELECT * FROM counts".into(),
                        &"SELECT Id, Completed_Work_Orders__c, Number_of_RFQs_MP_has_quoted__c FROM Account".into(),
                    )
                })
                .unwrap();
            let otif = fx
                .with(|e| {
                    e.update_otif(
                        &"SELECT * FROM otif".into(),
                        &"SELECT Id, otif__c FROM Account".into(),
                    )
                })
                .unwrap();
            (wos, otif)
        };

        let (first_wos, first_otif) = run();
        assert_eq!(first_wos.attempted, 2);
        assert_eq!(first_otif.attempted, 2);

        // The first pass converged; rerunning finds nothing to write.
        let (second_wos, second_otif) = run();
        assert_eq!(second_wos.attempted, 0);
        assert_eq!(second_otif.attempted, 0);
    }

    #[test]
    fn otif_discovers_metric_columns_positionally() {
        let fx = Fixture::new(
            r#"
            CREATE TABLE otif (salesforce_id TEXT, corrected_otif REAL);
            INSERT INTO otif VALUES ('a1', 0.95), ('a2', 0.80);
            "#,
            r#"
            CREATE TABLE Account (Id TEXT PRIMARY KEY, otif__c REAL);
            INSERT INTO Account VALUES ('a1', 0.95), ('a2', 0.60), ('a3', 0.50);
            "#,
        );

        let report = fx
            .with(|e| {
                e.update_otif(
                    &"SELECT * FROM otif".into(),
                    &"SELECT Id, otif__c FROM Account".into(),
                )
            })
            .unwrap();
        // a1 equal, a2 differs, a3 only on the record side: cleared.
        assert_eq!(report.attempted, 2);
        assert_eq!(fx.record_f64("SELECT otif__c FROM Account WHERE Id = 'a2'"), Some(0.80));
        assert_eq!(fx.record_f64("SELECT otif__c FROM Account WHERE Id = 'a3'"), None);
    }

    #[test]
    fn last_wo_date_normalizes_before_diffing() {
        let fx = Fixture::new(
            r#"
            CREATE TABLE last_wo (sf_id TEXT, date_last_wo TEXT);
            INSERT INTO last_wo VALUES
                ('a1', '2026-03-14T10:30:00+00:00'),
                ('a2', '2026-05-01');
            "#,
            r#"
            CREATE TABLE Account (Id TEXT PRIMARY KEY, last_wo_date__c TEXT);
            INSERT INTO Account VALUES ('a1', '2026-03-14'), ('a2', '2026-04-01');
            "#,
        );

        let report = fx
            .with(|e| {
                e.update_last_wo_date(
                    &"SELECT * FROM last_wo".into(),
                    &"SELECT Id, last_wo_date__c FROM Account".into(),
                )
            })
            .unwrap();
        // a1's timestamp normalizes to the stored date: no write.
        assert_eq!(report.attempted, 1);
        assert_eq!(
            fx.record_text("SELECT last_wo_date__c FROM Account WHERE Id = 'a2'"),
            Some("2026-05-01".to_string())
        );
    }

    #[test]
    fn scorecard_sheet_updates_one_partner() {
        let fx = Fixture::new(
            "CREATE TABLE unused (x);",
            r#"
            CREATE TABLE Account (
                Id TEXT PRIMARY KEY,
                ssc_rfq_participation__c INTEGER,
                psc_costs__c INTEGER
            );
            INSERT INTO Account VALUES ('a1', NULL, NULL);
            "#,
        );
        let sheet = fx._dir.path().join("card.csv");
        std::fs::write(
            &sheet,
            "MP ID,a1\nKPI,Calificación\nParticipación en RFQs,4\nCosto cercano o debajo de target price,2\n",
        )
        .unwrap();

        let report = fx.with(|e| e.update_scorecards(&sheet)).unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(
            fx.record_f64("SELECT ssc_rfq_participation__c FROM Account WHERE Id = 'a1'"),
            Some(4.0)
        );
    }

    fn main_process_fixture() -> Fixture {
        Fixture::new(
            r#"
            CREATE TABLE process_counts (
                salesforce_id TEXT, mp_name TEXT, main_process TEXT,
                total_quotes REAL, total_wos REAL
            );
            INSERT INTO process_counts VALUES
                -- agrees on Machining, stored label stale
                ('a1', 'Taller Uno', 'Machining', 5, 3),
                ('a1', 'Taller Uno', 'Logistics', 1, 0),
                -- signals disagree, stored label matches neither
                ('a2', 'Taller Dos', 'Machining', 9, 0),
                ('a2', 'Taller Dos', 'Heavy Fab', 1, 6),
                -- already labeled correctly
                ('a3', 'Taller Tres', 'Finishing', 2, 2);
            "#,
            r#"
            CREATE TABLE Account (
                Id TEXT PRIMARY KEY, main_process__c TEXT,
                other_processes__c TEXT, formation_processes__c TEXT,
                materials_processes__c TEXT, tooling_processes__c TEXT,
                logistics_processes__c TEXT, machining_processes__c TEXT,
                heavy_fab_processes__c TEXT, laboratory_processes__c TEXT,
                finishing_processes__c TEXT, joining_welding_processes__c TEXT,
                light_fab_processes__c TEXT
            );
            INSERT INTO Account (Id, main_process__c, finishing_processes__c) VALUES
                ('a1', 'Logistics', NULL),
                ('a2', 'Other', NULL),
                ('a3', 'Finishing', 'Polishing');
            "#,
        )
    }

    #[test]
    fn main_process_writes_agreements_and_reports_divergence() {
        let fx = main_process_fixture();
        let outcome = fx
            .with(|e| {
                e.update_main_process(
                    &"SELECT * FROM process_counts".into(),
                    &"SELECT Id, main_process__c FROM Account".into(),
                )
            })
            .unwrap();

        assert_eq!(
            fx.record_text("SELECT main_process__c FROM Account WHERE Id = 'a1'"),
            Some("Machining".to_string())
        );
        // Divergent partner left untouched and reported.
        assert_eq!(
            fx.record_text("SELECT main_process__c FROM Account WHERE Id = 'a2'"),
            Some("Other".to_string())
        );
        assert_eq!(outcome.divergent.len(), 1);
        assert_eq!(outcome.divergent[0].salesforce_id, "a2");
        assert_eq!(outcome.divergent[0].mp_name, "Taller Dos");
    }

    #[test]
    fn main_process_backfills_general_capability() {
        let fx = main_process_fixture();
        fx.with(|e| {
            e.update_main_process(
                &"SELECT * FROM process_counts".into(),
                &"SELECT Id, main_process__c FROM Account".into(),
            )
        })
        .unwrap();

        // a1 is now Machining with an empty machining capability.
        assert_eq!(
            fx.record_text("SELECT machining_processes__c FROM Account WHERE Id = 'a1'"),
            Some("General Machining".to_string())
        );
        // Finishing has no general label; a3 stays as entered.
        assert_eq!(
            fx.record_text("SELECT finishing_processes__c FROM Account WHERE Id = 'a3'"),
            Some("Polishing".to_string())
        );
    }

    #[test]
    fn divergent_partner_settled_by_hand_is_not_reported() {
        let fx = main_process_fixture();
        Connection::open(&fx.records_path)
            .unwrap()
            .execute("UPDATE Account SET main_process__c = 'Machining' WHERE Id = 'a2'", [])
            .unwrap();

        let outcome = fx
            .with(|e| {
                e.update_main_process(
                    &"SELECT * FROM process_counts".into(),
                    &"SELECT Id, main_process__c FROM Account".into(),
                )
            })
            .unwrap();
        assert!(outcome.divergent.is_empty());
    }

    #[test]
    fn normalize_date_accepts_mixed_shapes() {
        assert_eq!(
            normalize_date("2026-01-05T00:00:00+00:00").as_deref(),
            Some("2026-01-05")
        );
        assert_eq!(
            normalize_date("2026-01-05 12:30:00").as_deref(),
            Some("2026-01-05")
        );
        assert_eq!(normalize_date("2026-01-05").as_deref(), Some("2026-01-05"));
        assert_eq!(normalize_date("not a date"), None);
    }
}
