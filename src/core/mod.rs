//! Core module - configuration, values, and datastore adapter seams

pub mod config;
pub mod query;
pub mod sink;
pub mod source;
pub mod sqlite;
pub mod value;

pub use config::Config;
pub use query::QueryText;
pub use sink::{CsvSheetSink, SheetSink, SinkBatch, SinkError};
pub use source::{
    fetch_analytics, fetch_records, AnalyticsSource, MutationError, QueryOutcome, RecordMutator,
    RecordStore, SourceError, SourceRow,
};
pub use sqlite::{SqliteAnalyticsSource, SqliteRecordMutator, SqliteRecordStore};
pub use value::FieldValue;
