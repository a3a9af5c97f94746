//! Shared helper functions for CLI commands
//!
//! Config loading, datastore opening, and the small string utilities
//! used by the table output.

use std::path::{Path, PathBuf};

use miette::{miette, Result};

use crate::cli::GlobalOpts;
use crate::core::config::Config;
use crate::core::query::QueryText;
use crate::core::sqlite::{SqliteAnalyticsSource, SqliteRecordMutator, SqliteRecordStore};

/// Everything a command needs to reach the stores.
pub struct Context {
    pub config: Config,
}

impl Context {
    pub fn load(global: &GlobalOpts) -> Self {
        Self {
            config: Config::load(global.config.as_deref()),
        }
    }

    pub fn analytics(&self, override_path: Option<&Path>) -> Result<SqliteAnalyticsSource> {
        let path = override_path
            .or(self.config.analytics_db.as_deref())
            .ok_or_else(|| {
                miette!("no analytics database configured; set analytics_db in the config or pass --analytics-db")
            })?;
        let source = SqliteAnalyticsSource::open(path).map_err(|e| miette!("{e}"))?;
        Ok(source.with_page_size(self.config.page_size()))
    }

    pub fn records(&self, override_path: Option<&Path>) -> Result<SqliteRecordStore> {
        let path = self.records_path(override_path)?;
        SqliteRecordStore::open(&path).map_err(|e| miette!("{e}"))
    }

    pub fn mutator(&self, override_path: Option<&Path>) -> Result<SqliteRecordMutator> {
        let path = self.records_path(override_path)?;
        SqliteRecordMutator::open(&path).map_err(|e| miette!("{e}"))
    }

    fn records_path(&self, override_path: Option<&Path>) -> Result<PathBuf> {
        override_path
            .or(self.config.records_db.as_deref())
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                miette!("no record database configured; set records_db in the config or pass --records-db")
            })
    }

    /// Directory holding the versioned .sql query files.
    pub fn queries_dir(&self, override_dir: Option<&Path>) -> PathBuf {
        override_dir
            .or(self.config.queries_dir.as_deref())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("queries"))
    }
}

/// Resolve a query argument: an inline SQL string, or with `is_file`,
/// a path relative to the queries directory (absolute paths pass
/// through).
pub fn resolve_query(arg: &str, is_file: bool, queries_dir: &Path) -> QueryText {
    if is_file {
        let path = PathBuf::from(arg);
        if path.is_absolute() {
            QueryText::File(path)
        } else {
            QueryText::File(queries_dir.join(path))
        }
    } else {
        QueryText::Literal(arg.to_string())
    }
}

/// Truncate a string to max_len, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Escape a string for CSV output
///
/// Handles commas, quotes, and newlines according to RFC 4180.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
