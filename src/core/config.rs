//! Configuration management with layered hierarchy

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Tool configuration, merged from defaults, global file, project file,
/// and environment variables (later layers win).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// User recorded in search-log entries
    pub user: Option<String>,

    /// Default analytics-store database path
    pub analytics_db: Option<PathBuf>,

    /// Default record-store database path
    pub records_db: Option<PathBuf>,

    /// Sleep between record writes, in milliseconds (throttle, not
    /// a correctness mechanism)
    pub throttle_ms: Option<u64>,

    /// Analytics page size before the paged fallback kicks in
    pub page_size: Option<usize>,

    /// Directory holding the versioned .sql query files
    pub queries_dir: Option<PathBuf>,

    /// Raw-materials search log location
    pub search_log: Option<PathBuf>,

    /// Template defining the search log's columns
    pub search_log_template: Option<PathBuf>,

    /// CSV sink for item classification entries
    pub classification_sink: Option<PathBuf>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order.
    pub fn load(project_file: Option<&Path>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (the Default impl)

        // 2. Global user config (~/.config/mpsync/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            config.merge_file(&global_path);
        }

        // 3. Project config (.mpsync/config.yaml, or an explicit path)
        match project_file {
            Some(path) => config.merge_file(path),
            None => config.merge_file(Path::new(".mpsync/config.yaml")),
        }

        // 4. Environment variables
        if let Ok(user) = std::env::var("MPSYNC_USER") {
            config.user = Some(user);
        }
        if let Ok(db) = std::env::var("MPSYNC_ANALYTICS_DB") {
            config.analytics_db = Some(PathBuf::from(db));
        }
        if let Ok(db) = std::env::var("MPSYNC_RECORDS_DB") {
            config.records_db = Some(PathBuf::from(db));
        }

        config
    }

    fn merge_file(&mut self, path: &Path) {
        if path.exists() {
            if let Ok(contents) = std::fs::read_to_string(path) {
                if let Ok(other) = serde_yml::from_str::<Config>(&contents) {
                    self.merge(other);
                }
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "mpsync")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.user.is_some() {
            self.user = other.user;
        }
        if other.analytics_db.is_some() {
            self.analytics_db = other.analytics_db;
        }
        if other.records_db.is_some() {
            self.records_db = other.records_db;
        }
        if other.throttle_ms.is_some() {
            self.throttle_ms = other.throttle_ms;
        }
        if other.page_size.is_some() {
            self.page_size = other.page_size;
        }
        if other.queries_dir.is_some() {
            self.queries_dir = other.queries_dir;
        }
        if other.search_log.is_some() {
            self.search_log = other.search_log;
        }
        if other.search_log_template.is_some() {
            self.search_log_template = other.search_log_template;
        }
        if other.classification_sink.is_some() {
            self.classification_sink = other.classification_sink;
        }
    }

    /// User name for log entries, falling back to $USER.
    pub fn user(&self) -> String {
        if let Some(ref user) = self.user {
            return user.clone();
        }
        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "default-user".to_string())
    }

    pub fn throttle_ms(&self) -> u64 {
        self.throttle_ms.unwrap_or(0)
    }

    pub fn page_size(&self) -> usize {
        self.page_size.unwrap_or(crate::core::sqlite::DEFAULT_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "user: ops@example.com\nthrottle_ms: 50\n").unwrap();

        let config = Config::load(Some(&path));
        assert_eq!(config.user.as_deref(), Some("ops@example.com"));
        assert_eq!(config.throttle_ms(), 50);
        assert_eq!(config.page_size(), 2000);
    }

    #[test]
    fn merge_keeps_unset_fields() {
        let mut base = Config {
            user: Some("a".into()),
            ..Default::default()
        };
        base.merge(Config {
            throttle_ms: Some(10),
            ..Default::default()
        });
        assert_eq!(base.user.as_deref(), Some("a"));
        assert_eq!(base.throttle_ms(), 10);
    }
}
