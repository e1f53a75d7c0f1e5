/*!
 * Configuration types for Custodia
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

use crate::error::{CustodiaError, Result};

/// Default number of rows returned by the listing queries.
pub const DEFAULT_LIST_LIMIT: usize = 25;

/// Default cap on mismatch details carried in an integrity report.
pub const DEFAULT_AUDIT_DETAIL_LIMIT: usize = 100;

/// Main configuration for the traceability core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Path to the SQLite ledger database
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Actor recorded for CLI-originated mutations
    #[serde(default = "default_actor")]
    pub actor: String,

    /// Default limit for listing queries
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,

    /// Maximum mismatch details accumulated in a full-audit report
    #[serde(default = "default_audit_detail_limit")]
    pub audit_detail_limit: usize,

    /// Storage busy timeout in milliseconds
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Log verbosity
    #[serde(default)]
    pub log_level: LogLevel,

    /// Optional log file (JSON lines); stdout when unset
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Verbose flag (forces debug-level logging)
    #[serde(default)]
    pub verbose: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("custodia.sqlite")
}

fn default_actor() -> String {
    "system".to_string()
}

fn default_list_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

fn default_audit_detail_limit() -> usize {
    DEFAULT_AUDIT_DETAIL_LIMIT
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            actor: default_actor(),
            list_limit: default_list_limit(),
            audit_detail_limit: default_audit_detail_limit(),
            busy_timeout_ms: default_busy_timeout_ms(),
            log_level: LogLevel::default(),
            log_file: None,
            verbose: false,
        }
    }
}

impl CoreConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CustodiaError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| CustodiaError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Persist configuration as TOML
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| CustodiaError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Log verbosity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to a tracing level
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.db_path, PathBuf::from("custodia.sqlite"));
        assert_eq!(config.actor, "system");
        assert_eq!(config.list_limit, DEFAULT_LIST_LIMIT);
        assert_eq!(config.audit_detail_limit, DEFAULT_AUDIT_DETAIL_LIMIT);
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(!config.verbose);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "db_path = \"/tmp/ledger.sqlite\"\nactor = \"auditor\"\nlog_level = \"debug\"\nlist_limit = 50"
        )
        .unwrap();

        let config = CoreConfig::from_file(file.path()).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/ledger.sqlite"));
        assert_eq!(config.actor, "auditor");
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.list_limit, 50);
        // Unspecified fields fall back to defaults
        assert_eq!(config.audit_detail_limit, DEFAULT_AUDIT_DETAIL_LIMIT);
    }

    #[test]
    fn test_to_file_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let mut config = CoreConfig::default();
        config.actor = "auditor".to_string();
        config.to_file(file.path()).unwrap();

        let loaded = CoreConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.actor, "auditor");
        assert_eq!(loaded.db_path, config.db_path);
    }

    #[test]
    fn test_from_file_missing() {
        let err = CoreConfig::from_file(Path::new("/nonexistent/custodia.toml")).unwrap_err();
        assert!(matches!(err, CustodiaError::Config(_)));
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), Level::ERROR);
        assert_eq!(LogLevel::Warn.to_tracing_level(), Level::WARN);
        assert_eq!(LogLevel::Info.to_tracing_level(), Level::INFO);
        assert_eq!(LogLevel::Debug.to_tracing_level(), Level::DEBUG);
        assert_eq!(LogLevel::Trace.to_tracing_level(), Level::TRACE);
    }
}
