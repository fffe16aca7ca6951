//! Location of the tidy finance database.
//!
//! The database is produced by the tidy finance data pipeline and is only
//! read here, so a missing file is an error rather than a new empty store.

use super::config::RunConfig;
use std::io;
use std::path::{Path, PathBuf};
use tidysort_data::{DataError, TidyFinanceDb};

/// File name written by the tidy finance pipeline.
pub(crate) const DATABASE_FILE: &str = "tidy_finance_python.sqlite";

/// Get the default data directory.
///
/// - Linux: `~/.local/share/tidysort/`
/// - macOS: `~/Library/Application Support/tidysort/`
/// - Windows: `%APPDATA%\tidysort\`
pub(crate) fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tidysort")
}

/// Get the default database path.
pub(crate) fn default_database_path() -> PathBuf {
    default_data_dir().join(DATABASE_FILE)
}

/// Pick the database path: command line, then config file, then default.
pub(crate) fn resolve_database_path(cli: Option<&Path>, config: &RunConfig) -> PathBuf {
    cli.map(Path::to_path_buf)
        .or_else(|| config.db.clone())
        .unwrap_or_else(default_database_path)
}

/// Open an existing database.
pub(crate) fn open_database(path: &Path) -> Result<TidyFinanceDb, DataError> {
    if !path.is_file() {
        return Err(DataError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("database not found at {}", path.display()),
        )));
    }
    tracing::debug!(path = %path.display(), "opening database");
    TidyFinanceDb::open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path_file_name() {
        let path = default_database_path();
        assert!(path.ends_with(Path::new("tidysort").join(DATABASE_FILE)));
    }

    #[test]
    fn test_resolution_order() {
        let config = RunConfig {
            db: Some(PathBuf::from("from-config.sqlite")),
            ..Default::default()
        };

        assert_eq!(
            resolve_database_path(Some(Path::new("from-cli.sqlite")), &config),
            PathBuf::from("from-cli.sqlite")
        );
        assert_eq!(
            resolve_database_path(None, &config),
            PathBuf::from("from-config.sqlite")
        );
        assert_eq!(
            resolve_database_path(None, &RunConfig::default()),
            default_database_path()
        );
    }

    #[test]
    fn test_missing_database_is_not_created() {
        let path = std::env::temp_dir().join("tidysort-missing-test.sqlite");
        let _ = std::fs::remove_file(&path);

        let err = open_database(&path).unwrap_err();
        assert!(matches!(err, DataError::Io(_)));
        assert!(!path.exists());
    }
}
