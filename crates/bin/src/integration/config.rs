//! JSON run configuration.
//!
//! Every section is optional; missing fields take the library defaults.
//!
//! ```json
//! {
//!   "db": "data/tidy_finance_python.sqlite",
//!   "bivariate": { "method": "dependent", "n_portfolios": 5 },
//!   "fama_french": { "comparison_decimals": 4 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tidysort::{BivariateConfig, FamaFrenchConfig};
use tidysort_data::MonthlyPanelConfig;

/// Errors raised while reading a run configuration.
#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    /// The file could not be read
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not a valid configuration
    #[error("Invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Settings of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct RunConfig {
    /// Database path; `--db` takes precedence
    pub(crate) db: Option<PathBuf>,
    /// Lags of the monthly panel used by the bivariate and breakpoint commands
    pub(crate) monthly_panel: MonthlyPanelConfig,
    pub(crate) bivariate: BivariateConfig,
    pub(crate) fama_french: FamaFrenchConfig,
}

impl RunConfig {
    /// Parse a configuration from JSON text.
    pub(crate) fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Read a configuration file.
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded run configuration");
        Ok(config)
    }

    /// Read `path` if given, otherwise use the defaults.
    pub(crate) fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}
