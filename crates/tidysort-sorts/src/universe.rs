//! Listing exchanges and reference universes.
//!
//! Breakpoints are computed from a reference universe (by convention NYSE
//! listings only) and then applied to the full cross-section, so that the
//! many small NASDAQ firms do not crowd the breakpoints toward small caps.

use crate::error::SortError;
use crate::observation::Observation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Primary listing exchange of a security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Exchange {
    /// New York Stock Exchange
    #[serde(rename = "NYSE")]
    Nyse,

    /// American Stock Exchange
    #[serde(rename = "AMEX")]
    Amex,

    /// NASDAQ
    #[serde(rename = "NASDAQ")]
    Nasdaq,

    /// Any other venue
    Other,
}

impl Exchange {
    /// Returns all exchanges.
    pub fn all() -> Vec<Self> {
        vec![Self::Nyse, Self::Amex, Self::Nasdaq, Self::Other]
    }

    /// Returns the exchange name as stored in the database.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Nyse => "NYSE",
            Self::Amex => "AMEX",
            Self::Nasdaq => "NASDAQ",
            Self::Other => "Other",
        }
    }

    /// Map a CRSP primary exchange code (`N`, `A`, `Q`) to an exchange.
    pub fn from_primary_code(code: &str) -> Self {
        match code.trim() {
            "N" => Self::Nyse,
            "A" => Self::Amex,
            "Q" => Self::Nasdaq,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Exchange {
    type Err = SortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NYSE" => Ok(Self::Nyse),
            "AMEX" => Ok(Self::Amex),
            "NASDAQ" => Ok(Self::Nasdaq),
            "OTHER" => Ok(Self::Other),
            _ => Err(SortError::InvalidConfiguration(format!(
                "Unknown exchange: {}",
                s
            ))),
        }
    }
}

/// Subset of the cross-section used to compute breakpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceUniverse {
    /// Observations listed on one of the given exchanges.
    Exchanges(Vec<Exchange>),

    /// Every observation of the cross-section.
    All,
}

impl ReferenceUniverse {
    /// NYSE-only reference universe.
    pub fn nyse() -> Self {
        Self::Exchanges(vec![Exchange::Nyse])
    }

    /// Check whether an observation belongs to the reference universe.
    pub fn contains(&self, observation: &Observation) -> bool {
        match self {
            Self::Exchanges(exchanges) => exchanges.contains(&observation.exchange),
            Self::All => true,
        }
    }

    /// Reject an exchange list that can never match.
    pub fn validate(&self) -> Result<(), SortError> {
        match self {
            Self::Exchanges(exchanges) if exchanges.is_empty() => Err(
                SortError::InvalidConfiguration("reference universe has no exchanges".into()),
            ),
            _ => Ok(()),
        }
    }
}

impl Default for ReferenceUniverse {
    fn default() -> Self {
        Self::nyse()
    }
}

impl fmt::Display for ReferenceUniverse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exchanges(exchanges) => {
                let names: Vec<&str> = exchanges.iter().map(Exchange::name).collect();
                write!(f, "{}", names.join("+"))
            }
            Self::All => write!(f, "all"),
        }
    }
}
