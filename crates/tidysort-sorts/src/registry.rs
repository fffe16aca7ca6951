//! Factor Registry
//!
//! Central registry of the long-short factors built from portfolio sorts.
//! Each entry names the sorting variable and the labels forming the long
//! and short legs.

use crate::factor::Leg;
use crate::observation::SortingVariable;

/// Available factor categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactorCategory {
    /// Size factors (small minus big)
    Size,
    /// Value factors (high minus low book-to-market)
    Value,
    /// Profitability factors (robust minus weak)
    Profitability,
    /// Investment factors (conservative minus aggressive)
    Investment,
}

/// Factor metadata
#[derive(Debug, Clone)]
pub struct FactorInfo {
    /// Factor name (unique identifier)
    pub name: &'static str,
    /// Factor category
    pub category: FactorCategory,
    /// Brief description of what the factor measures
    pub description: &'static str,
    /// Variable whose labels define the legs
    pub variable: SortingVariable,
    /// Long leg
    pub long: Leg,
    /// Short leg
    pub short: Leg,
}

/// Get all available factor info
pub fn available_factors() -> Vec<FactorInfo> {
    vec![
        FactorInfo {
            name: "smb",
            category: FactorCategory::Size,
            description: "Small minus big: small-cap minus large-cap portfolios",
            variable: SortingVariable::Size,
            long: Leg::Label(1),
            short: Leg::Label(2),
        },
        FactorInfo {
            name: "hml",
            category: FactorCategory::Value,
            description: "High minus low: high minus low book-to-market portfolios",
            variable: SortingVariable::BookToMarket,
            long: Leg::Label(3),
            short: Leg::Label(1),
        },
        FactorInfo {
            name: "rmw",
            category: FactorCategory::Profitability,
            description: "Robust minus weak: high minus low operating profitability",
            variable: SortingVariable::OperatingProfitability,
            long: Leg::Label(3),
            short: Leg::Label(1),
        },
        FactorInfo {
            name: "cma",
            category: FactorCategory::Investment,
            description: "Conservative minus aggressive: low minus high asset growth",
            variable: SortingVariable::Investment,
            long: Leg::Label(1),
            short: Leg::Label(3),
        },
    ]
}

/// Get factor info by name
pub fn get_factor_info(name: &str) -> Option<FactorInfo> {
    available_factors().into_iter().find(|f| f.name == name)
}
