//! Persistence of the tidy finance tables.

pub mod sqlite;

pub use sqlite::{FactorTable, PermnoCount, TableInfo, TidyFinanceDb};
