//! Glue between the command line and the study crates.
//!
//! Locates the tidy finance database and loads the optional JSON run
//! configuration whose values the command-line flags override.

pub(crate) mod config;
pub(crate) mod database;
