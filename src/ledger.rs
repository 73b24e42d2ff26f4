//! CSV → SQLite salary ledger.
//!
//! - [`loader`]: reads the CSV and builds the preview summaries
//! - [`domain`]: categorical domains and their canonical labels
//! - [`schema`]: the `salaries` table definition and frame normalization
//! - [`record`]: typed rows
//! - [`store`]: the SQLite file
//! - [`query`]: composable SELECT statements
//! - [`report`]: monthly salary statistics per designation
//! - [`pipeline`]: the stages wired together

pub mod domain;
pub mod loader;
pub mod pipeline;
pub mod query;
pub mod record;
pub mod report;
pub mod schema;
pub mod store;
