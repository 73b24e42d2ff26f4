//! # Salary Ledger
//!
//! Loads a salary CSV, derives the categorical domains of its SEX,
//! DESIGNATION and UNIT columns, persists every row to a SQLite table guarded
//! by those domains, and reports monthly salary statistics per designation.
//!
//! ## Quick Start
//!
//! ```no_run
//! use salary_ledger::config::LedgerConfig;
//! use salary_ledger::ledger::{pipeline, report};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let outcome = pipeline::run(&LedgerConfig::default()).await?;
//! println!("{} rows stored", outcome.persisted.total_rows);
//!
//! outcome.report.verify_consistency()?;
//! println!("{}", report::render_lines(&outcome.report.direct));
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`ledger`]: the pipeline and everything it is built from
//!   - [`ledger::domain`]: categorical domains and canonical labels
//!   - [`ledger::store`]: the SQLite table
//!   - [`ledger::report`]: the three aggregation paths
//! - [`config`]: JSON configuration
//! - [`logging`]: `tracing` subscriber setup
//! - [`error`]: error types the pipeline detects
//! - [`utils`]: formatting helpers
//!
//! ## Key Concepts
//!
//! ### Domains as values
//!
//! A categorical domain is data, not a type. It is inferred from the loaded
//! table and passed to the schema, which turns it into a `CHECK` constraint:
//!
//! ```
//! use salary_ledger::ledger::domain::CategoricalDomain;
//!
//! let unit = CategoricalDomain::from_values("UNIT", [Some("IT"), Some("Web"), Some("IT")]);
//! assert_eq!(unit.len(), 2);
//! assert_eq!(unit.value_for("WEB"), Some("Web"));
//! assert!(unit.validate("Finance").is_err());
//! ```
//!
//! ### Three paths, one answer
//!
//! The same aggregation runs as literal SQL, as a materialized `DataFrame`,
//! and as a composed query. `AggregationReport::verify_consistency` fails with
//! [`error::LedgerError::PathMismatch`] if they ever disagree.

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod utils;
