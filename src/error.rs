//! Contract violations detected by the salary pipeline.
//!
//! Most fallible functions in this crate return [`anyhow::Result`] and attach
//! context as errors bubble up. The conditions below are the ones the pipeline
//! itself detects (as opposed to I/O, Polars or SQLite failures), so they get a
//! concrete type that callers and tests can match on:
//!
//! ```
//! use salary_ledger::error::LedgerError;
//!
//! fn describe(err: &anyhow::Error) -> &'static str {
//!     match err.downcast_ref::<LedgerError>() {
//!         Some(LedgerError::MissingColumn { .. }) => "bad header",
//!         Some(LedgerError::OutsideDomain { .. }) => "unexpected category",
//!         Some(_) => "contract violation",
//!         None => "other failure",
//!     }
//! }
//! ```

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// Input file does not exist or is not a regular file
    InvalidPath(PathBuf),

    /// A column the record schema needs is absent from the loaded table
    MissingColumn { column: String },

    /// A non-nullable field is null in the given (zero-based) data row
    MissingValue { column: String, row: usize },

    /// A categorical value is not a member of the column's domain
    OutsideDomain { column: String, value: String },

    /// A categorical value lost its label to another value with the same canonical label
    ShadowedByCollision {
        column: String,
        label: String,
        value: String,
        kept: String,
    },

    /// Two aggregation paths returned different results
    PathMismatch { left: String, right: String },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPath(path) => write!(f, "Input file not found: {}", path.display()),
            Self::MissingColumn { column } => write!(f, "Missing column '{column}'"),
            Self::MissingValue { column, row } => {
                write!(f, "Column '{column}' is required but row {row} is null")
            }
            Self::OutsideDomain { column, value } => {
                write!(f, "Value '{value}' is not part of the '{column}' domain")
            }
            Self::ShadowedByCollision {
                column,
                label,
                value,
                kept,
            } => write!(
                f,
                "Value '{value}' in '{column}' collides with '{kept}' on label {label}"
            ),
            Self::PathMismatch { left, right } => {
                write!(f, "Aggregation paths disagree: {left} vs {right}")
            }
        }
    }
}

impl std::error::Error for LedgerError {}
