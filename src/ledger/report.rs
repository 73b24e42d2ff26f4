//! Monthly salary statistics per designation.
//!
//! The same aggregation is available through three independent paths:
//!
//! - [`direct`]: the literal SQL text, rows decoded field by field
//! - [`materialized`]: the same SQL materialized into a `DataFrame`
//! - [`composed`]: a [`SelectQuery`] built from expressions
//!
//! All three group by DESIGNATION, take MIN/MAX/AVG of `SALARY / 12.0`, and
//! order by the average descending. Ties keep whatever order SQLite's grouping
//! produces.

use super::query::{SelectQuery, col, lit};
use super::schema::{TABLE_NAME, columns};
use super::store::SalaryStore;
use crate::error::LedgerError;
use crate::utils::fit_width;
use anyhow::{Context as _, Result};
use polars::prelude::{DataFrame, DataType};
use serde::Serialize;
use sqlx::Row as _;
use std::fmt;

/// The aggregation as literal SQL.
pub const MONTHLY_SALARY_BY_DESIGNATION: &str = r#"
SELECT
    "DESIGNATION" AS designation,
    MIN("SALARY" / 12.0) AS min_monthly_salary,
    MAX("SALARY" / 12.0) AS max_monthly_salary,
    AVG("SALARY" / 12.0) AS avg_monthly_salary
FROM salaries
GROUP BY "DESIGNATION"
ORDER BY avg_monthly_salary DESC
"#;

const DESIGNATION_WIDTH: usize = 25;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DesignationStats {
    pub designation: String,
    pub min_monthly_salary: f64,
    pub max_monthly_salary: f64,
    pub avg_monthly_salary: f64,
}

impl fmt::Display for DesignationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Designation={} | Min={:10.2} | Max={:10.2} | Avg={:10.2}",
            fit_width(&self.designation, DESIGNATION_WIDTH),
            self.min_monthly_salary,
            self.max_monthly_salary,
            self.avg_monthly_salary
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AggregationPath {
    Direct,
    Materialized,
    Composed,
}

impl AggregationPath {
    pub const ALL: [Self; 3] = [Self::Direct, Self::Materialized, Self::Composed];
}

impl fmt::Display for AggregationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Direct => "direct SQL",
            Self::Materialized => "materialized frame",
            Self::Composed => "composed query",
        };
        f.write_str(name)
    }
}

/// The aggregation built from column references and aggregate calls.
pub fn monthly_salary_query() -> SelectQuery {
    let monthly = col(columns::SALARY) / lit(12.0);
    SelectQuery::from_table(TABLE_NAME)
        .select(col(columns::DESIGNATION).alias("designation"))
        .select(monthly.clone().min().alias("min_monthly_salary"))
        .select(monthly.clone().max().alias("max_monthly_salary"))
        .select(monthly.clone().avg().alias("avg_monthly_salary"))
        .group_by(col(columns::DESIGNATION))
        .order_by(monthly.avg().desc())
}

/// Path (a): literal SQL, each column read by name.
///
/// # Errors
///
/// Returns error if the query fails or a row cannot be decoded
pub async fn direct(store: &SalaryStore) -> Result<Vec<DesignationStats>> {
    let rows = sqlx::query(MONTHLY_SALARY_BY_DESIGNATION)
        .fetch_all(store.pool())
        .await
        .context("Failed to run monthly salary query")?;

    rows.iter()
        .map(|row| -> Result<DesignationStats> {
            Ok(DesignationStats {
                designation: row.try_get("designation")?,
                min_monthly_salary: row.try_get("min_monthly_salary")?,
                max_monthly_salary: row.try_get("max_monthly_salary")?,
                avg_monthly_salary: row.try_get("avg_monthly_salary")?,
            })
        })
        .collect()
}

/// Path (b): literal SQL materialized as a `DataFrame`.
///
/// # Errors
///
/// Returns error if the query fails
pub async fn materialized(store: &SalaryStore) -> Result<DataFrame> {
    store.read_sql_frame(MONTHLY_SALARY_BY_DESIGNATION).await
}

/// Path (c): the composed [`monthly_salary_query`].
///
/// # Errors
///
/// Returns error if the query fails or a row cannot be decoded
pub async fn composed(store: &SalaryStore) -> Result<Vec<DesignationStats>> {
    let sql = monthly_salary_query().to_sql();
    tracing::debug!(%sql, "Running composed query");
    sqlx::query_as::<_, DesignationStats>(&sql)
        .fetch_all(store.pool())
        .await
        .context("Failed to run composed monthly salary query")
}

/// Reads the rows of a materialized result frame back into stats.
///
/// # Errors
///
/// Returns error if an expected column is missing or a value is null
pub fn stats_from_frame(df: &DataFrame) -> Result<Vec<DesignationStats>> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let designation = df
        .column("designation")?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let designation = designation.str()?;
    let float_column = |name: &str| -> Result<Vec<Option<f64>>> {
        let s = df
            .column(name)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        Ok(s.f64()?.into_iter().collect())
    };
    let min = float_column("min_monthly_salary")?;
    let max = float_column("max_monthly_salary")?;
    let avg = float_column("avg_monthly_salary")?;

    designation
        .into_iter()
        .zip(min)
        .zip(max)
        .zip(avg)
        .enumerate()
        .map(|(row, (((d, lo), hi), mean))| -> Result<DesignationStats> {
            let missing = |column: &str| LedgerError::MissingValue {
                column: column.to_owned(),
                row,
            };
            Ok(DesignationStats {
                designation: d.ok_or_else(|| missing("designation"))?.to_owned(),
                min_monthly_salary: lo.ok_or_else(|| missing("min_monthly_salary"))?,
                max_monthly_salary: hi.ok_or_else(|| missing("max_monthly_salary"))?,
                avg_monthly_salary: mean.ok_or_else(|| missing("avg_monthly_salary"))?,
            })
        })
        .collect()
}

/// Results of all three paths over the same stored data.
#[derive(Debug, Clone)]
pub struct AggregationReport {
    pub direct: Vec<DesignationStats>,
    pub materialized: DataFrame,
    pub composed: Vec<DesignationStats>,
}

impl AggregationReport {
    /// # Errors
    ///
    /// Returns error if any of the three paths fails
    pub async fn collect(store: &SalaryStore) -> Result<Self> {
        Ok(Self {
            direct: direct(store).await?,
            materialized: materialized(store).await?,
            composed: composed(store).await?,
        })
    }

    /// # Errors
    ///
    /// Returns error if the materialized frame cannot be read back
    pub fn materialized_stats(&self) -> Result<Vec<DesignationStats>> {
        stats_from_frame(&self.materialized)
    }

    /// Checks that the three paths returned identical ordered results.
    ///
    /// # Errors
    ///
    /// [`LedgerError::PathMismatch`] naming the first pair that differs
    pub fn verify_consistency(&self) -> Result<()> {
        let materialized = self.materialized_stats()?;
        let pairs = [
            (AggregationPath::Direct, &self.direct, AggregationPath::Materialized, &materialized),
            (AggregationPath::Direct, &self.direct, AggregationPath::Composed, &self.composed),
        ];
        for (left_path, left, right_path, right) in pairs {
            if left != right {
                return Err(LedgerError::PathMismatch {
                    left: left_path.to_string(),
                    right: right_path.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// One formatted line per designation.
pub fn render_lines(stats: &[DesignationStats]) -> String {
    stats
        .iter()
        .map(DesignationStats::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
