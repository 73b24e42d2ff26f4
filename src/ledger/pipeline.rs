//! The ledger as explicit stages.
//!
//! ```text
//! load ─> infer_domains ─> build_schema ─> prepare_records
//!                                │               │
//!                                └─> open_store ─┴─> persist ─> aggregate
//! ```
//!
//! Each stage takes its predecessor's output, so callers (the CLI, the tests)
//! can stop after any of them. [`run`] drives all of them in order.

use super::domain::DomainSet;
use super::loader::load_salaries;
use super::record::{SalaryRecord, records_from_frame};
use super::report::AggregationReport;
use super::schema::RecordSchema;
use super::store::{SalaryStore, SchemaStatus};
use crate::config::LedgerConfig;
use anyhow::{Context as _, Result};
use polars::prelude::DataFrame;
use std::path::Path;

/// # Errors
///
/// Returns error if the input file is missing or unreadable
pub fn load(config: &LedgerConfig) -> Result<DataFrame> {
    load_salaries(&config.input_path, config.infer_schema_length)
}

/// # Errors
///
/// Returns error if a categorical column is absent
pub fn infer_domains(df: &DataFrame) -> Result<DomainSet> {
    DomainSet::infer(df).context("Failed to infer categorical domains")
}

pub fn build_schema(domains: &DomainSet) -> RecordSchema {
    RecordSchema::salaries(domains)
}

/// Rows ready to insert, plus the normalized frame they came from.
#[derive(Debug, Clone)]
pub struct PreparedRecords {
    pub frame: DataFrame,
    pub records: Vec<SalaryRecord>,
}

/// Normalizes column types (dates included) and converts rows to records.
///
/// # Errors
///
/// Returns error if a required value is null or a categorical value is
/// rejected by its domain
pub fn prepare_records(
    df: &DataFrame,
    schema: &RecordSchema,
    date_format: &str,
) -> Result<PreparedRecords> {
    let frame = schema
        .normalize_frame(df, date_format)
        .context("Failed to normalize salary table")?;
    let records = records_from_frame(&frame)?;
    Ok(PreparedRecords { frame, records })
}

/// # Errors
///
/// Returns error if the database cannot be opened or the table cannot be
/// created
pub async fn open_store(path: &Path, schema: &RecordSchema) -> Result<(SalaryStore, SchemaStatus)> {
    let store = SalaryStore::open(path).await?;
    let status = store.ensure_schema(schema).await?;
    Ok((store, status))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    pub inserted: u64,
    pub total_rows: i64,
}

/// # Errors
///
/// Returns error if the insert transaction fails
pub async fn persist(
    store: &SalaryStore,
    schema: &RecordSchema,
    records: &[SalaryRecord],
    batch_size: usize,
) -> Result<PersistOutcome> {
    let inserted = store.append_all(schema, records, batch_size).await?;
    let total_rows = store.row_count().await?;
    Ok(PersistOutcome {
        inserted,
        total_rows,
    })
}

/// # Errors
///
/// Returns error if any aggregation path fails
pub async fn aggregate(store: &SalaryStore) -> Result<AggregationReport> {
    AggregationReport::collect(store).await
}

/// Everything a full run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub domains: DomainSet,
    pub schema_status: SchemaStatus,
    pub persisted: PersistOutcome,
    pub report: AggregationReport,
}

/// Load, infer, persist and aggregate in one go. The store is closed before
/// returning.
///
/// # Errors
///
/// Returns error from the first stage that fails
pub async fn run(config: &LedgerConfig) -> Result<RunOutcome> {
    let df = load(config)?;
    let domains = infer_domains(&df)?;
    let schema = build_schema(&domains);
    let prepared = prepare_records(&df, &schema, &config.date_format)?;

    let (store, schema_status) = open_store(&config.database_path, &schema).await?;
    let persisted = persist(
        &store,
        &schema,
        &prepared.records,
        config.insert_batch_size,
    )
    .await?;
    let report = aggregate(&store).await?;
    store.close().await;

    Ok(RunOutcome {
        domains,
        schema_status,
        persisted,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::schema::columns;
    use polars::prelude::df;

    fn frame() -> Result<DataFrame> {
        Ok(df!(
            columns::FIRST_NAME => ["Ana", "Rui", "Eva"],
            columns::LAST_NAME => ["Silva", "Souza", "Lima"],
            columns::SEX => ["F", "M", "F"],
            columns::DOJ => ["04/20/2014", "01/02/2015", "bad"],
            columns::CURRENT_DATE => ["01/07/2016", "01/07/2016", "01/07/2016"],
            columns::DESIGNATION => ["Manager", "Manager", "Analyst"],
            columns::AGE => [34i64, 40, 25],
            columns::SALARY => [120_000i64, 60_000, 48_000],
            columns::UNIT => ["Finance", "IT", "IT"],
            columns::LEAVES_USED => [20i64, 12, 15],
            columns::LEAVES_REMAINING => [10i64, 18, 15],
            columns::RATINGS => [4.5, 3.0, 2.5],
            columns::PAST_EXP => [2.0, 0.0, 1.0],
        )?)
    }

    #[test]
    fn test_prepare_records() -> Result<()> {
        let df = frame()?;
        let schema = build_schema(&infer_domains(&df)?);
        let prepared = prepare_records(&df, &schema, "%m/%d/%Y")?;
        assert_eq!(prepared.records.len(), 3);
        assert_eq!(prepared.frame.height(), 3);
        assert_eq!(
            prepared.records.get(2).and_then(|r| r.date_of_joining),
            None
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_stages_end_to_end() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let df = frame()?;
        let schema = build_schema(&infer_domains(&df)?);
        let prepared = prepare_records(&df, &schema, "%m/%d/%Y")?;

        let (store, status) = open_store(&dir.path().join("ledger.db"), &schema).await?;
        assert_eq!(status, SchemaStatus::Created);

        let outcome = persist(&store, &schema, &prepared.records, 2).await?;
        assert_eq!(
            outcome,
            PersistOutcome {
                inserted: 3,
                total_rows: 3
            }
        );

        let report = aggregate(&store).await?;
        report.verify_consistency()?;
        let top = report.direct.first().expect("manager row");
        assert_eq!(top.designation, "Manager");
        assert!((top.min_monthly_salary - 5000.0).abs() < 1e-9);
        assert!((top.max_monthly_salary - 10_000.0).abs() < 1e-9);
        assert!((top.avg_monthly_salary - 7500.0).abs() < 1e-9);
        store.close().await;
        Ok(())
    }
}
