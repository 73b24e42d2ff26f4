use super::schema::columns;
use crate::error::LedgerError;
use anyhow::{Context as _, Result};
use polars::prelude::*;
use serde::Serialize;
use std::path::Path;

/// Reads the salary CSV into a `DataFrame`. Column names are kept as-is and
/// types are inferred from the first `infer_schema_length` rows; date columns
/// stay text until the schema normalizes them.
///
/// # Errors
///
/// Returns error if the file is missing, unreadable, or its header lacks any
/// of the expected columns
pub fn load_salaries(path: &Path, infer_schema_length: usize) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(LedgerError::InvalidPath(path.to_path_buf()).into());
    }

    let df = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(infer_schema_length))
        .with_has_header(true)
        .finish()?
        .collect()
        .with_context(|| format!("Failed to read CSV: {}", path.display()))?;

    check_header(&df)?;
    tracing::info!(
        rows = df.height(),
        columns = df.width(),
        "Loaded {}",
        path.display()
    );
    Ok(df)
}

fn check_header(df: &DataFrame) -> Result<()> {
    let present = df.get_column_names();
    if let Some(missing) = columns::ALL
        .iter()
        .find(|name| !present.iter().any(|p| p.as_str() == **name))
    {
        return Err(LedgerError::MissingColumn {
            column: (*missing).to_owned(),
        }
        .into());
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnOverview {
    pub name: String,
    pub dtype: String,
    pub non_null: usize,
}

/// Name, dtype and non-null count of every column.
pub fn column_overview(df: &DataFrame) -> Vec<ColumnOverview> {
    df.get_columns()
        .iter()
        .map(|c| ColumnOverview {
            name: c.name().to_string(),
            dtype: c.dtype().to_string(),
            non_null: c.len() - c.null_count(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl NumericSummary {
    fn from_chunked(column: &str, ca: &Float64Chunked) -> Result<Self> {
        Ok(Self {
            column: column.to_owned(),
            count: ca.len() - ca.null_count(),
            mean: ca.mean(),
            std: ca.std(1),
            min: ca.min(),
            q25: ca.quantile(0.25, QuantileMethod::Linear)?,
            median: ca.median(),
            q75: ca.quantile(0.75, QuantileMethod::Linear)?,
            max: ca.max(),
        })
    }
}

/// count/mean/std/min/quartiles/max for every numeric column, nulls skipped.
///
/// # Errors
///
/// Returns error if a numeric column cannot be cast to `f64`
pub fn describe_numeric(df: &DataFrame) -> Result<Vec<NumericSummary>> {
    let mut summaries = Vec::new();
    for col in df.get_columns() {
        if !col.dtype().is_primitive_numeric() {
            continue;
        }
        let as_f64 = col.as_materialized_series().cast(&DataType::Float64)?;
        let summary = NumericSummary::from_chunked(col.name().as_str(), as_f64.f64()?)
            .with_context(|| format!("Failed to summarize column '{}'", col.name()))?;
        summaries.push(summary);
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    const HEADER: &str = "FIRST NAME,LAST NAME,SEX,DOJ,CURRENT DATE,DESIGNATION,AGE,SALARY,UNIT,LEAVES USED,LEAVES REMAINING,RATINGS,PAST EXP";

    fn write_csv(dir: &Path, body: &str) -> Result<std::path::PathBuf> {
        let path = dir.join("salaries.csv");
        let mut file = std::fs::File::create(&path)?;
        writeln!(file, "{HEADER}")?;
        write!(file, "{body}")?;
        Ok(path)
    }

    #[test]
    fn test_load_preserves_columns() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_csv(
            dir.path(),
            "Ana,Silva,F,04/20/2014,01/07/2016,Manager,34,120000,Finance,20,10,4.5,2\n\
             Rui,Souza,M,,01/07/2016,Analyst,,48000,IT,12,18,,0\n",
        )?;

        let df = load_salaries(&path, 100)?;
        assert_eq!(df.height(), 2);
        let names: Vec<&str> = df
            .get_column_names()
            .into_iter()
            .map(PlSmallStr::as_str)
            .collect();
        assert_eq!(names, columns::ALL.to_vec());
        assert_eq!(df.column(columns::DOJ)?.dtype(), &DataType::String);
        assert_eq!(df.column(columns::AGE)?.null_count(), 1);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = load_salaries(Path::new("/nonexistent/salaries.csv"), 100)
            .expect_err("missing file is fatal");
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_header_missing_column() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("short.csv");
        std::fs::write(&path, "FIRST NAME,SEX,SALARY\nAna,F,1000\n")?;

        let err = load_salaries(&path, 100).expect_err("header is incomplete");
        assert_eq!(
            err.downcast_ref::<LedgerError>(),
            Some(&LedgerError::MissingColumn {
                column: columns::LAST_NAME.to_owned()
            })
        );
        Ok(())
    }

    #[test]
    fn test_describe_numeric() -> Result<()> {
        let df = df!(
            "SALARY" => [Some(10.0), Some(20.0), None, Some(30.0), Some(40.0)],
            "UNIT" => ["a", "b", "c", "d", "e"],
        )?;
        let summaries = describe_numeric(&df)?;
        assert_eq!(summaries.len(), 1, "Text columns are skipped");

        let salary = summaries.first().expect("salary summary");
        assert_eq!(salary.count, 4);
        assert_eq!(salary.mean, Some(25.0));
        assert_eq!(salary.min, Some(10.0));
        assert_eq!(salary.median, Some(25.0));
        assert_eq!(salary.q25, Some(17.5));
        assert_eq!(salary.max, Some(40.0));
        let std = salary.std.expect("std with 4 values");
        assert!((std - 12.909_944_487_358_056).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_describe_single_and_empty_columns() -> Result<()> {
        let df = df!(
            "AGE" => [Some(30i64), None],
            "RATINGS" => [None::<f64>, None],
        )?;
        let summaries = describe_numeric(&df)?;

        let age = summaries.first().expect("age summary");
        assert_eq!(age.count, 1);
        assert_eq!(age.mean, Some(30.0));
        assert_eq!(age.median, Some(30.0));
        assert_eq!(age.q75, Some(30.0));

        let ratings = summaries.get(1).expect("ratings summary");
        assert_eq!(ratings.count, 0);
        assert_eq!(ratings.mean, None);
        assert_eq!(ratings.min, None);
        assert_eq!(ratings.q25, None);
        Ok(())
    }

    #[test]
    fn test_column_overview() -> Result<()> {
        let df = df!("AGE" => [Some(30i64), None, Some(41)])?;
        let overview = column_overview(&df);
        assert_eq!(
            overview,
            vec![ColumnOverview {
                name: "AGE".to_owned(),
                dtype: "i64".to_owned(),
                non_null: 2,
            }]
        );
        Ok(())
    }
}
