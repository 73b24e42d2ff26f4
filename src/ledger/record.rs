use super::schema::columns;
use crate::error::LedgerError;
use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;

/// One salary row. Field order follows the source header.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SalaryRecord {
    #[sqlx(rename = "FIRST NAME")]
    pub first_name: Option<String>,
    #[sqlx(rename = "LAST NAME")]
    pub last_name: Option<String>,
    #[sqlx(rename = "SEX")]
    pub sex: String,
    #[sqlx(rename = "DOJ")]
    pub date_of_joining: Option<NaiveDate>,
    #[sqlx(rename = "CURRENT DATE")]
    pub current_date: Option<NaiveDate>,
    #[sqlx(rename = "DESIGNATION")]
    pub designation: String,
    #[sqlx(rename = "AGE")]
    pub age: Option<i64>,
    #[sqlx(rename = "SALARY")]
    pub salary: f64,
    #[sqlx(rename = "UNIT")]
    pub unit: String,
    #[sqlx(rename = "LEAVES USED")]
    pub leaves_used: Option<i64>,
    #[sqlx(rename = "LEAVES REMAINING")]
    pub leaves_remaining: Option<i64>,
    #[sqlx(rename = "RATINGS")]
    pub ratings: Option<f64>,
    #[sqlx(rename = "PAST EXP")]
    pub past_exp: Option<f64>,
}

/// A row read back from the store, with its synthetic key.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct StoredRecord {
    pub id: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: SalaryRecord,
}

fn series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    Ok(df
        .column(name)
        .ok()
        .ok_or_else(|| LedgerError::MissingColumn {
            column: name.to_owned(),
        })?
        .as_materialized_series())
}

fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let s = series(df, name)?.cast(&DataType::String)?;
    Ok(s.str()?
        .into_iter()
        .map(|v| v.map(ToOwned::to_owned))
        .collect())
}

fn int_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let s = series(df, name)?.cast(&DataType::Int64)?;
    Ok(s.i64()?.into_iter().collect())
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let s = series(df, name)?.cast(&DataType::Float64)?;
    Ok(s.f64()?.into_iter().collect())
}

fn date_values(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDate>>> {
    let dates = series(df, name)?
        .date()
        .with_context(|| format!("Column '{name}' is not a date column"))?;
    Ok(dates.as_date_iter().collect())
}

fn required<T>(value: Option<T>, column: &str, row: usize) -> Result<T> {
    value.ok_or_else(|| {
        LedgerError::MissingValue {
            column: column.to_owned(),
            row,
        }
        .into()
    })
}

/// Converts a normalized table (see `RecordSchema::normalize_frame`) into
/// typed records, one per row.
///
/// # Errors
///
/// Returns error if a column is missing or has the wrong type, or a required
/// value is null
pub fn records_from_frame(df: &DataFrame) -> Result<Vec<SalaryRecord>> {
    let first_names = text_values(df, columns::FIRST_NAME)?;
    let last_names = text_values(df, columns::LAST_NAME)?;
    let sexes = text_values(df, columns::SEX)?;
    let joined = date_values(df, columns::DOJ)?;
    let current = date_values(df, columns::CURRENT_DATE)?;
    let designations = text_values(df, columns::DESIGNATION)?;
    let ages = int_values(df, columns::AGE)?;
    let salaries = float_values(df, columns::SALARY)?;
    let units = text_values(df, columns::UNIT)?;
    let leaves_used = int_values(df, columns::LEAVES_USED)?;
    let leaves_remaining = int_values(df, columns::LEAVES_REMAINING)?;
    let ratings = float_values(df, columns::RATINGS)?;
    let past_exp = float_values(df, columns::PAST_EXP)?;

    let mut first_names = first_names.into_iter();
    let mut last_names = last_names.into_iter();
    let mut sexes = sexes.into_iter();
    let mut joined = joined.into_iter();
    let mut current = current.into_iter();
    let mut designations = designations.into_iter();
    let mut ages = ages.into_iter();
    let mut salaries = salaries.into_iter();
    let mut units = units.into_iter();
    let mut leaves_used = leaves_used.into_iter();
    let mut leaves_remaining = leaves_remaining.into_iter();
    let mut ratings = ratings.into_iter();
    let mut past_exp = past_exp.into_iter();

    (0..df.height())
        .map(|row| {
            Ok(SalaryRecord {
                first_name: first_names.next().flatten(),
                last_name: last_names.next().flatten(),
                sex: required(sexes.next().flatten(), columns::SEX, row)?,
                date_of_joining: joined.next().flatten(),
                current_date: current.next().flatten(),
                designation: required(
                    designations.next().flatten(),
                    columns::DESIGNATION,
                    row,
                )?,
                age: ages.next().flatten(),
                salary: required(salaries.next().flatten(), columns::SALARY, row)?,
                unit: required(units.next().flatten(), columns::UNIT, row)?,
                leaves_used: leaves_used.next().flatten(),
                leaves_remaining: leaves_remaining.next().flatten(),
                ratings: ratings.next().flatten(),
                past_exp: past_exp.next().flatten(),
            })
        })
        .collect::<Result<Vec<_>>>()
        .context("Failed to convert table rows into salary records")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::domain::DomainSet;
    use crate::ledger::schema::RecordSchema;

    fn normalized() -> Result<DataFrame> {
        let df = df!(
            columns::FIRST_NAME => ["Ana", "Rui"],
            columns::LAST_NAME => [Some("Silva"), None],
            columns::SEX => ["F", "M"],
            columns::DOJ => [Some("04/20/2014"), Some("garbage")],
            columns::CURRENT_DATE => [Some("01/07/2016"), None],
            columns::DESIGNATION => ["Manager", "Analyst"],
            columns::AGE => [Some(34i64), None],
            columns::SALARY => [120_000i64, 48_000],
            columns::UNIT => ["Finance", "IT"],
            columns::LEAVES_USED => [Some(20i64), Some(12)],
            columns::LEAVES_REMAINING => [Some(10i64), None],
            columns::RATINGS => [Some(4.5), None],
            columns::PAST_EXP => [Some(2.0), Some(0.0)],
        )?;
        let schema = RecordSchema::salaries(&DomainSet::infer(&df)?);
        schema.normalize_frame(&df, "%m/%d/%Y")
    }

    #[test]
    fn test_records_from_frame() -> Result<()> {
        let records = records_from_frame(&normalized()?)?;
        assert_eq!(records.len(), 2);

        let ana = records.first().expect("first record");
        assert_eq!(ana.first_name.as_deref(), Some("Ana"));
        assert_eq!(ana.date_of_joining, NaiveDate::from_ymd_opt(2014, 4, 20));
        assert_eq!(ana.current_date, NaiveDate::from_ymd_opt(2016, 1, 7));
        assert_eq!(ana.designation, "Manager");
        assert_eq!(ana.salary, 120_000.0);
        assert_eq!(ana.ratings, Some(4.5));

        let rui = records.get(1).expect("second record");
        assert_eq!(rui.last_name, None);
        assert_eq!(rui.date_of_joining, None, "Unparseable date becomes null");
        assert_eq!(rui.current_date, None);
        assert_eq!(rui.age, None);
        assert_eq!(rui.leaves_remaining, None);
        Ok(())
    }

    #[test]
    fn test_unnormalized_dates_are_rejected() -> Result<()> {
        let df = df!(columns::DOJ => ["04/20/2014"])?;
        assert!(date_values(&df, columns::DOJ).is_err());
        Ok(())
    }

    #[test]
    fn test_required_reports_row() {
        let err = required::<f64>(None, columns::SALARY, 7).expect_err("null is rejected");
        assert_eq!(
            err.downcast_ref::<LedgerError>(),
            Some(&LedgerError::MissingValue {
                column: columns::SALARY.to_owned(),
                row: 7
            })
        );
    }
}
