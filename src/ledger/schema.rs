//! Record schema for the `salaries` table.
//!
//! Field names are the CSV header names verbatim, so the loaded table can be
//! appended to the store by name without any renaming step.

use super::domain::{CategoricalDomain, DomainSet};
use crate::error::LedgerError;
use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use polars::prelude::*;

pub const TABLE_NAME: &str = "salaries";

/// Source column names, byte-for-byte as they appear in the CSV header.
pub mod columns {
    pub const FIRST_NAME: &str = "FIRST NAME";
    pub const LAST_NAME: &str = "LAST NAME";
    pub const SEX: &str = "SEX";
    pub const DOJ: &str = "DOJ";
    pub const CURRENT_DATE: &str = "CURRENT DATE";
    pub const DESIGNATION: &str = "DESIGNATION";
    pub const AGE: &str = "AGE";
    pub const SALARY: &str = "SALARY";
    pub const UNIT: &str = "UNIT";
    pub const LEAVES_USED: &str = "LEAVES USED";
    pub const LEAVES_REMAINING: &str = "LEAVES REMAINING";
    pub const RATINGS: &str = "RATINGS";
    pub const PAST_EXP: &str = "PAST EXP";

    /// Header order of the source file and insert order of the table.
    pub const ALL: [&str; 13] = [
        FIRST_NAME,
        LAST_NAME,
        SEX,
        DOJ,
        CURRENT_DATE,
        DESIGNATION,
        AGE,
        SALARY,
        UNIT,
        LEAVES_USED,
        LEAVES_REMAINING,
        RATINGS,
        PAST_EXP,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Date,
    Categorical(CategoricalDomain),
}

impl FieldType {
    fn sql_type(&self) -> String {
        match self {
            Self::Text => "VARCHAR".to_owned(),
            Self::Integer => "INTEGER".to_owned(),
            Self::Float => "FLOAT".to_owned(),
            Self::Date => "DATE".to_owned(),
            Self::Categorical(domain) => {
                let width = domain.values().map(|v| v.chars().count()).max().unwrap_or(1);
                format!("VARCHAR({})", width.max(1))
            }
        }
    }

    fn polars_dtype(&self) -> DataType {
        match self {
            Self::Text | Self::Categorical(_) => DataType::String,
            Self::Integer => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Date => DataType::Date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub nullable: bool,
}

impl FieldSpec {
    fn new(name: &'static str, field_type: FieldType, nullable: bool) -> Self {
        Self {
            name,
            field_type,
            nullable,
        }
    }

    fn column_definition(&self) -> String {
        let name = quote_ident(self.name);
        let mut def = format!("{name} {}", self.field_type.sql_type());
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if let FieldType::Categorical(domain) = &self.field_type {
            let allowed: Vec<String> = domain.values().map(quote_literal).collect();
            def.push_str(&format!(" CHECK ({name} IN ({}))", allowed.join(", ")));
        }
        def
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    fields: Vec<FieldSpec>,
}

impl RecordSchema {
    /// The salary row shape. Requires the inferred domains, so it cannot be
    /// built before inference has run.
    pub fn salaries(domains: &DomainSet) -> Self {
        use FieldType::{Date, Float, Integer, Text};

        let fields = vec![
            FieldSpec::new(columns::FIRST_NAME, Text, true),
            FieldSpec::new(columns::LAST_NAME, Text, true),
            FieldSpec::new(
                columns::SEX,
                FieldType::Categorical(domains.sex.clone()),
                false,
            ),
            FieldSpec::new(columns::DOJ, Date, true),
            FieldSpec::new(columns::CURRENT_DATE, Date, true),
            FieldSpec::new(
                columns::DESIGNATION,
                FieldType::Categorical(domains.designation.clone()),
                false,
            ),
            FieldSpec::new(columns::AGE, Integer, true),
            FieldSpec::new(columns::SALARY, Float, false),
            FieldSpec::new(
                columns::UNIT,
                FieldType::Categorical(domains.unit.clone()),
                false,
            ),
            FieldSpec::new(columns::LEAVES_USED, Integer, true),
            FieldSpec::new(columns::LEAVES_REMAINING, Integer, true),
            FieldSpec::new(columns::RATINGS, Float, true),
            FieldSpec::new(columns::PAST_EXP, Float, true),
        ];
        Self { fields }
    }

    pub fn table(&self) -> &'static str {
        TABLE_NAME
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Quoted, comma-separated column list in field order.
    pub fn column_list(&self) -> String {
        self.fields
            .iter()
            .map(|f| quote_ident(f.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `CREATE TABLE IF NOT EXISTS` statement with a synthetic `id` key and
    /// a `CHECK` constraint per categorical field.
    pub fn create_table_sql(&self) -> String {
        let mut definitions = vec![format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT",
            quote_ident("id")
        )];
        definitions.extend(self.fields.iter().map(FieldSpec::column_definition));
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(TABLE_NAME),
            definitions.join(", ")
        )
    }

    /// Projects `df` onto the schema: schema columns in schema order, each
    /// cast to its storage type, date columns parsed with `date_format`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::MissingColumn`] for an absent column,
    /// [`LedgerError::MissingValue`] for a null in a required field, and the
    /// domain's validation error for a categorical value outside its domain
    pub fn normalize_frame(&self, df: &DataFrame, date_format: &str) -> Result<DataFrame> {
        let extra: Vec<&str> = df
            .get_column_names()
            .into_iter()
            .map(PlSmallStr::as_str)
            .filter(|name| self.field(name).is_none())
            .collect();
        if !extra.is_empty() {
            tracing::warn!(?extra, "Ignoring columns that are not part of the schema");
        }

        let mut normalized = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let source = df
                .column(field.name)
                .ok()
                .ok_or_else(|| LedgerError::MissingColumn {
                    column: field.name.to_owned(),
                })?
                .as_materialized_series();

            let series = match &field.field_type {
                FieldType::Date => parse_date_series(source, date_format)?,
                other => source
                    .cast(&other.polars_dtype())
                    .with_context(|| format!("Failed to cast column '{}'", field.name))?,
            };

            if !field.nullable && series.null_count() > 0 {
                let row = first_null_row(&series).unwrap_or_default();
                return Err(LedgerError::MissingValue {
                    column: field.name.to_owned(),
                    row,
                }
                .into());
            }

            if let FieldType::Categorical(domain) = &field.field_type {
                for value in series.str()?.into_iter().flatten() {
                    domain.validate(value)?;
                }
            }

            normalized.push(Column::from(series));
        }

        DataFrame::new(normalized).context("Failed to assemble normalized table")
    }
}

/// Parses `raw` with exactly `format`. Null and unparseable input both yield
/// `None`.
pub fn parse_date(raw: Option<&str>, format: &str) -> Option<NaiveDate> {
    let raw = raw?;
    // chrono skips spaces before numeric fields; a format without spaces
    // must not match input with them.
    if raw.contains(char::is_whitespace) && !format.contains(char::is_whitespace) {
        return None;
    }
    NaiveDate::parse_from_str(raw, format).ok()
}

fn parse_date_series(source: &Series, format: &str) -> Result<Series> {
    let as_text = source
        .cast(&DataType::String)
        .with_context(|| format!("Failed to read '{}' as text", source.name()))?;
    let dates: Vec<Option<NaiveDate>> = as_text
        .str()?
        .into_iter()
        .map(|raw| parse_date(raw, format))
        .collect();

    let unparsed = dates
        .iter()
        .filter(|d| d.is_none())
        .count()
        .saturating_sub(source.null_count());
    if unparsed > 0 {
        tracing::debug!(
            column = source.name().as_str(),
            unparsed,
            "Unparseable dates stored as null"
        );
    }

    Ok(DateChunked::from_naive_date_options(source.name().clone(), dates).into_series())
}

fn first_null_row(series: &Series) -> Option<usize> {
    series.is_null().into_iter().position(|v| v == Some(true))
}

/// Double-quotes an identifier, doubling any embedded quotes.
pub fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Single-quotes a string literal, doubling any embedded quotes.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike as _;

    fn sample_frame() -> PolarsResult<DataFrame> {
        df!(
            columns::FIRST_NAME => [Some("Ana"), None],
            columns::LAST_NAME => ["Silva", "Souza"],
            columns::SEX => ["F", "M"],
            columns::DOJ => [Some("04/20/2014"), Some("not a date")],
            columns::CURRENT_DATE => [Some("01/07/2016"), None],
            columns::DESIGNATION => ["Manager", "Analyst"],
            columns::AGE => [Some(34i64), None],
            columns::SALARY => [120_000.0, 48_000.0],
            columns::UNIT => ["Finance", "IT"],
            columns::LEAVES_USED => [Some(20i64), Some(12)],
            columns::LEAVES_REMAINING => [Some(10i64), None],
            columns::RATINGS => [Some(4.5), None],
            columns::PAST_EXP => [Some(2.0), Some(0.0)],
        )
    }

    fn schema_for(df: &DataFrame) -> Result<RecordSchema> {
        Ok(RecordSchema::salaries(&DomainSet::infer(df)?))
    }

    #[test]
    fn test_parse_date() {
        let date = parse_date(Some("04/20/2014"), "%m/%d/%Y").expect("valid date");
        assert_eq!((date.year(), date.month(), date.day()), (2014, 4, 20));
        assert_eq!(parse_date(None, "%m/%d/%Y"), None);
        assert_eq!(parse_date(Some("2014-04-20"), "%m/%d/%Y"), None);
        assert_eq!(parse_date(Some("13/45/2014"), "%m/%d/%Y"), None);
        assert_eq!(parse_date(Some(""), "%m/%d/%Y"), None);
        assert_eq!(parse_date(Some(" 04/20/2014"), "%m/%d/%Y"), None);
        assert_eq!(parse_date(Some("04/20/2014 "), "%m/%d/%Y"), None);
        assert_eq!(parse_date(Some("04/ 20/2014"), "%m/%d/%Y"), None);
    }

    #[test]
    fn test_date_series_roundtrip() -> Result<()> {
        let raw = Series::new(
            columns::DOJ.into(),
            [Some("04/20/2014"), None, Some("01/01/1970"), Some(" 01/07/2016")],
        );
        let parsed = parse_date_series(&raw, "%m/%d/%Y")?;
        assert_eq!(parsed.name().as_str(), columns::DOJ);
        assert_eq!(parsed.dtype(), &DataType::Date);

        let dates: Vec<Option<NaiveDate>> = parsed.date()?.as_date_iter().collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2014, 4, 20),
                None,
                NaiveDate::from_ymd_opt(1970, 1, 1),
                None,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_schema_field_names_match_header() -> Result<()> {
        let schema = schema_for(&sample_frame()?)?;
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name).collect();
        assert_eq!(names, columns::ALL.to_vec());

        let required: Vec<&str> = schema
            .fields()
            .iter()
            .filter(|f| !f.nullable)
            .map(|f| f.name)
            .collect();
        assert_eq!(
            required,
            vec![columns::SEX, columns::DESIGNATION, columns::SALARY, columns::UNIT]
        );
        Ok(())
    }

    #[test]
    fn test_create_table_sql() -> Result<()> {
        let schema = schema_for(&sample_frame()?)?;
        let sql = schema.create_table_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"salaries\""));
        assert!(sql.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("\"SEX\" VARCHAR(1) NOT NULL CHECK (\"SEX\" IN ('F', 'M'))"));
        assert!(sql.contains("\"DESIGNATION\" VARCHAR(7) NOT NULL"));
        assert!(sql.contains("\"SALARY\" FLOAT NOT NULL"));
        assert!(sql.contains("\"DOJ\" DATE,"));
        Ok(())
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_ident("LEAVES USED"), "\"LEAVES USED\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_normalize_nulls_unparseable_dates() -> Result<()> {
        let df = sample_frame()?;
        let schema = schema_for(&df)?;
        let normalized = schema.normalize_frame(&df, "%m/%d/%Y")?;

        let doj = normalized.column(columns::DOJ)?;
        assert_eq!(doj.dtype(), &DataType::Date);
        // "not a date" is stored the same way as a missing value
        assert_eq!(doj.null_count(), 1);
        assert_eq!(normalized.column(columns::CURRENT_DATE)?.null_count(), 1);

        let first = doj.as_materialized_series().date()?.as_date_iter().next().flatten();
        assert_eq!(first, NaiveDate::from_ymd_opt(2014, 4, 20));
        Ok(())
    }

    #[test]
    fn test_normalize_keeps_schema_order_and_drops_extras() -> Result<()> {
        let mut df = sample_frame()?;
        df.with_column(Series::new("EXTRA".into(), [1i64, 2]))?;
        let schema = schema_for(&df)?;
        let normalized = schema.normalize_frame(&df, "%m/%d/%Y")?;

        let names: Vec<&str> = normalized
            .get_column_names()
            .into_iter()
            .map(PlSmallStr::as_str)
            .collect();
        assert_eq!(names, columns::ALL.to_vec());
        Ok(())
    }

    #[test]
    fn test_normalize_rejects_missing_salary() -> Result<()> {
        let df = sample_frame()?;
        let schema = schema_for(&df)?;
        let mut broken = df.clone();
        broken.with_column(Series::new(
            columns::SALARY.into(),
            [Some(120_000.0), None],
        ))?;

        let err = schema
            .normalize_frame(&broken, "%m/%d/%Y")
            .expect_err("null salary must be rejected");
        assert_eq!(
            err.downcast_ref::<LedgerError>(),
            Some(&LedgerError::MissingValue {
                column: columns::SALARY.to_owned(),
                row: 1
            })
        );
        Ok(())
    }

    #[test]
    fn test_normalize_rejects_value_outside_domain() -> Result<()> {
        let df = sample_frame()?;
        let schema = schema_for(&df)?;
        let mut other = df.clone();
        other.with_column(Series::new(columns::UNIT.into(), ["Finance", "Legal"]))?;

        let err = schema
            .normalize_frame(&other, "%m/%d/%Y")
            .expect_err("unknown unit must be rejected");
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::OutsideDomain { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_normalize_reports_missing_column() -> Result<()> {
        let df = sample_frame()?;
        let schema = schema_for(&df)?;
        let trimmed = df.drop(columns::RATINGS)?;

        let err = schema
            .normalize_frame(&trimmed, "%m/%d/%Y")
            .expect_err("missing column");
        assert_eq!(
            err.downcast_ref::<LedgerError>(),
            Some(&LedgerError::MissingColumn {
                column: columns::RATINGS.to_owned()
            })
        );
        Ok(())
    }
}
