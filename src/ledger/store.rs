use super::record::{SalaryRecord, StoredRecord};
use super::schema::{RecordSchema, TABLE_NAME, quote_ident};
use anyhow::{Context as _, Result};
use polars::prelude::{Column, DataFrame, NamedFrom as _, Series};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as _, QueryBuilder, Row as _, Sqlite, SqlitePool, TypeInfo as _, ValueRef as _};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    Created,
    AlreadyPresent,
}

/// The SQLite file holding the `salaries` table.
pub struct SalaryStore {
    pool: SqlitePool,
}

impl SalaryStore {
    /// Opens (creating if absent) the database file. A single connection is
    /// kept, since the pipeline is the only writer.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or created
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open SQLite database: {}", path.display()))?;
        tracing::debug!("Opened store at {}", path.display());
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// # Errors
    ///
    /// Returns error if `sqlite_master` cannot be queried
    pub async fn table_exists(&self) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(TABLE_NAME)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Creates the table and its categorical constraints unless it already
    /// exists. An existing table is left untouched, whatever its columns.
    ///
    /// # Errors
    ///
    /// Returns error if the `CREATE TABLE` statement fails
    pub async fn ensure_schema(&self, schema: &RecordSchema) -> Result<SchemaStatus> {
        if self.table_exists().await? {
            tracing::info!("Table '{TABLE_NAME}' already present");
            return Ok(SchemaStatus::AlreadyPresent);
        }

        sqlx::query(&schema.create_table_sql())
            .execute(&self.pool)
            .await
            .context(format!("Failed to create table '{TABLE_NAME}'"))?;
        tracing::info!("Created table '{TABLE_NAME}'");
        Ok(SchemaStatus::Created)
    }

    /// Inserts every record as a new row, `batch_size` rows per statement,
    /// inside one transaction. Existing rows are not consulted, so appending
    /// the same records twice stores them twice.
    ///
    /// # Errors
    ///
    /// Returns error if an insert violates a table constraint or the
    /// transaction cannot be committed
    pub async fn append_all(
        &self,
        schema: &RecordSchema,
        records: &[SalaryRecord],
        batch_size: usize,
    ) -> Result<u64> {
        let insert_prefix = format!(
            "INSERT INTO {} ({}) ",
            quote_ident(schema.table()),
            schema.column_list()
        );

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for chunk in records.chunks(batch_size.max(1)) {
            let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(&insert_prefix);
            builder.push_values(chunk, |mut row, r| {
                row.push_bind(r.first_name.clone())
                    .push_bind(r.last_name.clone())
                    .push_bind(r.sex.clone())
                    .push_bind(r.date_of_joining)
                    .push_bind(r.current_date)
                    .push_bind(r.designation.clone())
                    .push_bind(r.age)
                    .push_bind(r.salary)
                    .push_bind(r.unit.clone())
                    .push_bind(r.leaves_used)
                    .push_bind(r.leaves_remaining)
                    .push_bind(r.ratings)
                    .push_bind(r.past_exp);
            });
            inserted += builder
                .build()
                .execute(&mut *tx)
                .await
                .context("Failed to insert salary batch")?
                .rows_affected();
        }
        tx.commit().await.context("Failed to commit inserted rows")?;

        tracing::info!(inserted, "Appended rows to '{TABLE_NAME}'");
        Ok(inserted)
    }

    /// # Errors
    ///
    /// Returns error if the table does not exist
    pub async fn row_count(&self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(TABLE_NAME));
        let count = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// All stored rows in insertion order.
    ///
    /// # Errors
    ///
    /// Returns error if the table does not exist or a row cannot be decoded
    pub async fn fetch_records(&self) -> Result<Vec<StoredRecord>> {
        let sql = format!(
            "SELECT * FROM {} ORDER BY {}",
            quote_ident(TABLE_NAME),
            quote_ident("id")
        );
        let records = sqlx::query_as::<_, StoredRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("Failed to read stored salary records")?;
        Ok(records)
    }

    /// Runs `sql` and materializes the result set as a `DataFrame`.
    ///
    /// Column types follow the SQLite values returned: all-integer columns
    /// become `i64`, numeric columns with any REAL become `f64`, anything
    /// else becomes text. A query without rows yields an empty frame.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails or a value cannot be decoded
    pub async fn read_sql_frame(&self, sql: &str) -> Result<DataFrame> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .context("Failed to run query for materialization")?;

        let Some(first) = rows.first() else {
            return Ok(DataFrame::empty());
        };

        let mut frame_columns = Vec::with_capacity(first.columns().len());
        for (idx, column) in first.columns().iter().enumerate() {
            let cells = rows
                .iter()
                .map(|row| read_cell(row, idx))
                .collect::<Result<Vec<_>>>()?;
            frame_columns.push(cells_to_column(column.name(), cells));
        }

        DataFrame::new(frame_columns).context("Failed to assemble query result frame")
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

fn read_cell(row: &SqliteRow, idx: usize) -> Result<Cell> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Cell::Null);
    }
    let cell = match raw.type_info().name() {
        "INTEGER" => Cell::Integer(row.try_get(idx)?),
        "REAL" => Cell::Real(row.try_get(idx)?),
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get(idx)?;
            Cell::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => Cell::Text(row.try_get(idx)?),
    };
    Ok(cell)
}

fn cells_to_column(name: &str, cells: Vec<Cell>) -> Column {
    let has_text = cells.iter().any(|c| matches!(c, Cell::Text(_)));
    let has_real = cells.iter().any(|c| matches!(c, Cell::Real(_)));

    let series = if has_text {
        let values: Vec<Option<String>> = cells
            .into_iter()
            .map(|c| match c {
                Cell::Null => None,
                Cell::Integer(v) => Some(v.to_string()),
                Cell::Real(v) => Some(v.to_string()),
                Cell::Text(v) => Some(v),
            })
            .collect();
        Series::new(name.into(), values)
    } else if has_real {
        let values: Vec<Option<f64>> = cells
            .into_iter()
            .map(|c| match c {
                Cell::Integer(v) => Some(v as f64),
                Cell::Real(v) => Some(v),
                Cell::Null | Cell::Text(_) => None,
            })
            .collect();
        Series::new(name.into(), values)
    } else {
        let values: Vec<Option<i64>> = cells
            .into_iter()
            .map(|c| match c {
                Cell::Integer(v) => Some(v),
                _ => None,
            })
            .collect();
        Series::new(name.into(), values)
    };
    Column::from(series)
}
