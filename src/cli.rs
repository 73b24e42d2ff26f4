use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use polars::prelude::DataFrame;
use salary_ledger::config::LedgerConfig;
use salary_ledger::ledger::domain::DomainSet;
use salary_ledger::ledger::loader::{column_overview, describe_numeric};
use salary_ledger::ledger::pipeline;
use salary_ledger::ledger::report::{AggregationPath, AggregationReport, render_lines};
use salary_ledger::ledger::schema::TABLE_NAME;
use salary_ledger::ledger::store::{SalaryStore, SchemaStatus};
use salary_ledger::utils::{fit_width, fmt_opt};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "salary-ledger",
    about = "Load a salary CSV into SQLite and report monthly salary per designation"
)]
pub struct Cli {
    /// Path to a JSON configuration file
    #[arg(long, global = true, env = "SALARY_LEDGER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load the CSV, persist every row and print the aggregation (default)
    Run {
        /// CSV to load. Defaults to the configured input path.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// SQLite file to append to. Created if absent.
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Skip the data preview
        #[arg(long)]
        no_preview: bool,
    },
    /// Load the CSV and show the preview and inferred domains without writing anything
    Inspect {
        /// CSV to load. Defaults to the configured input path.
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Aggregate an existing database
    Report {
        /// SQLite file to read. Defaults to the configured database path.
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Only print one aggregation path. All three are printed by default.
        #[arg(long, value_enum)]
        path: Option<AggregationPath>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Self::Run {
            input: None,
            database: None,
            no_preview: false,
        }
    }
}

pub async fn run_command(command: Commands, mut config: LedgerConfig) -> Result<()> {
    match command {
        Commands::Run {
            input,
            database,
            no_preview,
        } => {
            if let Some(input) = input {
                config.input_path = input;
            }
            if let Some(database) = database {
                config.database_path = database;
            }
            handle_run(&config, !no_preview).await
        }
        Commands::Inspect { input } => {
            if let Some(input) = input {
                config.input_path = input;
            }
            handle_inspect(&config)
        }
        Commands::Report { database, path } => {
            if let Some(database) = database {
                config.database_path = database;
            }
            handle_report(&config, path).await
        }
    }
}

async fn handle_run(config: &LedgerConfig, preview: bool) -> Result<()> {
    println!("Loading {}...", config.input_path.display());
    let df = pipeline::load(config).context("Failed to load salary CSV")?;
    println!("Loaded {} rows, {} columns.", df.height(), df.width());
    if preview {
        print_preview(&df, config.preview_rows)?;
    }

    let domains = pipeline::infer_domains(&df)?;
    print_domains(&domains);
    let schema = pipeline::build_schema(&domains);
    let prepared = pipeline::prepare_records(&df, &schema, &config.date_format)?;
    if preview {
        println!("\nNormalized table:");
        println!("{}", prepared.frame.head(Some(config.preview_rows)));
    }

    println!("\nOpening {}...", config.database_path.display());
    let (store, status) = pipeline::open_store(&config.database_path, &schema).await?;
    match status {
        SchemaStatus::Created => println!("Created table '{TABLE_NAME}'."),
        SchemaStatus::AlreadyPresent => {
            println!("Table '{TABLE_NAME}' already present, appending.");
        }
    }

    let persisted = pipeline::persist(
        &store,
        &schema,
        &prepared.records,
        config.insert_batch_size,
    )
    .await?;
    println!(
        "Inserted {} rows ({} rows in table).",
        persisted.inserted, persisted.total_rows
    );

    let report = pipeline::aggregate(&store).await?;
    store.close().await;
    print_report(&report, &AggregationPath::ALL)
}

fn handle_inspect(config: &LedgerConfig) -> Result<()> {
    let df = pipeline::load(config).context("Failed to load salary CSV")?;
    println!(
        "{}: {} rows, {} columns.",
        config.input_path.display(),
        df.height(),
        df.width()
    );
    print_preview(&df, config.preview_rows)?;
    print_domains(&pipeline::infer_domains(&df)?);
    Ok(())
}

async fn handle_report(config: &LedgerConfig, path: Option<AggregationPath>) -> Result<()> {
    let store = SalaryStore::open(&config.database_path).await?;
    if !store.table_exists().await? {
        store.close().await;
        anyhow::bail!(
            "No '{TABLE_NAME}' table in {}. Run the pipeline first.",
            config.database_path.display()
        );
    }

    let report = AggregationReport::collect(&store).await?;
    store.close().await;
    match path {
        Some(path) => print_report(&report, &[path]),
        None => print_report(&report, &AggregationPath::ALL),
    }
}

fn print_preview(df: &DataFrame, rows: usize) -> Result<()> {
    println!("\nFirst {rows} rows:");
    println!("{}", df.head(Some(rows)));

    println!("\nColumns:");
    for col in column_overview(df) {
        println!(
            "  {} {:>8} non-null  {}",
            fit_width(&col.name, 18),
            col.non_null,
            col.dtype
        );
    }

    let summaries = describe_numeric(df)?;
    if summaries.is_empty() {
        return Ok(());
    }
    println!("\nNumeric summary:");
    println!(
        "  {} {:>8} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
        fit_width("column", 18),
        "count",
        "mean",
        "std",
        "min",
        "25%",
        "50%",
        "75%",
        "max"
    );
    for s in summaries {
        println!(
            "  {} {:>8} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
            fit_width(&s.column, 18),
            s.count,
            fmt_opt(s.mean, 2),
            fmt_opt(s.std, 2),
            fmt_opt(s.min, 2),
            fmt_opt(s.q25, 2),
            fmt_opt(s.median, 2),
            fmt_opt(s.q75, 2),
            fmt_opt(s.max, 2)
        );
    }
    Ok(())
}

fn print_domains(domains: &DomainSet) {
    println!("\nInferred domains:");
    for domain in domains.iter() {
        let members: Vec<String> = domain
            .members()
            .iter()
            .map(|m| format!("{}={}", m.label, m.value))
            .collect();
        println!("  {}: {}", domain.column(), members.join(", "));
        for c in domain.collisions() {
            println!(
                "    warning: '{}' and '{}' share label {}, '{}' kept",
                c.shadowed, c.kept, c.label, c.kept
            );
        }
    }
}

fn print_report(report: &AggregationReport, paths: &[AggregationPath]) -> Result<()> {
    for path in paths {
        println!("\nMonthly salary by designation ({path}):");
        match path {
            AggregationPath::Direct => println!("{}", render_lines(&report.direct)),
            AggregationPath::Materialized => println!("{}", report.materialized),
            AggregationPath::Composed => println!("{}", render_lines(&report.composed)),
        }
    }

    report.verify_consistency()?;
    println!("\nAll aggregation paths agree.");
    Ok(())
}
