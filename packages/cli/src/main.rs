#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the crash statistics toolchain.
//!
//! Loads the facet dataset into a record store and answers ad-hoc group-by
//! and comparison queries or runs the report catalogue. Without a
//! subcommand it opens an interactive menu.
//!
//! Uses `indicatif-log-bridge` (via [`crash_stats_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod interactive;
mod output;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use crash_stats_analytics::reports::{
    all_reports, answer_report, find_report, load_reports, validate_reports,
};
use crash_stats_analytics::{aggregate, compare_subgroup, parse_filter};
use crash_stats_analytics_models::{
    AggregateQuery, CompareQuery, Dimension, ReportDefinition, ReportQuery, RowOrder,
};
use crash_stats_cli_utils::{IndicatifProgress, MultiProgress};
use crash_stats_store::progress::ProgressCallback;
use crash_stats_store::{RecordStore, StoreError, paths};

use crate::output::{DatasetSummary, OutputFormat};

#[derive(Parser)]
#[command(
    name = "crash_stats",
    about = "Batch statistics over the traffic accident dataset"
)]
struct Cli {
    /// Directory holding the four facet CSV files (overrides `CRASH_STATS_DATA_DIR`)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Extra report catalogue (TOML) loaded after the built-in reports
    #[arg(long, global = true)]
    reports_file: Option<PathBuf>,
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show record counts, join defects and data-quality violations
    Summary,
    /// Group accidents by one or more dimensions
    Group {
        /// Comma-separated grouping dimensions (e.g. `neighborhood,day`)
        #[arg(long, value_delimiter = ',', required = true)]
        by: Vec<Dimension>,
        /// Filter expression (e.g. `cyclist,day=Saturday|Sunday,victims>=1`)
        #[arg(long = "where")]
        filter: Option<String>,
        /// Drop groups with fewer accidents than this
        #[arg(long)]
        min_count: Option<u64>,
        /// Maximum number of rows
        #[arg(long)]
        limit: Option<usize>,
        /// Order rows by key instead of by count
        #[arg(long)]
        natural_order: bool,
    },
    /// Compare a subgroup's distribution against a baseline
    Compare {
        /// Comma-separated dimensions both distributions are grouped by
        #[arg(long, value_delimiter = ',', required = true)]
        by: Vec<Dimension>,
        /// Filter expression selecting the subgroup
        #[arg(long)]
        subgroup: String,
        /// Filter expression selecting the baseline (default: every accident)
        #[arg(long)]
        baseline: Option<String>,
        /// Maximum number of rows
        #[arg(long)]
        limit: Option<usize>,
        /// Order rows by key instead of by size of the difference
        #[arg(long)]
        natural_order: bool,
    },
    /// List the report catalogue
    Reports,
    /// Run one catalogue report, or all of them
    Report {
        /// Report identifier (see `reports`)
        #[arg(required_unless_present = "all")]
        id: Option<String>,
        /// Run every report in catalogue order
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
}

const fn row_order(natural_order: bool) -> RowOrder {
    if natural_order {
        RowOrder::Key
    } else {
        RowOrder::Ranked
    }
}

/// Built-in reports plus any reports from `--reports-file`.
fn catalogue(extra: Option<&Path>) -> Result<Vec<ReportDefinition>, Box<dyn std::error::Error>> {
    let mut reports = all_reports();
    if let Some(path) = extra {
        reports.extend(load_reports(path)?);
        validate_reports(&reports)?;
    }
    Ok(reports)
}

/// Loads the record store behind a progress bar.
pub(crate) fn load_store(multi: &MultiProgress, dir: &Path) -> Result<RecordStore, StoreError> {
    let progress = IndicatifProgress::load_bar(multi, "Loading accident facets");
    let start = Instant::now();
    let store = RecordStore::load_dir(dir, &progress).inspect_err(|_| progress.done(None))?;
    log::debug!("Store loaded in {:.2?}", start.elapsed());
    Ok(store)
}

/// Prints the catalogue as a table.
fn list_reports(out: &mut impl Write, reports: &[ReportDefinition]) -> std::io::Result<()> {
    writeln!(out, "{:<34} {:<10} TITLE", "ID", "TYPE")?;
    writeln!(out, "{}", "-".repeat(90))?;
    for report in reports {
        let kind = match report.query {
            ReportQuery::Aggregate(_) => "aggregate",
            ReportQuery::Compare(_) => "compare",
        };
        writeln!(out, "{:<34} {kind:<10} {}", report.id, report.title)?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crash_stats_cli_utils::init_logger();
    let cli = Cli::parse();

    let data_dir = cli.data_dir.unwrap_or_else(paths::data_dir);
    let reports = catalogue(cli.reports_file.as_deref())?;

    let Some(command) = cli.command else {
        return interactive::run(&multi, &data_dir, &reports);
    };

    let mut out = std::io::stdout().lock();

    match command {
        Commands::Summary => {
            let store = load_store(&multi, &data_dir)?;
            let summary = DatasetSummary {
                data_dir: data_dir.display().to_string(),
                accidents: store.len(),
                join_report: store.join_report(),
                violations: store.verify(),
            };
            output::write_summary(&mut out, &summary, cli.format)?;
        }
        Commands::Group {
            by,
            filter,
            min_count,
            limit,
            natural_order,
        } => {
            let query = AggregateQuery {
                dimensions: by,
                filter: filter.as_deref().map(parse_filter).transpose()?,
                min_count,
                limit,
                order: row_order(natural_order),
            };
            let store = load_store(&multi, &data_dir)?;
            let result = aggregate(&store, &query)?;
            output::write_aggregate(&mut out, &result, cli.format)?;
        }
        Commands::Compare {
            by,
            subgroup,
            baseline,
            limit,
            natural_order,
        } => {
            let query = CompareQuery {
                dimensions: by,
                subgroup: parse_filter(&subgroup)?,
                baseline: baseline.as_deref().map(parse_filter).transpose()?,
                limit,
                order: row_order(natural_order),
            };
            let store = load_store(&multi, &data_dir)?;
            let result = compare_subgroup(&store, &query)?;
            output::write_comparison(&mut out, &result, cli.format)?;
        }
        Commands::Reports => {
            if cli.format == OutputFormat::Json {
                writeln!(out, "{}", serde_json::to_string_pretty(&reports)?)?;
            } else {
                list_reports(&mut out, &reports)?;
            }
        }
        Commands::Report { id, all } => {
            let selected: Vec<&ReportDefinition> = if all {
                reports.iter().collect()
            } else {
                let id = id.unwrap_or_default();
                vec![find_report(&reports, &id)?]
            };

            let store = load_store(&multi, &data_dir)?;
            let progress =
                IndicatifProgress::reports_bar(&multi, "Running reports", selected.len() as u64);
            let mut results = Vec::with_capacity(selected.len());
            for report in selected {
                progress.step(&report.id);
                results.push(answer_report(&store, report)?);
                progress.step_done();
            }
            progress.done(None);

            output::write_reports(&mut out, &results, cli.format)?;
        }
    }

    Ok(())
}
