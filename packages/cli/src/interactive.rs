//! Interactive menu for exploring the accident dataset.
//!
//! Provides a menu-driven interface using `dialoguer` for running reports
//! and ad-hoc queries without memorizing CLI flags. Results are printed as
//! tables.

use std::path::Path;

use crash_stats_analytics::reports::answer_report;
use crash_stats_analytics::{aggregate, compare_subgroup, parse_filter};
use crash_stats_analytics_models::{
    AggregateQuery, CompareQuery, Dimension, Filter, ReportDefinition, RowOrder,
};
use crash_stats_cli_utils::MultiProgress;
use crash_stats_store::RecordStore;
use dialoguer::{Confirm, Input, MultiSelect, Select};

use crate::output::{self, DatasetSummary, OutputFormat};

type MenuResult = Result<(), Box<dyn std::error::Error>>;

/// Top-level actions available in the interactive menu.
enum Action {
    RunReport,
    RunAllReports,
    Group,
    Compare,
    Summary,
    Quit,
}

impl Action {
    const ALL: &[Self] = &[
        Self::RunReport,
        Self::RunAllReports,
        Self::Group,
        Self::Compare,
        Self::Summary,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::RunReport => "Run a report",
            Self::RunAllReports => "Run every report",
            Self::Group => "Group accidents by dimensions",
            Self::Compare => "Compare a subgroup against the city",
            Self::Summary => "Dataset summary",
            Self::Quit => "Quit",
        }
    }
}

/// Loads the dataset, then loops over the menu until the user quits.
///
/// # Errors
///
/// Returns an error if the dataset cannot be loaded or a prompt fails.
/// Query errors are logged and the menu is shown again.
pub fn run(multi: &MultiProgress, data_dir: &Path, reports: &[ReportDefinition]) -> MenuResult {
    println!("Crash Stats");
    println!();

    let store = crate::load_store(multi, data_dir)?;
    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    loop {
        let idx = Select::new()
            .with_prompt("What would you like to do?")
            .items(&labels)
            .default(0)
            .interact()?;

        let result = match Action::ALL[idx] {
            Action::RunReport => run_report(&store, reports),
            Action::RunAllReports => run_all_reports(&store, reports),
            Action::Group => group(&store),
            Action::Compare => compare(&store),
            Action::Summary => summary(&store, data_dir),
            Action::Quit => return Ok(()),
        };

        if let Err(e) = result {
            log::error!("{e}");
        }
        println!();
    }
}

fn run_report(store: &RecordStore, reports: &[ReportDefinition]) -> MenuResult {
    let labels: Vec<String> = reports
        .iter()
        .map(|r| format!("{:<34} {}", r.id, r.title))
        .collect();

    let idx = Select::new()
        .with_prompt("Which report?")
        .items(&labels)
        .default(0)
        .max_length(20)
        .interact()?;

    let result = answer_report(store, &reports[idx])?;
    output::write_report(&mut std::io::stdout().lock(), &result, OutputFormat::Table)
}

fn run_all_reports(store: &RecordStore, reports: &[ReportDefinition]) -> MenuResult {
    let mut out = std::io::stdout().lock();
    for report in reports {
        let result = answer_report(store, report)?;
        output::write_report(&mut out, &result, OutputFormat::Table)?;
    }
    Ok(())
}

/// Prompts for one or more dimensions, in selection order.
fn select_dimensions(prompt: &str) -> Result<Vec<Dimension>, Box<dyn std::error::Error>> {
    let dimensions = Dimension::all();
    let labels: Vec<&str> = dimensions.iter().map(|d| d.name()).collect();

    let selected = MultiSelect::new()
        .with_prompt(prompt)
        .items(&labels)
        .max_length(20)
        .interact()?;

    if selected.is_empty() {
        return Err("no dimensions selected".into());
    }
    Ok(selected.into_iter().map(|i| dimensions[i]).collect())
}

/// Prompts for a filter expression; empty input means no filter.
fn prompt_filter(prompt: &str) -> Result<Option<Filter>, Box<dyn std::error::Error>> {
    let expr: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    if expr.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(parse_filter(&expr)?))
}

fn prompt_optional<T: std::str::FromStr>(
    prompt: &str,
) -> Result<Option<T>, Box<dyn std::error::Error>> {
    let raw: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| format!("'{raw}' is not a valid number").into())
}

fn natural_order(prompt: &str) -> Result<RowOrder, Box<dyn std::error::Error>> {
    let natural = Confirm::new().with_prompt(prompt).default(false).interact()?;
    Ok(if natural { RowOrder::Key } else { RowOrder::Ranked })
}

fn group(store: &RecordStore) -> MenuResult {
    let dimensions = select_dimensions("Group by (space=toggle, enter=confirm)")?;
    let filter = prompt_filter("Filter (e.g. cyclist,day=Saturday; empty for none)")?;
    let min_count = prompt_optional::<u64>("Minimum group size (empty for none)")?;
    let limit = prompt_optional::<usize>("Row limit (empty for no limit)")?;
    let order = natural_order("Order by key instead of by count?")?;

    let query = AggregateQuery {
        dimensions,
        filter,
        min_count,
        limit,
        order,
    };
    let result = aggregate(store, &query)?;
    output::write_aggregate(&mut std::io::stdout().lock(), &result, OutputFormat::Table)
}

fn compare(store: &RecordStore) -> MenuResult {
    let dimensions = select_dimensions("Compare distributions by (space=toggle, enter=confirm)")?;
    let Some(subgroup) = prompt_filter("Subgroup filter (e.g. neighborhood=Downtown)")? else {
        return Err("a subgroup filter is required".into());
    };
    let baseline = prompt_filter("Baseline filter (empty for every accident)")?;
    let order = natural_order("Order by key instead of by size of the difference?")?;

    let query = CompareQuery {
        dimensions,
        subgroup,
        baseline,
        limit: None,
        order,
    };
    let result = compare_subgroup(store, &query)?;
    output::write_comparison(&mut std::io::stdout().lock(), &result, OutputFormat::Table)
}

fn summary(store: &RecordStore, data_dir: &Path) -> MenuResult {
    let summary = DatasetSummary {
        data_dir: data_dir.display().to_string(),
        accidents: store.len(),
        join_report: store.join_report(),
        violations: store.verify(),
    };
    output::write_summary(&mut std::io::stdout().lock(), &summary, OutputFormat::Table)
}
