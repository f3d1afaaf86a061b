//! Report catalogue: analyst questions loaded from TOML.
//!
//! Each `.toml` file in `packages/analytics/reports/` is baked into the
//! binary at compile time via [`include_str!`]. Adding a report is a matter
//! of appending a `[[report]]` table to one of those files (or a new file
//! listed below). Extra catalogues can be read at runtime with
//! [`load_reports`].

use std::collections::BTreeSet;
use std::path::Path;

use crash_stats_analytics_models::{
    ReportCatalogue, ReportDefinition, ReportOutput, ReportQuery, ReportResult,
};
use crash_stats_store::RecordStore;

use crate::AnalyticsError;
use crate::aggregate::{aggregate, check_dimensions};
use crate::compare::compare_subgroup;
use crate::filter::Predicate;

/// TOML catalogues embedded at compile time.
const CATALOGUE_TOMLS: &[(&str, &str)] = &[
    ("locations", include_str!("../reports/locations.toml")),
    ("time", include_str!("../reports/time.toml")),
    ("involvement", include_str!("../reports/involvement.toml")),
    ("severity", include_str!("../reports/severity.toml")),
    ("comparisons", include_str!("../reports/comparisons.toml")),
];

/// Total number of built-in reports (used in tests).
#[cfg(test)]
const EXPECTED_REPORT_COUNT: usize = 18;

/// Parses one catalogue file.
///
/// # Errors
///
/// Returns [`AnalyticsError::Catalogue`] if the TOML is malformed.
pub fn parse_catalogue(name: &str, toml: &str) -> Result<Vec<ReportDefinition>, AnalyticsError> {
    let catalogue: ReportCatalogue =
        toml::de::from_str(toml).map_err(|source| AnalyticsError::Catalogue {
            name: name.to_string(),
            source,
        })?;
    Ok(catalogue.reports)
}

/// Returns every built-in report, in catalogue order.
///
/// # Panics
///
/// Panics if any embedded catalogue is malformed (the catalogues are
/// embedded, so this is caught by the tests below).
#[must_use]
pub fn all_reports() -> Vec<ReportDefinition> {
    CATALOGUE_TOMLS
        .iter()
        .flat_map(|(name, toml)| {
            parse_catalogue(name, toml)
                .unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Reads and validates a catalogue file from disk.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the file cannot be read, is malformed, or
/// contains an invalid report.
pub fn load_reports(path: &Path) -> Result<Vec<ReportDefinition>, AnalyticsError> {
    let contents = std::fs::read_to_string(path)?;
    let reports = parse_catalogue(&path.display().to_string(), &contents)?;
    validate_reports(&reports)?;
    log::info!("Loaded {} report(s) from {}", reports.len(), path.display());
    Ok(reports)
}

/// Checks that report ids are unique and every query is well-formed.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidQuery`] naming the first offending
/// report.
pub fn validate_reports(reports: &[ReportDefinition]) -> Result<(), AnalyticsError> {
    let mut ids = BTreeSet::new();
    for report in reports {
        if !ids.insert(report.id.as_str()) {
            return Err(AnalyticsError::InvalidQuery {
                message: format!("duplicate report id '{}'", report.id),
            });
        }
        validate_query(&report.query).map_err(|e| AnalyticsError::InvalidQuery {
            message: format!("report '{}': {e}", report.id),
        })?;
    }
    Ok(())
}

fn validate_query(query: &ReportQuery) -> Result<(), AnalyticsError> {
    match query {
        ReportQuery::Aggregate(query) => {
            check_dimensions(&query.dimensions)?;
            Predicate::compile_optional(query.filter.as_ref())?;
        }
        ReportQuery::Compare(query) => {
            check_dimensions(&query.dimensions)?;
            Predicate::compile(&query.subgroup)?;
            Predicate::compile_optional(query.baseline.as_ref())?;
        }
    }
    Ok(())
}

/// Looks up a report by id (case-insensitive).
///
/// # Errors
///
/// Returns [`AnalyticsError::UnknownReport`] if no report has that id.
pub fn find_report<'a>(
    reports: &'a [ReportDefinition],
    id: &str,
) -> Result<&'a ReportDefinition, AnalyticsError> {
    reports
        .iter()
        .find(|r| r.id.eq_ignore_ascii_case(id.trim()))
        .ok_or_else(|| AnalyticsError::UnknownReport { id: id.to_string() })
}

/// Computes a report's output.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the report's query is invalid.
pub fn run_report(
    store: &RecordStore,
    report: &ReportDefinition,
) -> Result<ReportOutput, AnalyticsError> {
    log::debug!("Running report {}", report.id);
    Ok(match &report.query {
        ReportQuery::Aggregate(query) => ReportOutput::Aggregate(aggregate(store, query)?),
        ReportQuery::Compare(query) => ReportOutput::Comparison(compare_subgroup(store, query)?),
    })
}

/// Computes a report and pairs it with its definition.
///
/// # Errors
///
/// See [`run_report`].
pub fn answer_report(
    store: &RecordStore,
    report: &ReportDefinition,
) -> Result<ReportResult, AnalyticsError> {
    Ok(ReportResult {
        id: report.id.clone(),
        title: report.title.clone(),
        question: report.question.clone(),
        output: run_report(store, report)?,
    })
}

/// Runs every report in order.
///
/// # Errors
///
/// Returns the first report error encountered.
pub fn run_all(
    store: &RecordStore,
    reports: &[ReportDefinition],
) -> Result<Vec<ReportResult>, AnalyticsError> {
    log::info!("Running {} reports", reports.len());
    reports.iter().map(|r| answer_report(store, r)).collect()
}

#[cfg(test)]
mod tests {
    use crash_stats_analytics_models::{Dimension, GroupKey, KeyValue, RowOrder};
    use crash_stats_store::progress::null_progress;

    use super::*;

    fn fixture_store() -> RecordStore {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../store/fixtures/basic");
        RecordStore::load_dir(&dir, &null_progress()).unwrap()
    }

    #[test]
    fn loads_all_reports() {
        assert_eq!(all_reports().len(), EXPECTED_REPORT_COUNT);
    }

    #[test]
    fn built_in_catalogue_is_valid() {
        let reports = all_reports();
        validate_reports(&reports).unwrap();
        for report in &reports {
            assert!(!report.title.is_empty(), "{}: empty title", report.id);
            assert!(!report.question.is_empty(), "{}: empty question", report.id);
        }
    }

    #[test]
    fn every_report_runs_against_fixture() {
        let store = fixture_store();
        let results = run_all(&store, &all_reports()).unwrap();
        assert_eq!(results.len(), EXPECTED_REPORT_COUNT);
    }

    #[test]
    fn cyclist_report_answers_downtown() {
        let store = fixture_store();
        let reports = all_reports();
        let report = find_report(&reports, "Cyclist_Neighborhoods").unwrap();

        let ReportOutput::Aggregate(aggregate) = run_report(&store, report).unwrap() else {
            panic!("expected an aggregate");
        };
        assert_eq!(aggregate.dimensions, vec![Dimension::Neighborhood]);
        let downtown = aggregate
            .get(&GroupKey(vec![KeyValue::Text("Downtown".to_string())]))
            .unwrap();
        assert_eq!(downtown.stats.count, 1);
        assert_eq!(aggregate.total.count, 2);
    }

    #[test]
    fn downtown_comparisons_exclude_downtown_from_baseline() {
        let store = fixture_store();
        let reports = all_reports();
        for id in ["downtown_vs_city_by_day", "downtown_vs_city_by_time_of_day"] {
            let report = find_report(&reports, id).unwrap();
            let ReportOutput::Comparison(comparison) = run_report(&store, report).unwrap() else {
                panic!("expected a comparison");
            };
            assert_eq!(comparison.subgroup_total, 3, "{id}");
            assert_eq!(comparison.baseline_total, 3, "{id}");
        }
    }

    #[test]
    fn unknown_report_is_an_error() {
        assert!(matches!(
            find_report(&all_reports(), "weather"),
            Err(AnalyticsError::UnknownReport { .. })
        ));
    }

    #[test]
    fn runtime_catalogue_is_validated() {
        let toml_str = r#"
            [[report]]
            id = "weekend_cyclists"
            title = "Weekend cyclist accidents"
            question = "Where do cyclists crash on weekends?"

            [report.query]
            type = "aggregate"
            dimensions = ["neighborhood"]
            order = "key"
            filter = { op = "and", filters = [
                { op = "eq", dimension = "cyclist", value = "true" },
                { op = "in", dimension = "day", values = ["Saturday", "Sunday"] },
            ] }
        "#;
        let reports = parse_catalogue("inline", toml_str).unwrap();
        validate_reports(&reports).unwrap();
        let ReportQuery::Aggregate(query) = &reports[0].query else {
            panic!("expected aggregate");
        };
        assert_eq!(query.order, RowOrder::Key);

        let bad = r#"
            [[report]]
            id = "bad"
            title = "Bad"
            question = "?"

            [report.query]
            type = "aggregate"
            dimensions = ["day"]
            filter = { op = "eq", dimension = "day", value = "Funday" }
        "#;
        let reports = parse_catalogue("bad", bad).unwrap();
        assert!(validate_reports(&reports).is_err());

        assert!(matches!(
            parse_catalogue("broken", "[[report]]\nid = 3"),
            Err(AnalyticsError::Catalogue { .. })
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut reports = all_reports();
        reports.push(reports[0].clone());
        assert!(validate_reports(&reports).is_err());
    }
}
