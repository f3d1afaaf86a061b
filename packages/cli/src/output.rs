//! Rendering of aggregates, comparisons and reports as tables, JSON or CSV.

use std::io::Write;

use clap::ValueEnum;
use crash_stats_analytics_models::{
    Aggregate, Comparison, Dimension, Ratio, ReportOutput, ReportResult,
};
use crash_stats_store::{InvariantViolation, JoinReport};
use serde::Serialize;

type OutputResult = Result<(), Box<dyn std::error::Error>>;

/// How results are written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned plain-text table
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
    /// CSV with a header row
    Csv,
}

/// What the `summary` command reports about a loaded dataset.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary<'a> {
    /// Directory the facets were read from.
    pub data_dir: String,
    /// Joined accidents in the store.
    pub accidents: usize,
    /// Join defects.
    pub join_report: &'a JoinReport,
    /// Accidents with victims but no casualty severity.
    pub violations: Vec<InvariantViolation>,
}

const KEY_WIDTH: usize = 28;

fn key_header(dimensions: &[Dimension]) -> String {
    dimensions
        .iter()
        .map(|d| format!("{:<KEY_WIDTH$}", d.name().to_uppercase()))
        .collect()
}

fn key_cells(values: &[impl ToString]) -> String {
    values
        .iter()
        .map(|v| format!("{:<KEY_WIDTH$}", truncate(&v.to_string(), KEY_WIDTH - 1)))
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}

fn csv_ratio(ratio: Ratio) -> String {
    ratio.value().map_or_else(|| "undefined".to_string(), |v| format!("{v:.4}"))
}

/// Writes an aggregate.
///
/// # Errors
///
/// Returns an error if writing or serializing fails.
pub fn write_aggregate(
    out: &mut impl Write,
    aggregate: &Aggregate,
    format: OutputFormat,
) -> OutputResult {
    match format {
        OutputFormat::Table => {
            let header = key_header(&aggregate.dimensions);
            writeln!(
                out,
                "{header}{:>8} {:>8} {:>8} {:>8} {:>10} {:>8}",
                "COUNT", "SHARE%", "VICTIMS", "CRASHES", "CASUALTY%", "VIC/ACC"
            )?;
            writeln!(out, "{}", "-".repeat(header.len() + 55))?;
            for row in &aggregate.rows {
                writeln!(
                    out,
                    "{}{:>8} {:>8.2} {:>8} {:>8} {:>10.2} {:>8.2}",
                    key_cells(row.key.values()),
                    row.stats.count,
                    row.share,
                    row.stats.victims,
                    row.stats.crashes,
                    row.casualty_rate,
                    row.victims_per_accident,
                )?;
            }
            writeln!(
                out,
                "{} accidents, {} groups ({} below minimum count suppressed)",
                aggregate.total.count, aggregate.groups, aggregate.suppressed
            )?;
        }
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(aggregate)?)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            let mut header: Vec<&str> = aggregate.dimensions.iter().map(|d| d.name()).collect();
            header.extend([
                "count",
                "share",
                "victims",
                "crashes",
                "casualties",
                "casualty_rate",
                "victims_per_accident",
            ]);
            writer.write_record(&header)?;
            for row in &aggregate.rows {
                let mut record: Vec<String> =
                    row.key.values().iter().map(ToString::to_string).collect();
                record.extend([
                    row.stats.count.to_string(),
                    csv_ratio(row.share),
                    row.stats.victims.to_string(),
                    row.stats.crashes.to_string(),
                    row.stats.casualties.to_string(),
                    csv_ratio(row.casualty_rate),
                    csv_ratio(row.victims_per_accident),
                ]);
                writer.write_record(&record)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

/// Writes a comparison.
///
/// # Errors
///
/// Returns an error if writing or serializing fails.
pub fn write_comparison(
    out: &mut impl Write,
    comparison: &Comparison,
    format: OutputFormat,
) -> OutputResult {
    match format {
        OutputFormat::Table => {
            let header = key_header(&comparison.dimensions);
            writeln!(
                out,
                "{header}{:>8} {:>8} {:>8} {:>8} {:>9} {:>10}",
                "SUB", "BASE", "SUB%", "BASE%", "POINTS", "CHANGE%"
            )?;
            writeln!(out, "{}", "-".repeat(header.len() + 56))?;
            for row in &comparison.rows {
                writeln!(
                    out,
                    "{}{:>8} {:>8} {:>8.2} {:>8.2} {:>9.2} {:>10.1}",
                    key_cells(row.key.values()),
                    row.subgroup_count,
                    row.baseline_count,
                    row.subgroup_share,
                    row.baseline_share,
                    row.point_difference,
                    row.percent_difference,
                )?;
            }
            writeln!(
                out,
                "subgroup: {} accidents, baseline: {} accidents",
                comparison.subgroup_total, comparison.baseline_total
            )?;
        }
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(comparison)?)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            let mut header: Vec<&str> = comparison.dimensions.iter().map(|d| d.name()).collect();
            header.extend([
                "subgroup_count",
                "baseline_count",
                "subgroup_share",
                "baseline_share",
                "point_difference",
                "percent_difference",
            ]);
            writer.write_record(&header)?;
            for row in &comparison.rows {
                let mut record: Vec<String> =
                    row.key.values().iter().map(ToString::to_string).collect();
                record.extend([
                    row.subgroup_count.to_string(),
                    row.baseline_count.to_string(),
                    csv_ratio(row.subgroup_share),
                    csv_ratio(row.baseline_share),
                    csv_ratio(row.point_difference),
                    csv_ratio(row.percent_difference),
                ]);
                writer.write_record(&record)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

/// Writes a report result. In table and CSV form the title and question
/// precede the output.
///
/// # Errors
///
/// Returns an error if writing or serializing fails.
pub fn write_report(
    out: &mut impl Write,
    result: &ReportResult,
    format: OutputFormat,
) -> OutputResult {
    if format == OutputFormat::Json {
        writeln!(out, "{}", serde_json::to_string_pretty(result)?)?;
        return Ok(());
    }

    if format == OutputFormat::Table {
        writeln!(out, "== {} ==", result.title)?;
        writeln!(out, "{}", result.question)?;
        writeln!(out)?;
    } else {
        writeln!(out, "# {}: {}", result.id, result.question)?;
    }

    match &result.output {
        ReportOutput::Aggregate(aggregate) => write_aggregate(out, aggregate, format)?,
        ReportOutput::Comparison(comparison) => write_comparison(out, comparison, format)?,
    }
    writeln!(out)?;
    Ok(())
}

/// Writes several report results. JSON output is a single array.
///
/// # Errors
///
/// Returns an error if writing or serializing fails.
pub fn write_reports(
    out: &mut impl Write,
    results: &[ReportResult],
    format: OutputFormat,
) -> OutputResult {
    if format == OutputFormat::Json {
        writeln!(out, "{}", serde_json::to_string_pretty(results)?)?;
        return Ok(());
    }
    for result in results {
        write_report(out, result, format)?;
    }
    Ok(())
}

/// Writes the dataset summary.
///
/// # Errors
///
/// Returns an error if writing or serializing fails.
pub fn write_summary(
    out: &mut impl Write,
    summary: &DatasetSummary<'_>,
    format: OutputFormat,
) -> OutputResult {
    if format == OutputFormat::Json {
        writeln!(out, "{}", serde_json::to_string_pretty(summary)?)?;
        return Ok(());
    }

    let report = summary.join_report;
    let duplicates: usize = report.duplicates.values().map(Vec::len).sum();
    let malformed: usize = report.malformed.values().map(Vec::len).sum();

    if format == OutputFormat::Csv {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(["metric", "value"])?;
        writer.write_record(["accidents", &summary.accidents.to_string()])?;
        writer.write_record(["excluded", &report.excluded_count().to_string()])?;
        writer.write_record(["duplicate_rows", &duplicates.to_string()])?;
        writer.write_record(["malformed_rows", &malformed.to_string()])?;
        writer.write_record(["violations", &summary.violations.len().to_string()])?;
        writer.flush()?;
        return Ok(());
    }

    writeln!(out, "{:<24} {}", "Data directory", summary.data_dir)?;
    writeln!(out, "{:<24} {}", "Joined accidents", summary.accidents)?;
    writeln!(out, "{:<24} {}", "Excluded (incomplete)", report.excluded_count())?;
    writeln!(out, "{:<24} {duplicates}", "Duplicate rows")?;
    writeln!(out, "{:<24} {malformed}", "Malformed rows")?;
    for (facet, rows) in &report.malformed {
        for row in rows.iter().take(5) {
            writeln!(out, "  {facet} line {}: {}", row.line, row.message)?;
        }
    }
    if !report.missing.is_empty() {
        writeln!(out)?;
        writeln!(out, "{:<12} MISSING FROM", "ID")?;
        writeln!(out, "{}", "-".repeat(40))?;
        for (id, facets) in report.missing.iter().take(20) {
            let names: Vec<String> = facets.iter().map(ToString::to_string).collect();
            writeln!(out, "{id:<12} {}", names.join(", "))?;
        }
        if report.missing.len() > 20 {
            writeln!(out, "... and {} more", report.missing.len() - 20)?;
        }
    }
    writeln!(out)?;
    if summary.violations.is_empty() {
        writeln!(out, "Every accident with victims is marked as a casualty crash.")?;
    } else {
        writeln!(
            out,
            "{} accident(s) record victims without a casualty severity:",
            summary.violations.len()
        )?;
        for violation in summary.violations.iter().take(20) {
            writeln!(
                out,
                "  {:<12} victims={} severity={}",
                violation.id, violation.total_victims, violation.severity
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crash_stats_accident_models::Facet;
    use crash_stats_analytics_models::{AggregateRow, ComparisonRow, GroupKey, GroupStats, KeyValue};
    use crash_stats_store::MalformedRow;

    use super::*;

    fn sample_aggregate() -> Aggregate {
        let stats = GroupStats {
            count: 3,
            victims: 4,
            crashes: 4,
            casualties: 2,
        };
        Aggregate {
            dimensions: vec![Dimension::Neighborhood],
            total: stats,
            groups: 1,
            suppressed: 0,
            rows: vec![AggregateRow {
                key: GroupKey(vec![KeyValue::Text("Downtown".to_string())]),
                stats,
                share: Ratio::Defined(100.0),
                victims_per_accident: stats.victims_per_accident(),
                casualty_rate: stats.casualty_rate(),
            }],
        }
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> OutputResult) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn aggregate_table_has_header_and_rows() {
        let text = render(|out| write_aggregate(out, &sample_aggregate(), OutputFormat::Table));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("NEIGHBORHOOD"));
        assert!(lines[2].starts_with("Downtown"));
        assert!(lines[2].contains("100.00"));
        assert!(lines[2].contains("66.67"));
        assert!(lines[3].starts_with("3 accidents"));
    }

    #[test]
    fn aggregate_csv_round_trips_through_reader() {
        let text = render(|out| write_aggregate(out, &sample_aggregate(), OutputFormat::Csv));
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "neighborhood");
        assert_eq!(&headers[1], "count");
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[0], "Downtown");
        assert_eq!(&record[1], "3");
        assert_eq!(&record[2], "100.0000");
    }

    #[test]
    fn undefined_ratios_render_as_sentinel() {
        let comparison = Comparison {
            dimensions: vec![Dimension::Neighborhood],
            subgroup_total: 1,
            baseline_total: 0,
            rows: vec![ComparisonRow {
                key: GroupKey(vec![KeyValue::Text("Hillcrest".to_string())]),
                subgroup_count: 1,
                baseline_count: 0,
                subgroup_share: Ratio::Defined(100.0),
                baseline_share: Ratio::Undefined,
                point_difference: Ratio::Undefined,
                percent_difference: Ratio::Undefined,
            }],
        };

        let table = render(|out| write_comparison(out, &comparison, OutputFormat::Table));
        assert!(table.contains("undefined"));

        let csv = render(|out| write_comparison(out, &comparison, OutputFormat::Csv));
        assert!(csv.lines().nth(1).unwrap().ends_with("undefined,undefined,undefined"));

        let json = render(|out| write_comparison(out, &comparison, OutputFormat::Json));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["rows"][0]["pointDifference"], "undefined");
        assert_eq!(value["rows"][0]["subgroupShare"], 100.0);
    }

    #[test]
    fn summary_lists_malformed_rows() {
        let mut report = JoinReport::default();
        report.malformed.insert(
            Facet::Location,
            vec![MalformedRow {
                line: 7,
                message: "accident 6 has no neighborhood label".to_string(),
            }],
        );
        report.missing.insert(6, vec![Facet::Location]);
        let summary = DatasetSummary {
            data_dir: "fixtures".to_string(),
            accidents: 5,
            join_report: &report,
            violations: Vec::new(),
        };

        let table = render(|out| write_summary(out, &summary, OutputFormat::Table));
        assert!(table.contains("Malformed rows"));
        assert!(table.contains("line 7: accident 6 has no neighborhood label"));

        let csv = render(|out| write_summary(out, &summary, OutputFormat::Csv));
        assert!(csv.lines().any(|l| l == "malformed_rows,1"));

        let json = render(|out| write_summary(out, &summary, OutputFormat::Json));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["joinReport"]["malformed"]["location"][0]["line"], 7);
    }

    #[test]
    fn long_keys_are_truncated() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long street name", 10), "a very lo~");
    }
}
