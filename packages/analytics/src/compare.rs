//! Subgroup-vs-baseline distribution comparison.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crash_stats_analytics_models::{
    Aggregate, AggregateQuery, CompareQuery, Comparison, ComparisonRow, GroupKey, Ratio, RowOrder,
};
use crash_stats_store::RecordStore;

use crate::AnalyticsError;
use crate::aggregate::{aggregate, dimension_list};

/// Compares a subgroup distribution against a baseline distribution.
///
/// Every key present in either distribution gets a row. Shares are taken
/// against each distribution's own total, so both aggregates should be
/// computed without a row limit.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidQuery`] if the two aggregates were
/// grouped by different dimensions.
pub fn compare(
    subgroup: &Aggregate,
    baseline: &Aggregate,
    order: RowOrder,
) -> Result<Comparison, AnalyticsError> {
    if subgroup.dimensions != baseline.dimensions {
        return Err(AnalyticsError::InvalidQuery {
            message: format!(
                "cannot compare a distribution by [{}] with one by [{}]",
                dimension_list(&subgroup.dimensions),
                dimension_list(&baseline.dimensions),
            ),
        });
    }

    let mut counts: BTreeMap<&GroupKey, (u64, u64)> = BTreeMap::new();
    for row in &subgroup.rows {
        counts.entry(&row.key).or_default().0 = row.stats.count;
    }
    for row in &baseline.rows {
        counts.entry(&row.key).or_default().1 = row.stats.count;
    }

    let subgroup_total = subgroup.total.count;
    let baseline_total = baseline.total.count;

    let mut rows: Vec<ComparisonRow> = counts
        .into_iter()
        .map(|(key, (subgroup_count, baseline_count))| {
            let subgroup_share = Ratio::percent(subgroup_count, subgroup_total);
            let baseline_share = Ratio::percent(baseline_count, baseline_total);
            let point_difference = subgroup_share.minus(baseline_share);
            ComparisonRow {
                key: key.clone(),
                subgroup_count,
                baseline_count,
                subgroup_share,
                baseline_share,
                point_difference,
                percent_difference: point_difference.divided_by(baseline_share).scaled(100.0),
            }
        })
        .collect();

    if order == RowOrder::Ranked {
        rows.sort_by(|a, b| {
            by_magnitude(a.point_difference, b.point_difference)
                .then_with(|| a.key.cmp_text(&b.key))
        });
    }

    Ok(Comparison {
        dimensions: subgroup.dimensions.clone(),
        subgroup_total,
        baseline_total,
        rows,
    })
}

/// Descending absolute value; undefined sorts last.
fn by_magnitude(a: Ratio, b: Ratio) -> Ordering {
    match (a.value(), b.value()) {
        (Some(a), Some(b)) => b.abs().total_cmp(&a.abs()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Aggregates the subgroup and the baseline from the store and compares
/// them.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if either filter or the dimensions are
/// invalid.
pub fn compare_subgroup(
    store: &RecordStore,
    query: &CompareQuery,
) -> Result<Comparison, AnalyticsError> {
    let subgroup_query = AggregateQuery::by(&query.dimensions)
        .filtered(query.subgroup.clone())
        .with_order(RowOrder::Key);
    let baseline_query = AggregateQuery {
        filter: query.baseline.clone(),
        ..AggregateQuery::by(&query.dimensions).with_order(RowOrder::Key)
    };

    let subgroup = aggregate(store, &subgroup_query)?;
    let baseline = aggregate(store, &baseline_query)?;

    if subgroup.total.count == 0 {
        log::warn!("Subgroup matched no accidents; every share is undefined");
    }

    log::debug!(
        "Comparing {} subgroup accidents against {} baseline accidents",
        subgroup.total.count,
        baseline.total.count,
    );

    let mut comparison = compare(&subgroup, &baseline, query.order)?;
    if let Some(limit) = query.limit {
        comparison.rows.truncate(limit);
    }
    Ok(comparison)
}
