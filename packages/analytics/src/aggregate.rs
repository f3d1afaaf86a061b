//! Group-by aggregation.

use std::collections::{BTreeMap, BTreeSet};

use crash_stats_accident_models::Accident;
use crash_stats_analytics_models::{
    Aggregate, AggregateQuery, AggregateRow, Dimension, GroupKey, GroupStats, Ratio, RowOrder,
};
use crash_stats_store::RecordStore;

use crate::AnalyticsError;
use crate::dimensions::group_key;
use crate::filter::Predicate;

/// Groups accidents by `dimensions` and totals each group.
///
/// The map iterates in natural key order.
#[must_use]
pub fn group_by<'a>(
    accidents: impl IntoIterator<Item = &'a Accident>,
    dimensions: &[Dimension],
) -> BTreeMap<GroupKey, GroupStats> {
    let mut groups: BTreeMap<GroupKey, GroupStats> = BTreeMap::new();
    for accident in accidents {
        groups.entry(group_key(dimensions, accident)).or_default().add(
            accident.description.total_victims,
            accident.description.total_crashes,
            accident.is_casualty(),
        );
    }
    groups
}

/// Runs an aggregate query against the store.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the query repeats a dimension or its
/// filter does not compile.
pub fn aggregate(store: &RecordStore, query: &AggregateQuery) -> Result<Aggregate, AnalyticsError> {
    aggregate_matching(store.accidents(), query)
}

/// Runs an aggregate query over an arbitrary slice of accidents.
///
/// # Errors
///
/// See [`aggregate`].
pub fn aggregate_matching(
    accidents: &[Accident],
    query: &AggregateQuery,
) -> Result<Aggregate, AnalyticsError> {
    check_dimensions(&query.dimensions)?;
    let predicate = Predicate::compile_optional(query.filter.as_ref())?;

    let matching: Vec<&Accident> = accidents.iter().filter(|a| predicate.matches(a)).collect();
    let groups = group_by(matching.iter().copied(), &query.dimensions);
    let total = groups
        .values()
        .fold(GroupStats::default(), |acc, stats| acc.merge(*stats));
    let group_count = groups.len();

    let min_count = query.min_count.unwrap_or(0);
    let mut rows: Vec<AggregateRow> = groups
        .into_iter()
        .filter(|(_, stats)| stats.count >= min_count)
        .map(|(key, stats)| AggregateRow {
            key,
            stats,
            share: Ratio::percent(stats.count, total.count),
            victims_per_accident: stats.victims_per_accident(),
            casualty_rate: stats.casualty_rate(),
        })
        .collect();
    let suppressed = group_count - rows.len();

    if suppressed > 0 {
        log::debug!("Suppressed {suppressed} group(s) below {min_count} accidents");
    }

    // BTreeMap iteration already yields natural key order.
    if query.order == RowOrder::Ranked {
        rows.sort_by(|a, b| {
            b.stats
                .count
                .cmp(&a.stats.count)
                .then_with(|| a.key.cmp_text(&b.key))
        });
    }

    if let Some(limit) = query.limit {
        rows.truncate(limit);
    }

    log::debug!(
        "Aggregated {} accidents by [{}] into {group_count} groups",
        total.count,
        dimension_list(&query.dimensions),
    );

    Ok(Aggregate {
        dimensions: query.dimensions.clone(),
        total,
        groups: group_count,
        suppressed,
        rows,
    })
}

pub(crate) fn check_dimensions(dimensions: &[Dimension]) -> Result<(), AnalyticsError> {
    if dimensions.is_empty() {
        return Err(AnalyticsError::InvalidQuery {
            message: "at least one grouping dimension is required".to_string(),
        });
    }
    let mut seen = BTreeSet::new();
    for dimension in dimensions {
        if !seen.insert(*dimension) {
            return Err(AnalyticsError::InvalidQuery {
                message: format!("dimension {dimension} is repeated"),
            });
        }
    }
    Ok(())
}

pub(crate) fn dimension_list(dimensions: &[Dimension]) -> String {
    dimensions
        .iter()
        .map(|d| d.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use crash_stats_accident_models::{DayOfWeek, Tag, TimeBucket};
    use crash_stats_analytics_models::{Filter, KeyValue};
    use crash_stats_store::progress::null_progress;

    use super::*;

    fn fixture_store() -> RecordStore {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../store/fixtures/basic");
        RecordStore::load_dir(&dir, &null_progress()).unwrap()
    }

    fn text(s: &str) -> KeyValue {
        KeyValue::Text(s.to_string())
    }

    #[test]
    fn group_counts_sum_to_total_for_every_dimension() {
        let store = fixture_store();
        for dimension in Dimension::all() {
            let result = aggregate(&store, &AggregateQuery::by(&[dimension])).unwrap();
            let sum: u64 = result.rows.iter().map(|r| r.stats.count).sum();
            assert_eq!(sum, store.len() as u64, "{dimension}");
            assert_eq!(result.total.count, store.len() as u64, "{dimension}");
        }
    }

    #[test]
    fn downtown_tops_neighborhoods() {
        let store = fixture_store();
        let result = aggregate(&store, &AggregateQuery::by(&[Dimension::Neighborhood])).unwrap();

        let top = result.top().unwrap();
        assert_eq!(top.key, GroupKey(vec![text("Downtown")]));
        assert_eq!(top.stats.count, 3);
        assert_eq!(top.stats.victims, 4);
        assert_eq!(top.stats.crashes, 4);
        assert_eq!(top.stats.casualties, 2);
        assert_eq!(top.share, Ratio::Defined(50.0));

        assert_eq!(result.rows[1].key, GroupKey(vec![text("Riverside")]));
        assert_eq!(result.rows[2].key, GroupKey(vec![text("Hillcrest")]));
        assert_eq!(result.total.victims, 6);
        assert_eq!(result.total.crashes, 7);
    }

    #[test]
    fn cyclist_share_uses_filtered_total() {
        let store = fixture_store();
        let query = AggregateQuery::by(&[Dimension::Neighborhood])
            .filtered(Filter::equals(Dimension::Tag(Tag::Cyclist), "true"));
        let result = aggregate(&store, &query).unwrap();

        assert_eq!(result.total.count, 2);
        assert_eq!(result.rows.len(), 2);
        let downtown = result.get(&GroupKey(vec![text("Downtown")])).unwrap();
        assert_eq!(downtown.share, Ratio::Defined(50.0));
    }

    #[test]
    fn ties_break_by_ascending_key() {
        let store = fixture_store();
        let query = AggregateQuery::by(&[Dimension::Severity]);
        let result = aggregate(&store, &query).unwrap();
        // Three casualties and three property-damage-only accidents.
        assert_eq!(result.rows[0].stats.count, 3);
        assert_eq!(result.rows[1].stats.count, 3);
        assert!(result.rows[0].key < result.rows[1].key);
    }

    #[test]
    fn day_ties_break_alphabetically() {
        let store = fixture_store();
        let query = AggregateQuery::by(&[Dimension::Day]).filtered(Filter::MinVictims { min: 2 });
        let result = aggregate(&store, &query).unwrap();

        let days: Vec<&KeyValue> = result.rows.iter().map(|r| &r.key.values()[0]).collect();
        assert_eq!(
            days,
            vec![
                &KeyValue::Day(DayOfWeek::Friday),
                &KeyValue::Day(DayOfWeek::Monday)
            ]
        );

        let natural = aggregate(&store, &query.clone().with_order(RowOrder::Key)).unwrap();
        assert_eq!(
            natural.rows[0].key,
            GroupKey(vec![KeyValue::Day(DayOfWeek::Monday)])
        );
    }

    #[test]
    fn min_count_suppresses_before_limit() {
        let store = fixture_store();
        let query = AggregateQuery::by(&[Dimension::Neighborhood])
            .with_min_count(2)
            .with_limit(1);
        let result = aggregate(&store, &query).unwrap();

        assert_eq!(result.groups, 3);
        assert_eq!(result.suppressed, 1);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].key, GroupKey(vec![text("Downtown")]));
        // The filtered total still includes the suppressed group.
        assert_eq!(result.total.count, 6);
    }

    #[test]
    fn natural_order_follows_the_clock() {
        let store = fixture_store();
        let query = AggregateQuery::by(&[Dimension::TimeOfDay]).with_order(RowOrder::Key);
        let result = aggregate(&store, &query).unwrap();

        let buckets: Vec<&KeyValue> = result.rows.iter().map(|r| &r.key.values()[0]).collect();
        assert_eq!(
            buckets,
            vec![
                &KeyValue::TimeOfDay(TimeBucket::LateNight),
                &KeyValue::TimeOfDay(TimeBucket::Morning),
                &KeyValue::TimeOfDay(TimeBucket::LateAfternoon),
                &KeyValue::TimeOfDay(TimeBucket::Evening),
            ]
        );
    }

    #[test]
    fn multi_dimension_keys() {
        let store = fixture_store();
        let query = AggregateQuery::by(&[Dimension::Neighborhood, Dimension::Day]);
        let result = aggregate(&store, &query).unwrap();

        let key = GroupKey(vec![text("Downtown"), KeyValue::Day(DayOfWeek::Friday)]);
        assert_eq!(result.get(&key).unwrap().stats.count, 2);
        assert_eq!(result.top().unwrap().key, key);
    }

    #[test]
    fn empty_selection_has_undefined_ratios() {
        let store = fixture_store();
        let query = AggregateQuery::by(&[Dimension::Neighborhood])
            .filtered(Filter::equals(Dimension::Neighborhood, "Nowhere"));
        let result = aggregate(&store, &query).unwrap();
        assert!(result.rows.is_empty());
        assert_eq!(result.total, GroupStats::default());
        assert_eq!(result.total.casualty_rate(), Ratio::Undefined);
    }

    #[test]
    fn rejects_repeated_or_missing_dimensions() {
        let store = fixture_store();
        assert!(matches!(
            aggregate(&store, &AggregateQuery::by(&[Dimension::Day, Dimension::Day])),
            Err(AnalyticsError::InvalidQuery { .. })
        ));
        assert!(matches!(
            aggregate(&store, &AggregateQuery::by(&[])),
            Err(AnalyticsError::InvalidQuery { .. })
        ));
    }
}
