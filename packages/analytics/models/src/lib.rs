#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query and result types for accident aggregates and comparisons.
//!
//! Queries ([`AggregateQuery`], [`CompareQuery`]) and report definitions
//! are deserialized from the TOML report catalogue; results
//! ([`Aggregate`], [`Comparison`]) are serialized to JSON or rendered as
//! tables by the CLI.

use crash_stats_accident_models::{DayOfWeek, Month, Severity, Tag, TimeBucket};
use serde::{Deserialize, Serialize, Serializer};

/// A column accidents can be grouped or filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Dimension {
    /// Neighborhood label.
    Neighborhood,
    /// Primary street.
    Street,
    /// Cross street (empty for non-intersection accidents).
    CrossStreet,
    /// Full location string.
    Location,
    /// Whether the accident had a cross street.
    Intersection,
    /// 3-hour time-of-day window.
    TimeOfDay,
    /// Day of the week.
    Day,
    /// Calendar month.
    Month,
    /// Calendar year.
    Year,
    /// One of the boolean involvement flags.
    Tag(Tag),
    /// Casualty vs. property-damage-only.
    Severity,
    /// Crash configuration category.
    CrashConfiguration,
}

impl Dimension {
    /// Returns every dimension, tags included.
    #[must_use]
    pub fn all() -> Vec<Self> {
        let mut all = vec![
            Self::Neighborhood,
            Self::Street,
            Self::CrossStreet,
            Self::Location,
            Self::Intersection,
            Self::TimeOfDay,
            Self::Day,
            Self::Month,
            Self::Year,
        ];
        all.extend(Tag::all().iter().copied().map(Self::Tag));
        all.extend([Self::Severity, Self::CrashConfiguration]);
        all
    }

    /// Returns the column name used on the command line, in TOML and as a
    /// table header.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Neighborhood => "neighborhood",
            Self::Street => "street",
            Self::CrossStreet => "cross_street",
            Self::Location => "location",
            Self::Intersection => "intersection",
            Self::TimeOfDay => "time_of_day",
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
            Self::Tag(tag) => tag.into(),
            Self::Severity => "severity",
            Self::CrashConfiguration => "crash_configuration",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Dimension {
    type Err = InvalidDimensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::all()
            .into_iter()
            .find(|d| d.name() == name)
            .ok_or(InvalidDimensionError { name })
    }
}

impl TryFrom<String> for Dimension {
    type Error = InvalidDimensionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dimension> for String {
    fn from(value: Dimension) -> Self {
        value.name().to_string()
    }
}

/// Error returned when a string does not name a [`Dimension`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDimensionError {
    /// The rejected name.
    pub name: String,
}

impl std::fmt::Display for InvalidDimensionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown dimension '{}'", self.name)
    }
}

impl std::error::Error for InvalidDimensionError {}

/// The value of one dimension for one accident.
///
/// Values of the same dimension always share a variant, so the derived
/// `Ord` gives the dimension's natural order (clock order for time
/// buckets, Monday-first for days, lexicographic for text).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum KeyValue {
    /// Free-text columns (neighborhood, street, configuration, ...).
    Text(String),
    /// Boolean columns (tags, intersection).
    Flag(bool),
    /// Time-of-day window.
    TimeOfDay(TimeBucket),
    /// Day of the week.
    Day(DayOfWeek),
    /// Calendar month.
    Month(Month),
    /// Calendar year.
    Year(u16),
    /// Severity.
    Severity(Severity),
}

impl std::fmt::Display for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Flag(b) => write!(f, "{b}"),
            Self::TimeOfDay(t) => write!(f, "{t}"),
            Self::Day(d) => write!(f, "{d}"),
            Self::Month(m) => write!(f, "{m}"),
            Self::Year(y) => write!(f, "{y}"),
            Self::Severity(s) => write!(f, "{s}"),
        }
    }
}

/// A group key: one value per grouping dimension, in query order.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupKey(pub Vec<KeyValue>);

impl GroupKey {
    /// Returns the key's values.
    #[must_use]
    pub fn values(&self) -> &[KeyValue] {
        &self.0
    }

    /// Compares two keys value by value on their rendered text, so days
    /// and months order alphabetically rather than by calendar position.
    #[must_use]
    pub fn cmp_text(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .iter()
            .map(ToString::to_string)
            .cmp(other.0.iter().map(ToString::to_string))
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(" / "))
    }
}

/// Running totals for one group of accidents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    /// Number of accidents.
    pub count: u64,
    /// Sum of `total_victims`.
    pub victims: u64,
    /// Sum of `total_crashes`.
    pub crashes: u64,
    /// Number of casualty-severity accidents.
    pub casualties: u64,
}

impl GroupStats {
    /// Adds one accident's contribution.
    pub fn add(&mut self, victims: u32, crashes: u32, casualty: bool) {
        self.count += 1;
        self.victims += u64::from(victims);
        self.crashes += u64::from(crashes);
        self.casualties += u64::from(casualty);
    }

    /// Combines two groups' totals.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            count: self.count + other.count,
            victims: self.victims + other.victims,
            crashes: self.crashes + other.crashes,
            casualties: self.casualties + other.casualties,
        }
    }

    /// Average victims per accident.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn victims_per_accident(&self) -> Ratio {
        Ratio::of(self.victims as f64, self.count as f64)
    }

    /// Share of accidents that were casualty crashes, in percent.
    #[must_use]
    pub fn casualty_rate(&self) -> Ratio {
        Ratio::percent(self.casualties, self.count)
    }
}

/// Result of a division that may have a zero denominator.
///
/// Serializes as a number when defined and as the string `"undefined"`
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ratio {
    /// The denominator was non-zero.
    Defined(f64),
    /// The denominator was zero.
    Undefined,
}

impl Ratio {
    /// Divides `numerator` by `denominator`.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn of(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            Self::Undefined
        } else {
            Self::Defined(numerator / denominator)
        }
    }

    /// `part` as a percentage of `whole`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(part: u64, whole: u64) -> Self {
        Self::of(part as f64 * 100.0, whole as f64)
    }

    /// Returns the value if defined.
    #[must_use]
    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Defined(v) => Some(v),
            Self::Undefined => None,
        }
    }

    /// `self - other`, undefined if either side is.
    #[must_use]
    pub fn minus(self, other: Self) -> Self {
        match (self, other) {
            (Self::Defined(a), Self::Defined(b)) => Self::Defined(a - b),
            _ => Self::Undefined,
        }
    }

    /// `self / other`, undefined if either side is or `other` is zero.
    #[must_use]
    pub fn divided_by(self, other: Self) -> Self {
        match (self, other) {
            (Self::Defined(a), Self::Defined(b)) => Self::of(a, b),
            _ => Self::Undefined,
        }
    }

    /// Scales a defined ratio.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        match self {
            Self::Defined(v) => Self::Defined(v * factor),
            Self::Undefined => Self::Undefined,
        }
    }
}

impl std::fmt::Display for Ratio {
    /// Precision applies to the number only; width pads either form,
    /// right-aligned unless asked otherwise.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match (self, f.precision()) {
            (Self::Defined(v), Some(precision)) => format!("{v:.precision$}"),
            (Self::Defined(v), None) => v.to_string(),
            (Self::Undefined, _) => "undefined".to_string(),
        };
        match (f.width(), f.align()) {
            (None, _) => f.write_str(&text),
            (Some(width), Some(std::fmt::Alignment::Left)) => write!(f, "{text:<width$}"),
            (Some(width), Some(std::fmt::Alignment::Center)) => write!(f, "{text:^width$}"),
            (Some(width), _) => write!(f, "{text:>width$}"),
        }
    }
}

impl Serialize for Ratio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Defined(v) => serializer.serialize_f64(*v),
            Self::Undefined => serializer.serialize_str("undefined"),
        }
    }
}

/// A filter expression over accident dimensions.
///
/// Values are kept as strings and checked against their dimension when the
/// filter is compiled, so the same type can be read from TOML and from the
/// command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    /// The dimension equals the value.
    Eq {
        /// Dimension to test.
        dimension: Dimension,
        /// Expected value.
        value: String,
    },
    /// The dimension equals any of the values.
    In {
        /// Dimension to test.
        dimension: Dimension,
        /// Accepted values.
        values: Vec<String>,
    },
    /// At least `min` victims.
    MinVictims {
        /// Minimum victim count.
        min: u32,
    },
    /// Every sub-filter holds.
    And {
        /// Sub-filters.
        filters: Vec<Self>,
    },
    /// Any sub-filter holds.
    Or {
        /// Sub-filters.
        filters: Vec<Self>,
    },
    /// The sub-filter does not hold.
    Not {
        /// Negated filter.
        filter: Box<Self>,
    },
}

impl Filter {
    /// Shorthand for [`Filter::Eq`].
    #[must_use]
    pub fn equals(dimension: Dimension, value: impl Into<String>) -> Self {
        Self::Eq {
            dimension,
            value: value.into(),
        }
    }

    /// Combines two filters with AND, flattening nested ANDs.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        let mut filters = match self {
            Self::And { filters } => filters,
            single => vec![single],
        };
        match other {
            Self::And { filters: more } => filters.extend(more),
            single => filters.push(single),
        }
        Self::And { filters }
    }

    /// Negates this filter.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not {
            filter: Box::new(self),
        }
    }
}

/// How result rows are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOrder {
    /// Aggregates: descending count. Comparisons: descending absolute
    /// point difference. Ties by ascending key.
    #[default]
    Ranked,
    /// Ascending natural key order.
    Key,
}

/// A group-by query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateQuery {
    /// Grouping dimensions, in key order.
    pub dimensions: Vec<Dimension>,
    /// Only accidents matching this filter are counted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// Groups with fewer accidents are suppressed before ranking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_count: Option<u64>,
    /// Maximum number of rows returned after ranking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Row order.
    #[serde(default)]
    pub order: RowOrder,
}

impl AggregateQuery {
    /// Creates an unfiltered query over the given dimensions.
    #[must_use]
    pub fn by(dimensions: &[Dimension]) -> Self {
        Self {
            dimensions: dimensions.to_vec(),
            ..Self::default()
        }
    }

    /// Sets the filter.
    #[must_use]
    pub fn filtered(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the minimum group count.
    #[must_use]
    pub const fn with_min_count(mut self, min_count: u64) -> Self {
        self.min_count = Some(min_count);
        self
    }

    /// Sets the row limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the row order.
    #[must_use]
    pub const fn with_order(mut self, order: RowOrder) -> Self {
        self.order = order;
        self
    }
}

/// A subgroup-vs-baseline comparison query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareQuery {
    /// Dimensions both distributions are grouped by.
    pub dimensions: Vec<Dimension>,
    /// Selects the subgroup.
    pub subgroup: Filter,
    /// Selects the baseline. `None` means every accident.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Filter>,
    /// Maximum number of rows returned after ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Row order.
    #[serde(default)]
    pub order: RowOrder,
}

/// One ranked group of an [`Aggregate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRow {
    /// Group key, one value per dimension.
    pub key: GroupKey,
    /// Totals for the group.
    #[serde(flatten)]
    pub stats: GroupStats,
    /// Percentage of the filtered total.
    pub share: Ratio,
    /// Average victims per accident.
    pub victims_per_accident: Ratio,
    /// Percentage of casualty crashes.
    pub casualty_rate: Ratio,
}

/// Result of an [`AggregateQuery`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    /// Grouping dimensions.
    pub dimensions: Vec<Dimension>,
    /// Totals over every accident that passed the filter.
    pub total: GroupStats,
    /// Number of distinct groups before the minimum-count post-filter.
    pub groups: usize,
    /// Number of groups removed by the minimum-count post-filter.
    pub suppressed: usize,
    /// Ranked rows.
    pub rows: Vec<AggregateRow>,
}

impl Aggregate {
    /// Looks up a row by key.
    #[must_use]
    pub fn get(&self, key: &GroupKey) -> Option<&AggregateRow> {
        self.rows.iter().find(|r| &r.key == key)
    }

    /// The first row in result order.
    #[must_use]
    pub fn top(&self) -> Option<&AggregateRow> {
        self.rows.first()
    }
}

/// One key of a [`Comparison`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    /// Group key.
    pub key: GroupKey,
    /// Accidents with this key in the subgroup.
    pub subgroup_count: u64,
    /// Accidents with this key in the baseline.
    pub baseline_count: u64,
    /// Subgroup count as a percentage of the subgroup total.
    pub subgroup_share: Ratio,
    /// Baseline count as a percentage of the baseline total.
    pub baseline_share: Ratio,
    /// `subgroup_share - baseline_share`, in percentage points.
    pub point_difference: Ratio,
    /// Point difference relative to the baseline share, in percent.
    pub percent_difference: Ratio,
}

/// Result of comparing a subgroup distribution against a baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    /// Dimensions both distributions were grouped by.
    pub dimensions: Vec<Dimension>,
    /// Accidents in the subgroup.
    pub subgroup_total: u64,
    /// Accidents in the baseline.
    pub baseline_total: u64,
    /// One row per key present in either distribution.
    pub rows: Vec<ComparisonRow>,
}

impl Comparison {
    /// Looks up a row by key.
    #[must_use]
    pub fn get(&self, key: &GroupKey) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| &r.key == key)
    }
}

/// The query behind a catalogue report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportQuery {
    /// A ranked group-by.
    Aggregate(AggregateQuery),
    /// A subgroup-vs-baseline comparison.
    Compare(CompareQuery),
}

/// One analyst question from the report catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDefinition {
    /// Unique report identifier (e.g. `"top_neighborhoods"`).
    pub id: String,
    /// Short human-readable title.
    pub title: String,
    /// The question the report answers.
    pub question: String,
    /// What to compute.
    pub query: ReportQuery,
}

/// A report catalogue file: a list of `[[report]]` tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportCatalogue {
    /// Report definitions in file order.
    #[serde(default, rename = "report")]
    pub reports: Vec<ReportDefinition>,
}

/// What a report produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportOutput {
    /// Output of an aggregate report.
    Aggregate(Aggregate),
    /// Output of a comparison report.
    Comparison(Comparison),
}

/// A report definition together with its output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResult {
    /// Report identifier.
    pub id: String,
    /// Report title.
    pub title: String,
    /// The question answered.
    pub question: String,
    /// Computed output.
    pub output: ReportOutput,
}
