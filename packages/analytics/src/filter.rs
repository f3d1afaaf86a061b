//! Filter compilation and the command-line filter syntax.
//!
//! A [`Filter`] keeps its values as strings; [`Predicate::compile`] checks
//! every value against its dimension once, up front, so evaluating the
//! predicate per accident never fails.
//!
//! Text dimensions compare case-insensitively.

use crash_stats_accident_models::Accident;
use crash_stats_analytics_models::{Dimension, Filter, KeyValue};

use crate::AnalyticsError;
use crate::dimensions::{is_flag, key_of, parse_value, text_of};

/// A compiled, infallible filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Matches every accident.
    All,
    /// The dimension equals the value.
    Eq(Dimension, KeyValue),
    /// The dimension equals any of the values.
    In(Dimension, Vec<KeyValue>),
    /// At least this many victims.
    MinVictims(u32),
    /// Every sub-predicate holds.
    And(Vec<Self>),
    /// Any sub-predicate holds.
    Or(Vec<Self>),
    /// The sub-predicate does not hold.
    Not(Box<Self>),
}

impl Predicate {
    /// Compiles a filter, validating every value against its dimension.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if a value does not fit its dimension or
    /// an `In` filter has no values.
    pub fn compile(filter: &Filter) -> Result<Self, AnalyticsError> {
        Ok(match filter {
            Filter::Eq { dimension, value } => {
                Self::Eq(*dimension, parse_value(*dimension, value)?)
            }
            Filter::In { dimension, values } => {
                if values.is_empty() {
                    return Err(AnalyticsError::InvalidQuery {
                        message: format!("'in' filter on {dimension} has no values"),
                    });
                }
                Self::In(
                    *dimension,
                    values
                        .iter()
                        .map(|v| parse_value(*dimension, v))
                        .collect::<Result<_, _>>()?,
                )
            }
            Filter::MinVictims { min } => Self::MinVictims(*min),
            Filter::And { filters } => Self::And(
                filters
                    .iter()
                    .map(Self::compile)
                    .collect::<Result<_, _>>()?,
            ),
            Filter::Or { filters } => Self::Or(
                filters
                    .iter()
                    .map(Self::compile)
                    .collect::<Result<_, _>>()?,
            ),
            Filter::Not { filter } => Self::Not(Box::new(Self::compile(filter)?)),
        })
    }

    /// Compiles an optional filter; `None` matches everything.
    ///
    /// # Errors
    ///
    /// See [`Predicate::compile`].
    pub fn compile_optional(filter: Option<&Filter>) -> Result<Self, AnalyticsError> {
        filter.map_or(Ok(Self::All), Self::compile)
    }

    /// Evaluates the predicate for one accident.
    #[must_use]
    pub fn matches(&self, accident: &Accident) -> bool {
        match self {
            Self::All => true,
            Self::Eq(dimension, value) => value_matches(*dimension, value, accident),
            Self::In(dimension, values) => values
                .iter()
                .any(|value| value_matches(*dimension, value, accident)),
            Self::MinVictims(min) => accident.description.total_victims >= *min,
            Self::And(predicates) => predicates.iter().all(|p| p.matches(accident)),
            Self::Or(predicates) => predicates.iter().any(|p| p.matches(accident)),
            Self::Not(predicate) => !predicate.matches(accident),
        }
    }
}

fn value_matches(dimension: Dimension, value: &KeyValue, accident: &Accident) -> bool {
    match (text_of(dimension, accident), value) {
        (Some(actual), KeyValue::Text(expected)) => actual.trim().eq_ignore_ascii_case(expected),
        _ => &key_of(dimension, accident) == value,
    }
}

/// Parses the command-line filter syntax.
///
/// Terms are separated by commas and combined with AND:
///
/// * `dimension=value` equality, `dimension=a|b|c` any-of
/// * `dimension!=value` negated equality
/// * `cyclist` / `!cyclist` shorthand for a flag being true / false
/// * `victims>=N` at least `N` victims
///
/// # Errors
///
/// Returns [`AnalyticsError`] on an empty expression, an unknown
/// dimension, or a bare term that is not a flag dimension.
pub fn parse_filter(expr: &str) -> Result<Filter, AnalyticsError> {
    let filters = expr
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(parse_term)
        .collect::<Result<Vec<_>, _>>()?;

    filters
        .into_iter()
        .reduce(Filter::and)
        .ok_or_else(|| AnalyticsError::InvalidQuery {
            message: "empty filter expression".to_string(),
        })
}

fn parse_term(term: &str) -> Result<Filter, AnalyticsError> {
    if let Some((name, min)) = term.split_once(">=") {
        if name.trim().eq_ignore_ascii_case("victims") {
            let min = min
                .trim()
                .parse::<u32>()
                .map_err(|e| AnalyticsError::InvalidQuery {
                    message: format!("invalid victim threshold in '{term}': {e}"),
                })?;
            return Ok(Filter::MinVictims { min });
        }
        return Err(AnalyticsError::InvalidQuery {
            message: format!("'>=' is only supported for victims, got '{term}'"),
        });
    }

    if let Some((name, value)) = term.split_once("!=") {
        let dimension = name.parse::<Dimension>()?;
        return Ok(equality(dimension, value).negate());
    }

    if let Some((name, value)) = term.split_once('=') {
        let dimension = name.parse::<Dimension>()?;
        return Ok(equality(dimension, value));
    }

    let (negated, name) = term
        .strip_prefix('!')
        .map_or((false, term), |rest| (true, rest));
    let dimension = name.parse::<Dimension>()?;
    if !is_flag(dimension) {
        return Err(AnalyticsError::InvalidQuery {
            message: format!("'{term}' needs a value: {dimension} is not a flag"),
        });
    }
    Ok(Filter::equals(dimension, if negated { "false" } else { "true" }))
}

fn equality(dimension: Dimension, value: &str) -> Filter {
    let values: Vec<String> = value.split('|').map(|v| v.trim().to_string()).collect();
    if values.len() == 1 {
        Filter::equals(dimension, value.trim())
    } else {
        Filter::In { dimension, values }
    }
}
