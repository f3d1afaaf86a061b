//! Per-dimension key extraction and value parsing.

use crash_stats_accident_models::{Accident, DayOfWeek, Month, Severity, TimeBucket};
use crash_stats_analytics_models::{Dimension, GroupKey, KeyValue};
use crash_stats_store::parsing::parse_flag;

use crate::AnalyticsError;

/// Returns the value of `dimension` for one accident.
#[must_use]
pub fn key_of(dimension: Dimension, accident: &Accident) -> KeyValue {
    match dimension {
        Dimension::Tag(tag) => KeyValue::Flag(accident.tags.has(tag)),
        Dimension::Intersection => KeyValue::Flag(accident.location.is_intersection()),
        Dimension::TimeOfDay => KeyValue::TimeOfDay(accident.time.time_of_day),
        Dimension::Day => KeyValue::Day(accident.time.day),
        Dimension::Month => KeyValue::Month(accident.time.month),
        Dimension::Year => KeyValue::Year(accident.time.year),
        Dimension::Severity => KeyValue::Severity(accident.tags.severity),
        Dimension::Neighborhood
        | Dimension::Street
        | Dimension::CrossStreet
        | Dimension::Location
        | Dimension::CrashConfiguration => {
            KeyValue::Text(text_of(dimension, accident).unwrap_or_default().to_string())
        }
    }
}

/// Borrows the value of a free-text dimension. Returns `None` for
/// dimensions that are not free text.
#[must_use]
pub fn text_of(dimension: Dimension, accident: &Accident) -> Option<&str> {
    match dimension {
        Dimension::Neighborhood => Some(&accident.location.neighborhood),
        Dimension::Street => Some(&accident.location.street),
        Dimension::CrossStreet => Some(accident.location.cross_street.as_deref().unwrap_or("")),
        Dimension::Location => Some(&accident.location.location),
        Dimension::CrashConfiguration => Some(&accident.description.crash_configuration),
        _ => None,
    }
}

/// Whether `dimension` holds a boolean.
#[must_use]
pub const fn is_flag(dimension: Dimension) -> bool {
    matches!(dimension, Dimension::Tag(_) | Dimension::Intersection)
}

/// Builds the group key of one accident.
#[must_use]
pub fn group_key(dimensions: &[Dimension], accident: &Accident) -> GroupKey {
    GroupKey(dimensions.iter().map(|d| key_of(*d, accident)).collect())
}

/// Parses a user-supplied value for `dimension`.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidValue`] if the value does not fit the
/// dimension (e.g. `"Funday"` for `day`).
pub fn parse_value(dimension: Dimension, raw: &str) -> Result<KeyValue, AnalyticsError> {
    let raw = raw.trim();
    let invalid = |message: String| AnalyticsError::InvalidValue {
        dimension,
        value: raw.to_string(),
        message,
    };

    match dimension {
        Dimension::Neighborhood
        | Dimension::Street
        | Dimension::CrossStreet
        | Dimension::Location
        | Dimension::CrashConfiguration => Ok(KeyValue::Text(raw.to_string())),
        Dimension::Tag(_) | Dimension::Intersection => parse_flag(raw)
            .map(KeyValue::Flag)
            .ok_or_else(|| invalid("expected true or false".to_string())),
        Dimension::TimeOfDay => raw
            .parse::<TimeBucket>()
            .map(KeyValue::TimeOfDay)
            .map_err(|e| invalid(e.to_string())),
        Dimension::Day => raw
            .parse::<DayOfWeek>()
            .map(KeyValue::Day)
            .map_err(|_| invalid("expected a day name".to_string())),
        Dimension::Month => raw
            .parse::<Month>()
            .map(KeyValue::Month)
            .map_err(|_| invalid("expected a month name".to_string())),
        Dimension::Year => raw
            .parse::<u16>()
            .map(KeyValue::Year)
            .map_err(|e| invalid(e.to_string())),
        Dimension::Severity => raw
            .parse::<Severity>()
            .map(KeyValue::Severity)
            .map_err(|_| invalid("expected casualty or property_damage_only".to_string())),
    }
}
