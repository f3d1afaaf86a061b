#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation and comparison engine over the accident record store.
//!
//! [`aggregate`] groups accidents along any combination of dimensions and
//! ranks the groups; [`compare`] measures how a subgroup's distribution
//! differs from a baseline's; [`reports`] holds the catalogue of analyst
//! questions expressed as those two kinds of query.

pub mod aggregate;
pub mod compare;
pub mod dimensions;
pub mod filter;
pub mod reports;

use crash_stats_analytics_models::{Dimension, InvalidDimensionError};
use thiserror::Error;

pub use aggregate::{aggregate, aggregate_matching, group_by};
pub use compare::{compare, compare_subgroup};
pub use filter::{Predicate, parse_filter};

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The query is structurally invalid.
    #[error("Invalid query: {message}")]
    InvalidQuery {
        /// Description of what went wrong.
        message: String,
    },

    /// A filter value does not fit its dimension.
    #[error("Invalid value '{value}' for {dimension}: {message}")]
    InvalidValue {
        /// The dimension being filtered.
        dimension: Dimension,
        /// The rejected value.
        value: String,
        /// Description of what went wrong.
        message: String,
    },

    /// A dimension name was not recognized.
    #[error(transparent)]
    Dimension(#[from] InvalidDimensionError),

    /// No report with the given id exists in the catalogue.
    #[error("Unknown report '{id}'")]
    UnknownReport {
        /// The requested id.
        id: String,
    },

    /// A report catalogue could not be parsed.
    #[error("Failed to parse report catalogue '{name}': {source}")]
    Catalogue {
        /// Catalogue name or path.
        name: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// Filesystem error while reading a catalogue.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
