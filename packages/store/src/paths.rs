#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for a facet dataset directory.
//!
//! The default dataset lives in the workspace root's `data/` directory and
//! can be overridden with the `CRASH_STATS_DATA_DIR` environment variable.

use std::path::{Path, PathBuf};

use crash_stats_accident_models::Facet;

/// Environment variable that overrides the default data directory.
pub const DATA_DIR_ENV: &str = "CRASH_STATS_DATA_DIR";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`. Falls back to the
/// manifest directory itself if it has fewer ancestors than expected.
#[must_use]
pub fn project_root() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest
        .ancestors()
        .nth(2)
        .unwrap_or(manifest)
        .to_path_buf()
}

/// Returns the dataset directory: `CRASH_STATS_DATA_DIR` when set,
/// otherwise `<workspace>/data`.
#[must_use]
pub fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map_or_else(|| project_root().join("data"), PathBuf::from)
}

/// Returns the file name a facet is stored under.
#[must_use]
pub const fn facet_file_name(facet: Facet) -> &'static str {
    match facet {
        Facet::Location => "location.csv",
        Facet::Time => "time.csv",
        Facet::Tags => "tags.csv",
        Facet::Description => "description.csv",
    }
}

/// Returns the path of a facet file inside `dir`.
#[must_use]
pub fn facet_path(dir: &Path, facet: Facet) -> PathBuf {
    dir.join(facet_file_name(facet))
}
