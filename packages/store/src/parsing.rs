//! Field parsers for facet CSV columns.
//!
//! The facet files come from an external preprocessing step, so the
//! parsers accept the handful of spellings that step is known to emit.

/// Parses a boolean flag column (`true`/`false`, `1`/`0`, `yes`/`no`,
/// `t`/`f`, case-insensitive). Returns `None` for anything else.
#[must_use]
pub fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => Some(true),
        "0" | "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Normalizes an optional text column: trims it and maps empty strings to
/// `None`.
#[must_use]
pub fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
