//! Step-based progress reporting.
//!
//! Loading a dataset and running a batch of reports are both a short,
//! known sequence of named steps (one per facet file, one per report).
//! [`ProgressCallback`] receives those steps; the CLI renders them with
//! `indicatif`, while library callers and tests pass [`NullProgress`].

use std::sync::Arc;

/// Receives progress events from a sequence of named steps.
pub trait ProgressCallback: Send + Sync {
    /// Announces how many steps follow.
    fn begin(&self, steps: u64);

    /// A step started. `label` names it (a facet, a report id).
    fn step(&self, label: &str);

    /// The current step completed.
    fn step_done(&self);

    /// All steps completed. `summary` replaces the indicator when given;
    /// otherwise the indicator is removed.
    fn done(&self, summary: Option<String>);
}

/// Ignores every event.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn begin(&self, _steps: u64) {}
    fn step(&self, _label: &str) {}
    fn step_done(&self) {}
    fn done(&self, _summary: Option<String>) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
