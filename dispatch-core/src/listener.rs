//! Solve budget monitoring.

use std::time::Duration;

use crate::StageBudget;

/// Progress snapshot reported by a solver while it searches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressData {
    /// Wall-clock time since the solve started.
    pub elapsed: Duration,
    /// Relative gap between incumbent and bound, once an incumbent exists.
    pub relative_gap: Option<f64>,
}

/// Decides when a running solve should stop.
///
/// The search is aborted once the wall-clock limit is exceeded, or as soon
/// as a gap target is set and the relative gap reaches it.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use dispatch_core::{BudgetListener, ProgressData};
///
/// let listener = BudgetListener::with_gap(Duration::from_secs(60), 0.05);
/// let early = ProgressData { elapsed: Duration::from_secs(5), relative_gap: Some(0.2) };
/// let close = ProgressData { elapsed: Duration::from_secs(5), relative_gap: Some(0.01) };
/// assert!(!listener.should_abort(&early));
/// assert!(listener.should_abort(&close));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetListener {
    time_limit: Duration,
    gap_target: Option<f64>,
}

impl BudgetListener {
    /// Listener enforcing only a time limit.
    #[must_use]
    pub const fn time_only(time_limit: Duration) -> Self {
        Self {
            time_limit,
            gap_target: None,
        }
    }

    /// Listener enforcing a time limit and a relative gap target.
    #[must_use]
    pub const fn with_gap(time_limit: Duration, gap_target: f64) -> Self {
        Self {
            time_limit,
            gap_target: Some(gap_target),
        }
    }

    /// Listener for a configured stage, optionally ignoring the gap target.
    #[must_use]
    pub const fn for_stage(budget: &StageBudget, use_gap: bool) -> Self {
        match (budget.gap, use_gap) {
            (Some(gap), true) => Self::with_gap(budget.time_limit(), gap),
            _ => Self::time_only(budget.time_limit()),
        }
    }

    /// Configured wall-clock limit.
    #[must_use]
    pub const fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Configured gap target.
    #[must_use]
    pub const fn gap_target(&self) -> Option<f64> {
        self.gap_target
    }

    /// Whether the solve described by `progress` should stop now.
    #[must_use]
    pub fn should_abort(&self, progress: &ProgressData) -> bool {
        if progress.elapsed > self.time_limit {
            return true;
        }
        matches!(
            (self.gap_target, progress.relative_gap),
            (Some(target), Some(gap)) if gap <= target
        )
    }
}
