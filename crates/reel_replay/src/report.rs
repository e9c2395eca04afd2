//! Run reports summarising a replay.

use crate::mode::ReplayMode;
use crate::result::{ReplayDivergence, ReplayStepResult, StepStatus, serialize_millis};
use crate::state::ReplayExecutionState;
use reel_core::SessionId;
use serde::Serialize;
use std::time::Duration;

/// Summary of a replay run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Session replayed
    pub session_id: SessionId,
    /// Mode the run used
    pub mode: ReplayMode,
    /// Results considered
    pub total_results: usize,
    /// Completed results
    pub completed_count: usize,
    /// Skipped results
    pub skipped_count: usize,
    /// Failed results (replayed recorded failures)
    pub failed_count: usize,
    /// Divergences recorded in state
    pub divergences: Vec<ReplayDivergence>,
    /// Paths Apply mode committed, in order
    pub applied_changes: Vec<String>,
    /// Cursor after the run
    pub cursor: usize,
    /// Sum of per-step dispatch time
    #[serde(rename = "total_ms", serialize_with = "serialize_millis")]
    pub total_time: Duration,
}

impl ReplayReport {
    /// Build a report from executor state and the results of a run
    #[must_use]
    pub fn from_results(state: &ReplayExecutionState, results: &[ReplayStepResult<'_>]) -> Self {
        let count = |status: StepStatus| results.iter().filter(|r| r.status == status).count();

        Self {
            session_id: state.session_id.clone(),
            mode: state.mode,
            total_results: results.len(),
            completed_count: count(StepStatus::Completed),
            skipped_count: count(StepStatus::Skipped),
            failed_count: count(StepStatus::Failed),
            divergences: state.divergences.clone(),
            applied_changes: state.applied_changes.clone(),
            cursor: state.current_step,
            total_time: results.iter().map(|r| r.execution_time).sum(),
        }
    }

    /// Number of divergences
    #[must_use]
    pub fn divergence_count(&self) -> usize {
        self.divergences.len()
    }

    /// No divergences and no replayed failures
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.divergences.is_empty() && self.failed_count == 0
    }
}
