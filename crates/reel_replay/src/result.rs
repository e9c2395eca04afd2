//! Per-step replay results and divergence records.

use crate::session::{ReplayDiff, ReplayStep};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Outcome of replaying one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step replayed
    Completed,
    /// Step force-skipped by options
    Skipped,
    /// Step replayed a recorded failure
    Failed,
}

impl StepStatus {
    /// Stable name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a divergence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DivergenceKind {
    /// Expected content hash differs from the tracked or initial one
    ContentMismatch,
}

impl DivergenceKind {
    /// Stable name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ContentMismatch => "content_mismatch",
        }
    }
}

impl fmt::Display for DivergenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mismatch between recorded expectations and replay state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    /// Cursor index of the step that detected it
    pub step_index: usize,
    /// Category
    pub kind: DivergenceKind,
    /// Human-readable description
    pub description: String,
    /// Expected content, truncated
    pub expected: String,
    /// Actual content, truncated
    pub actual: String,
    /// When it was detected
    pub detected_at: DateTime<Utc>,
}

/// Result of replaying one step.
///
/// Borrows the step from the session being replayed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayStepResult<'a> {
    /// Step number of the replayed step
    pub step_number: usize,
    /// Outcome
    pub status: StepStatus,
    /// The replayed step
    pub step: &'a ReplayStep,
    /// Changes displayed or applied
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub file_changes: Vec<ReplayDiff>,
    /// Divergence found while replaying
    #[serde(skip_serializing_if = "Option::is_none")]
    pub divergence: Option<ReplayDivergence>,
    /// Recorded error text for failed steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time spent in dispatch
    #[serde(rename = "execution_ms", serialize_with = "serialize_millis")]
    pub execution_time: Duration,
}

impl<'a> ReplayStepResult<'a> {
    fn with_status(step: &'a ReplayStep, status: StepStatus) -> Self {
        Self {
            step_number: step.step_number,
            status,
            step,
            file_changes: Vec::new(),
            divergence: None,
            error: None,
            execution_time: Duration::ZERO,
        }
    }

    /// Completed result with no changes
    #[must_use]
    pub fn completed(step: &'a ReplayStep) -> Self {
        Self::with_status(step, StepStatus::Completed)
    }

    /// Skipped result
    #[must_use]
    pub fn skipped(step: &'a ReplayStep) -> Self {
        Self::with_status(step, StepStatus::Skipped)
    }

    /// Failed result carrying recorded error text
    #[must_use]
    pub fn failed(step: &'a ReplayStep, error: Option<String>) -> Self {
        Self {
            error,
            ..Self::with_status(step, StepStatus::Failed)
        }
    }

    /// Whether a divergence is attached
    #[must_use]
    pub fn has_divergence(&self) -> bool {
        self.divergence.is_some()
    }
}

pub(crate) fn serialize_millis<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
