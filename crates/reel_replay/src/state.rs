//! Execution state owned by a replay executor.

use crate::mode::{ReplayMode, ReplayOptions};
use crate::result::ReplayDivergence;
use crate::session::ReplayFileSnapshot;
use indexmap::IndexMap;
use reel_core::SessionId;
use serde::{Deserialize, Serialize};

/// Mutable cursor and bookkeeping for one replay run.
///
/// Only the owning executor mutates this; callers get shared references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayExecutionState {
    /// Session being replayed
    pub session_id: SessionId,
    /// Active mode
    pub mode: ReplayMode,
    /// Index of the next step to execute
    pub current_step: usize,
    /// Advisory pause flag for a driving UI
    pub is_paused: bool,
    /// Advisory auto-advance flag
    pub auto_advance: bool,
    /// Advisory inter-step delay
    pub step_delay_ms: u64,
    /// What replay believes each touched file looks like now
    pub current_files: IndexMap<String, ReplayFileSnapshot>,
    /// Divergences in detection order
    pub divergences: Vec<ReplayDivergence>,
    /// Paths Apply mode committed, in order, with repeats
    pub applied_changes: Vec<String>,
    /// Indices skipped through options
    pub skipped_steps: Vec<usize>,
}

impl ReplayExecutionState {
    /// Fresh state for a session
    #[must_use]
    pub fn new(session_id: SessionId, options: &ReplayOptions) -> Self {
        Self {
            session_id,
            mode: options.mode,
            current_step: options.start_from_step,
            is_paused: false,
            auto_advance: options.auto_advance,
            step_delay_ms: options.step_delay_ms,
            current_files: IndexMap::new(),
            divergences: Vec::new(),
            applied_changes: Vec::new(),
            skipped_steps: Vec::new(),
        }
    }

    /// Whether any divergence has been recorded
    #[must_use]
    pub fn has_divergences(&self) -> bool {
        !self.divergences.is_empty()
    }

    /// Tracked snapshot for a path
    #[must_use]
    pub fn tracked(&self, path: &str) -> Option<&ReplayFileSnapshot> {
        self.current_files.get(path)
    }

    /// Number of applied changes
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.applied_changes.len()
    }

    pub(crate) fn track(&mut self, snapshot: ReplayFileSnapshot) {
        tracing::trace!(path = %snapshot.path, exists = snapshot.exists, "tracking snapshot");
        self.current_files.insert(snapshot.path.clone(), snapshot);
    }

    pub(crate) fn record_applied(&mut self, path: &str) {
        self.applied_changes.push(path.to_string());
    }

    pub(crate) fn record_divergence(&mut self, divergence: ReplayDivergence) {
        self.divergences.push(divergence);
    }
}
