//! Divergence detection against tracked and initial file state.
//!
//! Lookup is two-tier: a snapshot tracked earlier in this replay wins;
//! otherwise the session's initial snapshot is used. A path known to
//! neither tier never diverges, since there is nothing to compare against.
//! The live filesystem is never consulted.

use crate::result::{DivergenceKind, ReplayDivergence};
use crate::session::ReplayFileSnapshot;
use chrono::Utc;
use indexmap::IndexMap;
use reel_core::Hash;

/// Compares expected content against replay state
#[derive(Debug, Clone, Copy)]
pub struct DivergenceDetector<'a> {
    initial: &'a IndexMap<String, ReplayFileSnapshot>,
    tracked: &'a IndexMap<String, ReplayFileSnapshot>,
    truncate_limit: usize,
}

impl<'a> DivergenceDetector<'a> {
    /// Create a detector over initial and tracked snapshots
    #[must_use]
    pub fn new(
        initial: &'a IndexMap<String, ReplayFileSnapshot>,
        tracked: &'a IndexMap<String, ReplayFileSnapshot>,
        truncate_limit: usize,
    ) -> Self {
        Self {
            initial,
            tracked,
            truncate_limit,
        }
    }

    /// Check whether `path` is expected to hold `expected_content`.
    ///
    /// Returns `None` when hashes match or the path is unknown.
    #[must_use]
    pub fn check(
        &self,
        step_index: usize,
        path: &str,
        expected_content: &str,
    ) -> Option<ReplayDivergence> {
        let expected_hash = Hash::of_str(expected_content);

        let (actual, description) = if let Some(tracked) = self.tracked.get(path) {
            let description = if tracked.exists {
                format!("File content differs: {}", path)
            } else {
                format!("File was removed earlier in the replay: {}", path)
            };
            (tracked, description)
        } else if let Some(initial) = self.initial.get(path) {
            let description = if initial.exists {
                format!("File content differs from recorded state: {}", path)
            } else {
                format!("File did not exist in recorded state: {}", path)
            };
            (initial, description)
        } else {
            return None;
        };

        if actual.has_hash(&expected_hash) {
            return None;
        }

        Some(ReplayDivergence {
            step_index,
            kind: DivergenceKind::ContentMismatch,
            description,
            expected: truncate_content(expected_content, self.truncate_limit),
            actual: truncate_content(
                actual.content.as_deref().unwrap_or_default(),
                self.truncate_limit,
            ),
            detected_at: Utc::now(),
        })
    }
}

/// Bound `content` to `max_chars` characters.
///
/// Longer content keeps its first `max_chars - 3` characters followed by
/// `...`, so for limits of 3 or more the result never exceeds `max_chars`.
#[must_use]
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let kept: String = content.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}
