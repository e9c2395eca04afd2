//! Replay modes and executor options.

use reel_core::CoreResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Default bound on expected/actual text carried by a divergence
pub const DEFAULT_TRUNCATE_LIMIT: usize = 200;

/// Safety scope of a replay run, in increasing order of side effects.
///
/// | Mode     | Tracks file state | Records applied changes | Checks divergence |
/// |----------|-------------------|-------------------------|-------------------|
/// | ReadOnly | no                | no                      | no                |
/// | Simulate | yes (not diffs)   | no                      | yes               |
/// | Apply    | yes               | yes                     | no                |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    /// Display recorded steps and diffs only
    #[default]
    ReadOnly,
    /// Compare recorded expectations against tracked and initial state
    Simulate,
    /// Commit recorded changes to tracked state for an external apply step
    Apply,
}

impl ReplayMode {
    /// Whether this mode can never lead to irreversible effects
    #[must_use]
    pub const fn is_safe(&self) -> bool {
        matches!(self, Self::ReadOnly | Self::Simulate)
    }

    /// Stable name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::Simulate => "simulate",
            Self::Apply => "apply",
        }
    }
}

impl fmt::Display for ReplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read_only" | "read-only" | "readonly" => Ok(Self::ReadOnly),
            "simulate" => Ok(Self::Simulate),
            "apply" => Ok(Self::Apply),
            other => Err(format!("unknown replay mode: {}", other)),
        }
    }
}

/// Executor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayOptions {
    /// Execution mode
    pub mode: ReplayMode,
    /// Cursor position on construction (clamped to the session length)
    pub start_from_step: usize,
    /// Inclusive end used by `run_to_end`; `None` means the last step
    pub end_at_step: Option<usize>,
    /// Step indices that produce a `Skipped` result without dispatch
    pub skip_steps: BTreeSet<usize>,
    /// Indices that set the pause flag when the cursor arrives on them
    pub pause_before_steps: BTreeSet<usize>,
    /// Indices that set the pause flag once they have been executed
    pub pause_after_steps: BTreeSet<usize>,
    /// Advisory flag for a driving UI
    pub auto_advance: bool,
    /// Advisory inter-step delay for a driving UI; the executor never sleeps
    pub step_delay_ms: u64,
    /// Stop a ranged run after the first result carrying a divergence
    pub stop_on_divergence: bool,
    /// Reject carried-forward snapshots whose hash does not match their content
    pub validate_checksums: bool,
    /// Maximum characters of expected/actual content kept in a divergence
    pub truncate_limit: usize,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            mode: ReplayMode::ReadOnly,
            start_from_step: 0,
            end_at_step: None,
            skip_steps: BTreeSet::new(),
            pause_before_steps: BTreeSet::new(),
            pause_after_steps: BTreeSet::new(),
            auto_advance: false,
            step_delay_ms: 0,
            stop_on_divergence: false,
            validate_checksums: true,
            truncate_limit: DEFAULT_TRUNCATE_LIMIT,
        }
    }
}

impl ReplayOptions {
    /// Options for the given mode, everything else default
    #[must_use]
    pub fn new(mode: ReplayMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// The single gate an integrator checks before allowing irreversible effects
    #[must_use]
    pub const fn is_safe_mode(&self) -> bool {
        self.mode.is_safe()
    }

    /// Set mode
    #[must_use]
    pub fn with_mode(mut self, mode: ReplayMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set starting cursor
    #[must_use]
    pub fn starting_at(mut self, index: usize) -> Self {
        self.start_from_step = index;
        self
    }

    /// Set inclusive end for `run_to_end`
    #[must_use]
    pub fn ending_at(mut self, index: usize) -> Self {
        self.end_at_step = Some(index);
        self
    }

    /// Force-skip a step index
    #[must_use]
    pub fn skip(mut self, index: usize) -> Self {
        self.skip_steps.insert(index);
        self
    }

    /// Pause when the cursor reaches `index`
    #[must_use]
    pub fn pause_before(mut self, index: usize) -> Self {
        self.pause_before_steps.insert(index);
        self
    }

    /// Pause once `index` has executed
    #[must_use]
    pub fn pause_after(mut self, index: usize) -> Self {
        self.pause_after_steps.insert(index);
        self
    }

    /// Stop ranged runs at the first divergence
    #[must_use]
    pub fn with_stop_on_divergence(mut self, stop: bool) -> Self {
        self.stop_on_divergence = stop;
        self
    }

    /// Enable auto-advance with an inter-step delay
    #[must_use]
    pub fn with_auto_advance(mut self, delay_ms: u64) -> Self {
        self.auto_advance = true;
        self.step_delay_ms = delay_ms;
        self
    }

    /// Set divergence truncation bound
    #[must_use]
    pub fn with_truncate_limit(mut self, limit: usize) -> Self {
        self.truncate_limit = limit;
        self
    }

    /// Toggle checksum validation of carried-forward snapshots
    #[must_use]
    pub fn with_validate_checksums(mut self, validate: bool) -> Self {
        self.validate_checksums = validate;
        self
    }

    /// Parse options from JSON; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed
    pub fn from_json(json: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_safe() {
        let options = ReplayOptions::default();
        assert_eq!(options.mode, ReplayMode::ReadOnly);
        assert_eq!(options.start_from_step, 0);
        assert_eq!(options.step_delay_ms, 0);
        assert!(options.skip_steps.is_empty());
        assert!(!options.stop_on_divergence);
        assert!(options.validate_checksums);
        assert_eq!(options.truncate_limit, DEFAULT_TRUNCATE_LIMIT);
        assert!(options.is_safe_mode());
    }

    #[test]
    fn test_is_safe_mode() {
        assert!(ReplayOptions::new(ReplayMode::ReadOnly).is_safe_mode());
        assert!(ReplayOptions::new(ReplayMode::Simulate).is_safe_mode());
        assert!(!ReplayOptions::new(ReplayMode::Apply).is_safe_mode());
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("read-only".parse::<ReplayMode>(), Ok(ReplayMode::ReadOnly));
        assert_eq!("read_only".parse::<ReplayMode>(), Ok(ReplayMode::ReadOnly));
        assert_eq!("Simulate".parse::<ReplayMode>(), Ok(ReplayMode::Simulate));
        assert_eq!("apply".parse::<ReplayMode>(), Ok(ReplayMode::Apply));
        assert!("destroy".parse::<ReplayMode>().is_err());
    }

    #[test]
    fn test_builder() {
        let options = ReplayOptions::new(ReplayMode::Simulate)
            .starting_at(2)
            .ending_at(5)
            .skip(3)
            .pause_after(4)
            .with_stop_on_divergence(true)
            .with_auto_advance(250)
            .with_truncate_limit(40);

        assert_eq!(options.start_from_step, 2);
        assert_eq!(options.end_at_step, Some(5));
        assert!(options.skip_steps.contains(&3));
        assert!(options.pause_after_steps.contains(&4));
        assert!(options.stop_on_divergence);
        assert!(options.auto_advance);
        assert_eq!(options.step_delay_ms, 250);
        assert_eq!(options.truncate_limit, 40);
    }

    #[test]
    fn test_from_json_partial() {
        let options = ReplayOptions::from_json(r#"{"mode": "simulate", "skip_steps": [1, 4]}"#)
            .unwrap();
        assert_eq!(options.mode, ReplayMode::Simulate);
        assert_eq!(options.skip_steps.len(), 2);
        assert!(options.validate_checksums);
        assert_eq!(options.truncate_limit, DEFAULT_TRUNCATE_LIMIT);
    }

    #[test]
    fn test_from_json_rejects_unknown_mode() {
        assert!(ReplayOptions::from_json(r#"{"mode": "yolo"}"#).is_err());
    }
}
