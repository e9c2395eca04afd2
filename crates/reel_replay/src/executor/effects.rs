//! Mode-scoped file effects: diff, write, remove and build steps.
//!
//! Each handler switches on the mode explicitly. ReadOnly never touches
//! tracked state, Simulate tracks (except on the diff path, where it only
//! checks for divergence) and Apply tracks and records applied paths.

use super::ReplayExecutor;
use crate::divergence::DivergenceDetector;
use crate::error::{ReplayError, ReplayResult};
use crate::mode::ReplayMode;
use crate::result::ReplayStepResult;
use crate::session::{ReplayFileSnapshot, ReplayStep};
use tracing::{info, warn};

impl<'a> ReplayExecutor<'a> {
    pub(super) fn replay_file_diff(
        &mut self,
        index: usize,
        step: &'a ReplayStep,
    ) -> ReplayResult<ReplayStepResult<'a>> {
        let mut result = ReplayStepResult::completed(step);
        let Some(diff) = &step.file_diff else {
            return Ok(result);
        };

        match self.options.mode {
            ReplayMode::ReadOnly => {}
            ReplayMode::Simulate => {
                require_path(index, &diff.path)?;
                let detector = DivergenceDetector::new(
                    &self.session.initial_file_snapshots,
                    &self.state.current_files,
                    self.options.truncate_limit,
                );
                let found = detector.check(index, &diff.path, &diff.old_content);
                if let Some(divergence) = found {
                    info!(index, path = %diff.path, "divergence detected");
                    self.state.record_divergence(divergence.clone());
                    result.divergence = Some(divergence);
                }
            }
            ReplayMode::Apply => {
                require_path(index, &diff.path)?;
                self.state.track(ReplayFileSnapshot::from_content(
                    diff.path.as_str(),
                    diff.new_content.as_str(),
                ));
                self.state.record_applied(&diff.path);
            }
        }

        result.file_changes.push(diff.clone());
        Ok(result)
    }

    pub(super) fn replay_file_write(
        &mut self,
        index: usize,
        step: &'a ReplayStep,
    ) -> ReplayResult<ReplayStepResult<'a>> {
        let mut result = ReplayStepResult::completed(step);
        result.file_changes.extend(step.file_diff.iter().cloned());

        if self.options.mode == ReplayMode::ReadOnly {
            return Ok(result);
        }
        let Some(path) = step.file_path() else {
            return Ok(result);
        };
        require_path(index, path)?;

        let recorded = step
            .file_diff
            .as_ref()
            .map(|d| d.new_content.as_str())
            .or_else(|| {
                step.build_info
                    .as_ref()
                    .and_then(|b| b.after_snapshot.as_ref())
                    .and_then(|s| s.content.as_deref())
            });
        let snapshot = match recorded {
            Some(content) => ReplayFileSnapshot::from_content(path, content),
            None => ReplayFileSnapshot::placeholder(path),
        };

        self.state.track(snapshot);
        if self.options.mode == ReplayMode::Apply {
            self.state.record_applied(path);
        }
        Ok(result)
    }

    pub(super) fn replay_file_remove(
        &mut self,
        index: usize,
        step: &'a ReplayStep,
    ) -> ReplayResult<ReplayStepResult<'a>> {
        let mut result = ReplayStepResult::completed(step);
        result.file_changes.extend(step.file_diff.iter().cloned());

        if self.options.mode == ReplayMode::ReadOnly {
            return Ok(result);
        }
        let Some(path) = step.file_path() else {
            return Ok(result);
        };
        require_path(index, path)?;

        self.state.track(ReplayFileSnapshot::missing(path));
        if self.options.mode == ReplayMode::Apply {
            self.state.record_applied(path);
        }
        Ok(result)
    }

    /// Build steps carry forward the recorded after-snapshot rather than
    /// recomputing one, and only when the recorded build succeeded.
    pub(super) fn replay_build_step(
        &mut self,
        index: usize,
        step: &'a ReplayStep,
    ) -> ReplayResult<ReplayStepResult<'a>> {
        let mut result = ReplayStepResult::completed(step);
        let Some(build) = &step.build_info else {
            return Ok(result);
        };
        result.file_changes.extend(build.diff.iter().cloned());

        if self.options.mode == ReplayMode::ReadOnly || !build.success {
            return Ok(result);
        }
        let Some(after) = &build.after_snapshot else {
            return Ok(result);
        };
        require_path(index, &build.path)?;

        if self.options.validate_checksums {
            after.verify().map_err(|e| {
                warn!(index, path = %build.path, error = %e, "rejecting build snapshot");
                ReplayError::InvalidStep {
                    index,
                    reason: e.to_string(),
                }
            })?;
        }

        let snapshot = if build.removed {
            ReplayFileSnapshot::missing(build.path.as_str())
        } else {
            ReplayFileSnapshot {
                path: build.path.clone(),
                exists: true,
                ..after.clone()
            }
        };
        self.state.track(snapshot);
        if self.options.mode == ReplayMode::Apply {
            self.state.record_applied(&build.path);
        }
        Ok(result)
    }
}

fn require_path(index: usize, path: &str) -> ReplayResult<()> {
    if path.is_empty() {
        warn!(index, "file step has an empty path");
        return Err(ReplayError::InvalidStep {
            index,
            reason: "file step has an empty path".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::error::ReplayError;
    use crate::executor::ReplayExecutor;
    use crate::mode::{ReplayMode, ReplayOptions};
    use crate::result::DivergenceKind;
    use crate::session::{
        BuildInfo, ReplayDiff, ReplayFileSnapshot, ReplaySession, ReplayStep, StepKind,
    };
    use reel_core::Hash;

    fn run(session: &ReplaySession, mode: ReplayMode) -> ReplayExecutor<'_> {
        let mut executor = ReplayExecutor::with_options(session, ReplayOptions::new(mode));
        executor
            .execute_range(session.len().saturating_sub(1))
            .into_result()
            .unwrap();
        executor
    }

    fn diff_session(path: &str, old: &str, new: &str) -> ReplaySession {
        ReplaySession::new("diff").with_step(
            ReplayStep::new(0, StepKind::FileDiff).with_file_diff(ReplayDiff::new(path, old, new)),
        )
    }

    fn build(path: &str, content: &str) -> BuildInfo {
        BuildInfo {
            path: path.to_string(),
            success: true,
            finished: true,
            before_snapshot: Some(ReplayFileSnapshot::from_content(path, "before")),
            after_snapshot: Some(ReplayFileSnapshot::from_content(path, content)),
            diff: Some(ReplayDiff::new(path, "before", content)),
            ..Default::default()
        }
    }

    fn build_session(info: BuildInfo) -> ReplaySession {
        ReplaySession::new("build")
            .with_step(ReplayStep::new(0, StepKind::BuildComplete).with_build_info(info))
    }

    #[test]
    fn test_diff_read_only_displays_only() {
        let session = diff_session("a.txt", "x", "y");
        let mut executor = ReplayExecutor::new(&session);
        let result = executor.execute_next().unwrap();

        assert_eq!(result.file_changes, vec![ReplayDiff::new("a.txt", "x", "y")]);
        assert!(result.divergence.is_none());
        assert!(executor.state().current_files.is_empty());
        assert!(executor.state().applied_changes.is_empty());
    }

    #[test]
    fn test_diff_read_only_ignores_initial_mismatch() {
        let session = diff_session("a.txt", "x", "y")
            .with_initial_snapshot(ReplayFileSnapshot::from_content("a.txt", "other"));
        let executor = run(&session, ReplayMode::ReadOnly);
        assert!(!executor.state().has_divergences());
    }

    #[test]
    fn test_diff_simulate_matching_initial() {
        let session = diff_session("a.txt", "x", "y")
            .with_initial_snapshot(ReplayFileSnapshot::from_content("a.txt", "x"));
        let executor = run(&session, ReplayMode::Simulate);
        assert!(!executor.state().has_divergences());
        assert!(executor.state().current_files.is_empty());
    }

    #[test]
    fn test_diff_simulate_mismatched_initial() {
        let session = diff_session("a.txt", "x", "y")
            .with_initial_snapshot(ReplayFileSnapshot::from_content("a.txt", "changed"));
        let mut executor =
            ReplayExecutor::with_options(&session, ReplayOptions::new(ReplayMode::Simulate));
        let result = executor.execute_next().unwrap();

        let divergence = result.divergence.unwrap();
        assert_eq!(divergence.kind, DivergenceKind::ContentMismatch);
        assert_eq!(divergence.step_index, 0);
        assert_eq!(executor.state().divergences.len(), 1);
        assert_eq!(result.file_changes.len(), 1);
        assert!(executor.state().current_files.is_empty());
    }

    #[test]
    fn test_diff_simulate_uses_configured_truncation() {
        let long = "x".repeat(100);
        let session = diff_session("a.txt", long.as_str(), "y")
            .with_initial_snapshot(ReplayFileSnapshot::from_content("a.txt", "z"));
        let options = ReplayOptions::new(ReplayMode::Simulate).with_truncate_limit(10);
        let mut executor = ReplayExecutor::with_options(&session, options);

        let divergence = executor.execute_next().unwrap().divergence.unwrap();
        assert_eq!(divergence.expected, "xxxxxxx...");
    }

    #[test]
    fn test_diff_apply_tracks_new_content() {
        let session = diff_session("a.txt", "x", "y");
        let executor = run(&session, ReplayMode::Apply);
        let tracked = executor.state().tracked("a.txt").unwrap();

        assert_eq!(tracked.content.as_deref(), Some("y"));
        assert!(tracked.has_hash(&Hash::of_str("y")));
        assert_eq!(tracked.size, 1);
        assert!(tracked.exists);
        assert_eq!(executor.state().applied_changes, vec!["a.txt"]);
    }

    #[test]
    fn test_diff_apply_rejects_empty_path() {
        let session = diff_session("", "x", "y");
        let mut executor =
            ReplayExecutor::with_options(&session, ReplayOptions::new(ReplayMode::Apply));
        assert!(matches!(
            executor.execute_next(),
            Err(ReplayError::InvalidStep { index: 0, .. })
        ));
        assert!(executor.state().current_files.is_empty());
    }

    #[test]
    fn test_diff_step_without_payload_completes() {
        let mut session = ReplaySession::new("bare");
        session.push_step(StepKind::FileDiff);
        let executor = run(&session, ReplayMode::Apply);
        assert!(executor.state().applied_changes.is_empty());
    }

    #[test]
    fn test_write_tracks_in_simulate_and_apply() {
        let session = ReplaySession::new("write").with_step(
            ReplayStep::new(0, StepKind::FileWrite).with_build_info(BuildInfo {
                path: "out.rs".to_string(),
                ..Default::default()
            }),
        );

        let read_only = run(&session, ReplayMode::ReadOnly);
        assert!(read_only.state().current_files.is_empty());

        let simulate = run(&session, ReplayMode::Simulate);
        let tracked = simulate.state().tracked("out.rs").unwrap();
        assert!(tracked.exists);
        assert!(tracked.has_hash(&Hash::of_str("out.rs")));
        assert!(simulate.state().applied_changes.is_empty());

        let apply = run(&session, ReplayMode::Apply);
        assert!(apply.state().tracked("out.rs").is_some());
        assert_eq!(apply.state().applied_changes, vec!["out.rs"]);
    }

    #[test]
    fn test_write_prefers_recorded_content() {
        let session = ReplaySession::new("write").with_step(
            ReplayStep::new(0, StepKind::FileWrite)
                .with_file_diff(ReplayDiff::new("a.txt", "", "hello")),
        );
        let executor = run(&session, ReplayMode::Simulate);
        let tracked = executor.state().tracked("a.txt").unwrap();
        assert_eq!(tracked.content.as_deref(), Some("hello"));
    }

    #[test]
    fn test_write_then_diff_simulate_sees_tracked_state() {
        let session = ReplaySession::new("write-diff")
            .with_step(
                ReplayStep::new(0, StepKind::FileWrite)
                    .with_file_diff(ReplayDiff::new("a.txt", "", "hello")),
            )
            .with_step(
                ReplayStep::new(0, StepKind::FileDiff)
                    .with_file_diff(ReplayDiff::new("a.txt", "goodbye", "x")),
            );
        let executor = run(&session, ReplayMode::Simulate);

        let divergence = &executor.state().divergences[0];
        assert_eq!(divergence.step_index, 1);
        assert_eq!(divergence.actual, "hello");
        assert_eq!(divergence.description, "File content differs: a.txt");
    }

    #[test]
    fn test_remove_marks_missing() {
        let session = ReplaySession::new("rm").with_step(
            ReplayStep::new(0, StepKind::FileRemove).with_build_info(BuildInfo {
                path: "old.rs".to_string(),
                ..Default::default()
            }),
        );

        assert!(run(&session, ReplayMode::ReadOnly)
            .state()
            .current_files
            .is_empty());

        let simulate = run(&session, ReplayMode::Simulate);
        assert!(!simulate.state().tracked("old.rs").unwrap().exists);
        assert!(simulate.state().applied_changes.is_empty());

        let apply = run(&session, ReplayMode::Apply);
        assert!(!apply.state().tracked("old.rs").unwrap().exists);
        assert_eq!(apply.state().applied_changes, vec!["old.rs"]);
    }

    #[test]
    fn test_build_carries_after_snapshot() {
        let session = build_session(build("src/main.rs", "fn main() {}"));
        let apply = run(&session, ReplayMode::Apply);

        let tracked = apply.state().tracked("src/main.rs").unwrap();
        assert_eq!(tracked.content.as_deref(), Some("fn main() {}"));
        assert!(tracked.has_hash(&Hash::of_str("fn main() {}")));
        assert_eq!(apply.state().applied_changes, vec!["src/main.rs"]);

        let simulate = run(&session, ReplayMode::Simulate);
        assert!(simulate.state().tracked("src/main.rs").is_some());
        assert!(simulate.state().applied_changes.is_empty());
    }

    #[test]
    fn test_build_read_only_displays_diff() {
        let session = build_session(build("a.rs", "new"));
        let mut executor = ReplayExecutor::new(&session);
        let result = executor.execute_next().unwrap();
        assert_eq!(result.file_changes.len(), 1);
        assert!(executor.state().current_files.is_empty());
    }

    #[test]
    fn test_failed_build_is_not_tracked() {
        let session = build_session(BuildInfo {
            success: false,
            error: Some("syntax error".to_string()),
            ..build("a.rs", "broken")
        });
        let apply = run(&session, ReplayMode::Apply);
        assert!(apply.state().current_files.is_empty());
        assert!(apply.state().applied_changes.is_empty());
    }

    #[test]
    fn test_removed_build_tracks_missing() {
        let session = build_session(BuildInfo {
            removed: true,
            ..build("gone.rs", "")
        });
        let apply = run(&session, ReplayMode::Apply);
        assert!(!apply.state().tracked("gone.rs").unwrap().exists);
    }

    #[test]
    fn test_build_checksum_validation() {
        let mut info = build("a.rs", "real");
        if let Some(after) = info.after_snapshot.as_mut() {
            after.content_hash = Some(Hash::of_str("forged"));
        }
        let session = build_session(info);

        let mut strict =
            ReplayExecutor::with_options(&session, ReplayOptions::new(ReplayMode::Apply));
        assert!(matches!(
            strict.execute_next(),
            Err(ReplayError::InvalidStep { index: 0, .. })
        ));
        assert!(strict.state().current_files.is_empty());
        assert_eq!(strict.state().current_step, 1);

        let lenient = ReplayOptions::new(ReplayMode::Apply).with_validate_checksums(false);
        let mut executor = ReplayExecutor::with_options(&session, lenient);
        executor.execute_next().unwrap();
        assert!(executor
            .state()
            .tracked("a.rs")
            .unwrap()
            .has_hash(&Hash::of_str("forged")));
    }

    #[test]
    fn test_diff_simulate_hashless_initial_snapshot() {
        let mut initial = ReplayFileSnapshot::from_content("a.txt", "x");
        initial.content_hash = None;
        let session = diff_session("a.txt", "x", "y").with_initial_snapshot(initial);

        let executor = run(&session, ReplayMode::Simulate);
        assert!(!executor.state().has_divergences());
    }

    #[test]
    fn test_lenient_hashless_build_snapshot_compares_by_content() {
        let mut info = build("a.rs", "built");
        if let Some(after) = info.after_snapshot.as_mut() {
            after.content_hash = None;
        }
        let session = build_session(info)
            .with_step(
                ReplayStep::new(0, StepKind::FileDiff)
                    .with_file_diff(ReplayDiff::new("a.rs", "built", "edited")),
            )
            .with_step(
                ReplayStep::new(0, StepKind::FileDiff)
                    .with_file_diff(ReplayDiff::new("a.rs", "stale", "edited")),
            );

        let strict = ReplayOptions::new(ReplayMode::Simulate);
        let mut executor = ReplayExecutor::with_options(&session, strict);
        assert!(matches!(
            executor.execute_next(),
            Err(ReplayError::InvalidStep { index: 0, .. })
        ));

        let lenient = ReplayOptions::new(ReplayMode::Simulate).with_validate_checksums(false);
        let mut executor = ReplayExecutor::with_options(&session, lenient);
        let results = executor.execute_range(2).into_result().unwrap();

        assert!(results[1].divergence.is_none());
        let divergence = results[2].divergence.as_ref().unwrap();
        assert_eq!(divergence.step_index, 2);
        assert_eq!(divergence.actual, "built");
        assert_eq!(executor.state().divergences.len(), 1);
    }
}
