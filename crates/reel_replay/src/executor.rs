//! Replay executor: cursor controls and step dispatch.

mod effects;

use crate::error::{ReplayError, ReplayResult};
use crate::mode::ReplayOptions;
use crate::result::ReplayStepResult;
use crate::session::{ReplaySession, ReplayStep, StepKind};
use crate::state::ReplayExecutionState;
use std::time::Instant;
use tracing::{debug, info};

/// Why a ranged run stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeStop {
    /// The end of the range (or of the session) was reached
    Reached,
    /// A result carried a divergence and `stop_on_divergence` is set
    Divergence {
        /// Cursor index of the divergent step
        index: usize,
    },
    /// A step could not be replayed
    Failed(ReplayError),
}

/// Results of a ranged run, in execution order, and why it stopped
#[derive(Debug, Clone, PartialEq)]
pub struct RangeOutcome<'a> {
    /// Results produced before stopping
    pub results: Vec<ReplayStepResult<'a>>,
    /// Stop reason
    pub stop: RangeStop,
}

impl<'a> RangeOutcome<'a> {
    /// The error that stopped the run, if any
    #[must_use]
    pub fn error(&self) -> Option<&ReplayError> {
        match &self.stop {
            RangeStop::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Convert into a plain result, discarding partial results on failure
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the run
    pub fn into_result(self) -> ReplayResult<Vec<ReplayStepResult<'a>>> {
        match self.stop {
            RangeStop::Failed(err) => Err(err),
            _ => Ok(self.results),
        }
    }
}

/// Drives replay of one recorded session.
///
/// The executor owns its [`ReplayExecutionState`] exclusively. It is
/// synchronous and has no internal concurrency; callers needing shared
/// access must serialize calls themselves.
pub struct ReplayExecutor<'a> {
    session: &'a ReplaySession,
    options: ReplayOptions,
    state: ReplayExecutionState,
}

impl<'a> ReplayExecutor<'a> {
    /// Create an executor with safe default options (ReadOnly)
    #[must_use]
    pub fn new(session: &'a ReplaySession) -> Self {
        Self::with_options(session, ReplayOptions::default())
    }

    /// Create an executor with explicit options
    #[must_use]
    pub fn with_options(session: &'a ReplaySession, options: ReplayOptions) -> Self {
        let mut state = ReplayExecutionState::new(session.id.clone(), &options);
        state.current_step = state.current_step.min(session.len());
        let mut executor = Self {
            session,
            options,
            state,
        };
        executor.check_pause_before();
        executor
    }

    /// Session being replayed
    #[must_use]
    pub fn session(&self) -> &'a ReplaySession {
        self.session
    }

    /// Active options
    #[must_use]
    pub fn options(&self) -> &ReplayOptions {
        &self.options
    }

    /// Current execution state
    #[must_use]
    pub fn state(&self) -> &ReplayExecutionState {
        &self.state
    }

    /// Consume the executor, keeping its final state
    #[must_use]
    pub fn into_state(self) -> ReplayExecutionState {
        self.state
    }

    /// Steps left before the session is exhausted
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.session.len().saturating_sub(self.state.current_step)
    }

    /// Whether every step has been consumed
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }

    /// Execute the step under the cursor and advance by exactly one.
    ///
    /// The cursor advances whether the step completes, is skipped, or fails
    /// to replay, so a bad step can never stall a run.
    ///
    /// # Errors
    ///
    /// Returns `Exhausted` (without touching state) when no steps remain, or
    /// `InvalidStep` when the step cannot be replayed in the active mode
    pub fn execute_next(&mut self) -> ReplayResult<ReplayStepResult<'a>> {
        let session = self.session;
        let index = self.state.current_step;
        let step = session.step(index).ok_or(ReplayError::Exhausted {
            len: session.len(),
        })?;

        if self.options.skip_steps.contains(&index) {
            debug!(index, kind = %step.kind, "skipping step");
            self.state.skipped_steps.push(index);
            self.advance();
            return Ok(ReplayStepResult::skipped(step));
        }

        debug!(index, kind = %step.kind, mode = %self.options.mode, "replaying step");
        let started = Instant::now();
        let outcome = self.dispatch(index, step);
        let elapsed = started.elapsed();
        self.advance();

        let mut result = outcome?;
        result.execution_time = elapsed;
        if self.options.pause_after_steps.contains(&index) {
            self.state.is_paused = true;
        }
        Ok(result)
    }

    /// Execute steps from the cursor through `end_index` inclusive.
    ///
    /// Stops early on a replay error (returned in the outcome alongside the
    /// results produced so far) or, with `stop_on_divergence`, right after
    /// the first divergent result.
    pub fn execute_range(&mut self, end_index: usize) -> RangeOutcome<'a> {
        let mut results = Vec::new();

        while self.state.current_step <= end_index && self.state.current_step < self.session.len()
        {
            let index = self.state.current_step;
            match self.execute_next() {
                Ok(result) => {
                    let diverged = result.has_divergence();
                    results.push(result);
                    if diverged && self.options.stop_on_divergence {
                        info!(index, "stopping range at divergence");
                        return RangeOutcome {
                            results,
                            stop: RangeStop::Divergence { index },
                        };
                    }
                }
                Err(err) => {
                    return RangeOutcome {
                        results,
                        stop: RangeStop::Failed(err),
                    };
                }
            }
        }

        RangeOutcome {
            results,
            stop: RangeStop::Reached,
        }
    }

    /// Execute through `end_at_step`, or the last step when unset
    pub fn run_to_end(&mut self) -> RangeOutcome<'a> {
        let end = self
            .options
            .end_at_step
            .unwrap_or_else(|| self.session.len().saturating_sub(1));
        self.execute_range(end)
    }

    /// Move the cursor to `index` without executing anything
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `index` is not a step of the session
    pub fn jump_to(&mut self, index: usize) -> ReplayResult<()> {
        let len = self.session.len();
        if index >= len {
            return Err(ReplayError::OutOfRange { index, len });
        }
        debug!(from = self.state.current_step, to = index, "jumping");
        self.state.current_step = index;
        self.check_pause_before();
        Ok(())
    }

    /// Set the advisory pause flag
    pub fn pause(&mut self) {
        self.state.is_paused = true;
    }

    /// Clear the advisory pause flag
    pub fn resume(&mut self) {
        self.state.is_paused = false;
    }

    fn advance(&mut self) {
        self.state.current_step += 1;
        self.check_pause_before();
    }

    fn check_pause_before(&mut self) {
        if self
            .options
            .pause_before_steps
            .contains(&self.state.current_step)
        {
            self.state.is_paused = true;
        }
    }

    fn dispatch(
        &mut self,
        index: usize,
        step: &'a ReplayStep,
    ) -> ReplayResult<ReplayStepResult<'a>> {
        match &step.kind {
            StepKind::ModelRequest | StepKind::ModelResponse => {
                Ok(self.replay_model_interaction(step))
            }
            StepKind::FileDiff => self.replay_file_diff(index, step),
            StepKind::FileWrite => self.replay_file_write(index, step),
            StepKind::FileRemove => self.replay_file_remove(index, step),
            StepKind::BuildStart | StepKind::BuildComplete | StepKind::BuildError => {
                self.replay_build_step(index, step)
            }
            StepKind::ContextLoad | StepKind::ContextUpdate => Ok(self.replay_context_step(step)),
            StepKind::UserPrompt | StepKind::MissingFilePrompt => Ok(self.replay_user_prompt(step)),
            StepKind::Error => Ok(self.replay_error_step(step)),
            StepKind::FileMove | StepKind::Other(_) => Ok(self.replay_generic_step(step)),
        }
    }

    // Model traffic is display-only in every mode. There is no path from
    // here to a provider: replay must never re-invoke a model.
    fn replay_model_interaction(&self, step: &'a ReplayStep) -> ReplayStepResult<'a> {
        if let Some(request) = &step.model_request {
            debug!(
                model = %request.model_id,
                input_tokens = request.input_tokens,
                "recorded model request"
            );
        }
        if let Some(response) = &step.model_response {
            debug!(
                output_tokens = response.output_tokens,
                stopped = response.stopped,
                "recorded model response"
            );
        }
        ReplayStepResult::completed(step)
    }

    fn replay_context_step(&self, step: &'a ReplayStep) -> ReplayStepResult<'a> {
        ReplayStepResult::completed(step)
    }

    fn replay_user_prompt(&self, step: &'a ReplayStep) -> ReplayStepResult<'a> {
        ReplayStepResult::completed(step)
    }

    fn replay_error_step(&self, step: &'a ReplayStep) -> ReplayStepResult<'a> {
        ReplayStepResult::failed(step, step.error.clone())
    }

    fn replay_generic_step(&self, step: &'a ReplayStep) -> ReplayStepResult<'a> {
        ReplayStepResult::completed(step)
    }
}
