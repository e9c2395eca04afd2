//! REEL Replay Executor
//!
//! Deterministic, step-by-step replay of recorded agent sessions under one of
//! three safety-scoped modes, with content-hash divergence detection.
//!
//! The executor is pure bookkeeping: it never performs network I/O, never
//! runs commands, and never reads or writes workspace files.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod divergence;
pub mod error;
pub mod executor;
pub mod mode;
pub mod report;
pub mod result;
pub mod session;
pub mod state;

pub use divergence::{DivergenceDetector, truncate_content};
pub use error::{ReplayError, ReplayResult};
pub use executor::{RangeOutcome, RangeStop, ReplayExecutor};
pub use mode::{DEFAULT_TRUNCATE_LIMIT, ReplayMode, ReplayOptions};
pub use report::ReplayReport;
pub use result::{DivergenceKind, ReplayDivergence, ReplayStepResult, StepStatus};
pub use session::{
    BuildInfo, ModelRequest, ModelResponse, ReplayDiff, ReplayFileSnapshot, ReplayMessage,
    ReplaySession, ReplaySessionSummary, ReplayStep, SessionStatus, StepKind,
};
pub use state::ReplayExecutionState;
