//! Recorded session data model.
//!
//! A session is produced by a recorder during a live agent run and is
//! read-only to the executor. Steps are replayed in the order they appear.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use reel_core::{CoreError, CoreResult, Hash, SESSION_FORMAT_VERSION, SessionId, StepId, Version};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Lifecycle status of a recorded session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Still being recorded
    Recording,
    /// Recording finished normally
    #[default]
    Completed,
    /// Recorded run ended in failure
    Failed,
    /// Being replayed
    Replaying,
    /// Replay paused
    Paused,
}

/// Kind of a recorded step.
///
/// Unknown kinds written by newer recorders deserialize into `Other` and are
/// replayed by the generic pass-through handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepKind {
    /// Outbound model request
    ModelRequest,
    /// Model response
    ModelResponse,
    /// File change with recorded before/after content
    FileDiff,
    /// File written
    FileWrite,
    /// File removed
    FileRemove,
    /// File moved or renamed
    FileMove,
    /// Build started
    BuildStart,
    /// Build finished
    BuildComplete,
    /// Build failed
    BuildError,
    /// Context loaded
    ContextLoad,
    /// Context updated
    ContextUpdate,
    /// User prompt
    UserPrompt,
    /// Prompt about a missing file
    MissingFilePrompt,
    /// Recorded failure
    Error,
    /// Kind this build does not know about
    Other(String),
}

impl StepKind {
    /// Stable wire name
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ModelRequest => "model_request",
            Self::ModelResponse => "model_response",
            Self::FileDiff => "file_diff",
            Self::FileWrite => "file_write",
            Self::FileRemove => "file_remove",
            Self::FileMove => "file_move",
            Self::BuildStart => "build_start",
            Self::BuildComplete => "build_complete",
            Self::BuildError => "build_error",
            Self::ContextLoad => "context_load",
            Self::ContextUpdate => "context_update",
            Self::UserPrompt => "user_prompt",
            Self::MissingFilePrompt => "missing_file_prompt",
            Self::Error => "error",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for StepKind {
    fn from(name: &str) -> Self {
        match name {
            "model_request" => Self::ModelRequest,
            "model_response" => Self::ModelResponse,
            "file_diff" => Self::FileDiff,
            "file_write" => Self::FileWrite,
            "file_remove" => Self::FileRemove,
            "file_move" => Self::FileMove,
            "build_start" => Self::BuildStart,
            "build_complete" => Self::BuildComplete,
            "build_error" => Self::BuildError,
            "context_load" => Self::ContextLoad,
            "context_update" => Self::ContextUpdate,
            "user_prompt" => Self::UserPrompt,
            "missing_file_prompt" => Self::MissingFilePrompt,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for StepKind {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<StepKind> for String {
    fn from(kind: StepKind) -> Self {
        match kind {
            StepKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time observation of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayFileSnapshot {
    /// File path, relative to the workspace root
    pub path: String,
    /// Content, absent when only the hash was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Content hash; canonical for comparisons
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<Hash>,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Whether the file existed
    #[serde(default = "default_true")]
    pub exists: bool,
    /// When the observation was made
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl ReplayFileSnapshot {
    /// Snapshot of an existing file with known content
    #[must_use]
    pub fn from_content(path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            path: path.into(),
            content_hash: Some(Hash::of_str(&content)),
            size: content.len() as u64,
            content: Some(content),
            exists: true,
            captured_at: Utc::now(),
        }
    }

    /// Snapshot of an existing file whose content was not recorded.
    ///
    /// The hash is derived from the path so the entry still compares as a
    /// concrete value.
    #[must_use]
    pub fn placeholder(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            content_hash: Some(Hash::of_str(&path)),
            path,
            content: None,
            size: 0,
            exists: true,
            captured_at: Utc::now(),
        }
    }

    /// Snapshot of a file that does not exist
    #[must_use]
    pub fn missing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: None,
            content_hash: None,
            size: 0,
            exists: false,
            captured_at: Utc::now(),
        }
    }

    /// Recorded hash, or the hash of the recorded content when only the
    /// content was kept
    #[must_use]
    pub fn effective_hash(&self) -> Option<Hash> {
        self.content_hash
            .or_else(|| self.content.as_deref().map(Hash::of_str))
    }

    /// Whether this snapshot's effective hash equals `hash`
    #[must_use]
    pub fn has_hash(&self, hash: &Hash) -> bool {
        self.effective_hash().as_ref() == Some(hash)
    }

    /// Check that the recorded hash matches the recorded content
    ///
    /// # Errors
    ///
    /// Returns `HashMismatch` if content is present and hashes differently
    pub fn verify(&self) -> CoreResult<()> {
        let Some(content) = &self.content else {
            return Ok(());
        };
        let actual = Hash::of_str(content);
        match &self.content_hash {
            Some(recorded) if *recorded == actual => Ok(()),
            recorded => Err(CoreError::HashMismatch {
                subject: self.path.clone(),
                expected: recorded.as_ref().map(Hash::to_hex).unwrap_or_default(),
                actual: actual.to_hex(),
            }),
        }
    }
}

/// Recorded change to one file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayDiff {
    /// File path
    pub path: String,
    /// Content before the change
    pub old_content: String,
    /// Content after the change
    pub new_content: String,
    /// Unified diff text, if the recorder produced one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unified_diff: Option<String>,
    /// Individual hunks
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hunks: Vec<String>,
}

impl ReplayDiff {
    /// Diff from old to new content
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        old_content: impl Into<String>,
        new_content: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            old_content: old_content.into(),
            new_content: new_content.into(),
            unified_diff: None,
            hunks: Vec::new(),
        }
    }
}

/// One conversation message sent to a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayMessage {
    /// Role (system, user, assistant)
    pub role: String,
    /// Message text
    pub content: String,
}

/// Recorded model request metadata
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelRequest {
    /// Display name of the model
    pub model_name: String,
    /// Provider model id
    pub model_id: String,
    /// Provider name
    pub provider: String,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Nucleus sampling
    pub top_p: Option<f32>,
    /// Output token cap
    pub max_tokens: Option<u32>,
    /// Tokens sent
    pub input_tokens: u64,
    /// System prompt
    pub system_prompt: Option<String>,
    /// Conversation messages
    pub messages: Vec<ReplayMessage>,
    /// Stop sequences
    pub stop: Vec<String>,
}

/// Recorded model response metadata
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelResponse {
    /// Response text
    pub content: String,
    /// Provider finish reason
    pub finish_reason: Option<String>,
    /// Tokens sent
    pub input_tokens: u64,
    /// Tokens received
    pub output_tokens: u64,
    /// Total tokens billed
    pub total_tokens: u64,
    /// Input tokens served from cache
    pub cached_input_tokens: u64,
    /// Whether the stream was stopped early
    pub stopped: bool,
    /// Provider error text
    pub error: Option<String>,
}

/// Recorded build of one file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildInfo {
    /// Target file
    pub path: String,
    /// Tokens consumed by the build
    pub num_tokens: u64,
    /// Whether the build finished
    pub finished: bool,
    /// Whether the build removed the file
    pub removed: bool,
    /// Whether the build succeeded
    pub success: bool,
    /// Build error text
    pub error: Option<String>,
    /// File before the build
    pub before_snapshot: Option<ReplayFileSnapshot>,
    /// File after the build
    pub after_snapshot: Option<ReplayFileSnapshot>,
    /// Change produced by the build
    pub diff: Option<ReplayDiff>,
}

/// One recorded step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayStep {
    /// Step id
    pub id: StepId,
    /// Step number; unique in the session and equal to its position
    pub step_number: usize,
    /// Step kind
    #[serde(rename = "type")]
    pub kind: StepKind,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// When the step started during recording
    #[serde(default = "Utc::now")]
    pub started_at: DateTime<Utc>,
    /// When the step finished during recording
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Model request payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_request: Option<ModelRequest>,
    /// Model response payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_response: Option<ModelResponse>,
    /// File diff payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_diff: Option<ReplayDiff>,
    /// Build payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_info: Option<BuildInfo>,
    /// Context files loaded or updated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_files: Vec<String>,
    /// Prompt text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
    /// Error text for error steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Recorder metadata
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, serde_json::Value>,
}

impl ReplayStep {
    /// Create a bare step
    #[must_use]
    pub fn new(step_number: usize, kind: StepKind) -> Self {
        Self {
            id: StepId::generate(),
            step_number,
            kind,
            description: String::new(),
            started_at: Utc::now(),
            completed_at: None,
            model_request: None,
            model_response: None,
            file_diff: None,
            build_info: None,
            context_files: Vec::new(),
            user_prompt: None,
            error: None,
            metadata: IndexMap::new(),
        }
    }

    /// Set description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach a file diff
    #[must_use]
    pub fn with_file_diff(mut self, diff: ReplayDiff) -> Self {
        self.file_diff = Some(diff);
        self
    }

    /// Attach build info
    #[must_use]
    pub fn with_build_info(mut self, build: BuildInfo) -> Self {
        self.build_info = Some(build);
        self
    }

    /// Attach a model request
    #[must_use]
    pub fn with_model_request(mut self, request: ModelRequest) -> Self {
        self.model_request = Some(request);
        self
    }

    /// Attach a model response
    #[must_use]
    pub fn with_model_response(mut self, response: ModelResponse) -> Self {
        self.model_response = Some(response);
        self
    }

    /// Attach prompt text
    #[must_use]
    pub fn with_user_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.user_prompt = Some(prompt.into());
        self
    }

    /// Attach error text
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Whether replaying this step changes files
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        match self.kind {
            StepKind::FileDiff
            | StepKind::FileWrite
            | StepKind::FileRemove
            | StepKind::FileMove => true,
            StepKind::BuildComplete => self.build_info.as_ref().is_some_and(|b| b.success),
            _ => false,
        }
    }

    /// Whether this step records model traffic
    #[must_use]
    pub fn is_model_interaction(&self) -> bool {
        matches!(self.kind, StepKind::ModelRequest | StepKind::ModelResponse)
    }

    /// Recorded duration; zero if the step never finished
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.completed_at
            .and_then(|end| (end - self.started_at).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    /// The file this step touches, if any
    #[must_use]
    pub fn file_path(&self) -> Option<&str> {
        self.file_diff
            .as_ref()
            .map(|d| d.path.as_str())
            .or_else(|| self.build_info.as_ref().map(|b| b.path.as_str()))
    }
}

/// A complete recorded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySession {
    /// Session id
    pub id: SessionId,
    /// Journal format version
    #[serde(default)]
    pub version: Version,
    /// Recording status
    #[serde(default)]
    pub status: SessionStatus,
    /// Prompt that started the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_prompt: Option<String>,
    /// When recording started
    #[serde(default = "Utc::now")]
    pub started_at: DateTime<Utc>,
    /// When recording finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Steps in replay order
    #[serde(default)]
    pub steps: Vec<ReplayStep>,
    /// Workspace files as they were when recording began, keyed by path
    #[serde(default)]
    pub initial_file_snapshots: IndexMap<String, ReplayFileSnapshot>,
    /// Recorder metadata
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, serde_json::Value>,
}

impl ReplaySession {
    /// Create an empty session
    #[must_use]
    pub fn new(id: impl Into<SessionId>) -> Self {
        Self {
            id: id.into(),
            version: SESSION_FORMAT_VERSION,
            status: SessionStatus::Recording,
            initial_prompt: None,
            started_at: Utc::now(),
            completed_at: None,
            steps: Vec::new(),
            initial_file_snapshots: IndexMap::new(),
            metadata: IndexMap::new(),
        }
    }

    /// Record the initial state of a file
    #[must_use]
    pub fn with_initial_snapshot(mut self, snapshot: ReplayFileSnapshot) -> Self {
        self.initial_file_snapshots
            .insert(snapshot.path.clone(), snapshot);
        self
    }

    /// Append a step, numbering it by position
    pub fn push_step(&mut self, kind: StepKind) -> &mut ReplayStep {
        let step_number = self.steps.len();
        self.steps.push(ReplayStep::new(step_number, kind));
        let last = self.steps.len() - 1;
        &mut self.steps[last]
    }

    /// Append a fully-built step, renumbering it by position
    #[must_use]
    pub fn with_step(mut self, mut step: ReplayStep) -> Self {
        step.step_number = self.steps.len();
        self.steps.push(step);
        self
    }

    /// Mark recording as finished
    pub fn finish(&mut self, status: SessionStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the session has no steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at a cursor index
    #[must_use]
    pub fn step(&self, index: usize) -> Option<&ReplayStep> {
        self.steps.get(index)
    }

    /// Initial snapshot for a path
    #[must_use]
    pub fn initial_snapshot(&self, path: &str) -> Option<&ReplayFileSnapshot> {
        self.initial_file_snapshots.get(path)
    }

    /// Check structural invariants of a recorded session
    ///
    /// # Errors
    ///
    /// Returns error on an incompatible journal version, duplicate step
    /// numbers, a snapshot keyed under the wrong path, or a snapshot whose
    /// hash does not match its content
    pub fn validate(&self) -> CoreResult<()> {
        if !SESSION_FORMAT_VERSION.is_compatible_with(&self.version) {
            return Err(CoreError::IncompatibleVersion {
                supported: SESSION_FORMAT_VERSION.to_string(),
                found: self.version.to_string(),
            });
        }

        let mut seen = HashSet::with_capacity(self.steps.len());
        for step in &self.steps {
            if !seen.insert(step.step_number) {
                return Err(CoreError::validation(
                    "steps",
                    format!("duplicate step number {}", step.step_number),
                ));
            }
            if let Some(build) = &step.build_info {
                for snapshot in build.before_snapshot.iter().chain(&build.after_snapshot) {
                    snapshot.verify()?;
                }
            }
        }

        for (path, snapshot) in &self.initial_file_snapshots {
            if *path != snapshot.path {
                return Err(CoreError::validation(
                    "initial_file_snapshots",
                    format!("snapshot for {} is keyed under {}", snapshot.path, path),
                ));
            }
            snapshot.verify()?;
        }

        Ok(())
    }

    /// Load and validate a session journal
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or validated
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoreError::io(format!("read {}", path.display()), &e))?;
        let session: Self = serde_json::from_str(&text)?;
        session.validate()?;
        Ok(session)
    }

    /// Write the session journal as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails
    pub fn save(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| CoreError::io(format!("write {}", path.display()), &e))
    }

    /// Lightweight summary for listings
    #[must_use]
    pub fn summary(&self) -> ReplaySessionSummary {
        let mut summary = ReplaySessionSummary {
            id: self.id.clone(),
            status: self.status,
            initial_prompt: self.initial_prompt.clone(),
            total_steps: self.steps.len(),
            model_calls: 0,
            input_tokens: 0,
            output_tokens: 0,
            file_steps: 0,
            has_errors: self.status == SessionStatus::Failed,
            started_at: self.started_at,
            duration_ms: self
                .completed_at
                .and_then(|end| (end - self.started_at).to_std().ok())
                .map(|d| d.as_millis() as u64),
        };

        for step in &self.steps {
            if step.kind == StepKind::ModelRequest {
                summary.model_calls += 1;
            }
            if let Some(response) = &step.model_response {
                summary.input_tokens += response.input_tokens;
                summary.output_tokens += response.output_tokens;
            }
            if step.is_destructive() {
                summary.file_steps += 1;
            }
            if step.kind == StepKind::Error || step.kind == StepKind::BuildError {
                summary.has_errors = true;
            }
        }

        summary
    }
}

/// Summary of a session for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySessionSummary {
    /// Session id
    pub id: SessionId,
    /// Recording status
    pub status: SessionStatus,
    /// Prompt that started the run
    pub initial_prompt: Option<String>,
    /// Number of steps
    pub total_steps: usize,
    /// Number of model requests
    pub model_calls: usize,
    /// Input tokens across responses
    pub input_tokens: u64,
    /// Output tokens across responses
    pub output_tokens: u64,
    /// Steps that change files
    pub file_steps: usize,
    /// Whether the run recorded any failure
    pub has_errors: bool,
    /// When recording started
    pub started_at: DateTime<Utc>,
    /// Recording duration, if finished
    pub duration_ms: Option<u64>,
}
