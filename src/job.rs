//! Job lifecycle types.
//!
//! The job state machine:
//!
//! ```text
//!   start() ──→ queued ──→ running ──→ succeeded
//!                 │           │
//!                 │           ├──→ failed
//!                 │           │
//!                 └───────────┴──→ stopped
//! ```
//!
//! **Invariants:**
//! - `start()` MUST leave the job in `queued`.
//! - Transitions are monotonic: a job never moves back to an earlier state.
//! - Terminal states (`succeeded`, `failed`, `stopped`) are permanent.
//! - Consumers accept `started`, `success` and `failure` as aliases, case-insensitively;
//!   only the five canonical names are ever produced.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{JobError, JobResult};

/// Iteration budget used when a request does not name one.
pub const DEFAULT_MAX_ITERS: u32 = 3;

/// Opaque identifier for a job within a backend's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(pub String);

impl JobHandle {
    /// Create a new job handle.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the handle as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobHandle {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobHandle {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of a job.
///
/// Serializes to the canonical lowercase name; deserializes through
/// [`FromStr`], so aliases and any casing are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum JobState {
    /// Accepted, waiting to run.
    Queued,
    /// Optimization loop in progress.
    Running,
    /// Finished normally.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Cancelled by a `stop` request.
    Stopped,
}

impl JobState {
    /// Check if this is a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Stopped
        )
    }

    /// Check if the job is still pending (queued or running).
    pub fn is_pending(self) -> bool {
        !self.is_terminal()
    }

    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Stopped => "stopped",
        }
    }

    fn rank(self) -> u8 {
        match self {
            JobState::Queued => 0,
            JobState::Running => 1,
            JobState::Succeeded | JobState::Failed | JobState::Stopped => 2,
        }
    }

    /// Whether a job observed in `self` may later be observed in `next`.
    ///
    /// Re-reading the same state is always allowed. Terminal states admit
    /// nothing else, and nothing may return to an earlier rank.
    pub fn may_advance_to(self, next: JobState) -> bool {
        if self == next {
            return true;
        }
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = JobError;

    fn from_str(s: &str) -> JobResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(JobState::Queued),
            "running" | "started" => Ok(JobState::Running),
            "succeeded" | "success" => Ok(JobState::Succeeded),
            "failed" | "failure" => Ok(JobState::Failed),
            "stopped" => Ok(JobState::Stopped),
            other => Err(JobError::Protocol(format!("unrecognized job state `{other}`"))),
        }
    }
}

impl TryFrom<String> for JobState {
    type Error = JobError;

    fn try_from(s: String) -> JobResult<Self> {
        s.parse()
    }
}

/// Target constraints; every bound is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    /// Upper bound on area (equivalent gates).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_area: Option<f64>,
    /// Lower bound on maximum clock frequency, in MHz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_fmax_mhz: Option<f64>,
    /// Upper bound on power, in mW.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_power_mw: Option<f64>,
}

/// Resource budget for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budgets {
    pub max_iters: u32,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            max_iters: DEFAULT_MAX_ITERS,
        }
    }
}

/// Immutable input to `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Source RTL text.
    #[serde(rename = "original_verilog")]
    pub source: String,
    /// Top-level module name.
    #[serde(rename = "top_module")]
    pub top: String,
    #[serde(default)]
    pub targets: Targets,
    #[serde(default)]
    pub budgets: Budgets,
}

impl JobRequest {
    /// Create a request with no target constraints and the default budget.
    pub fn new(source: impl Into<String>, top: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            top: top.into(),
            targets: Targets::default(),
            budgets: Budgets::default(),
        }
    }

    /// Set the target constraints.
    pub fn with_targets(mut self, targets: Targets) -> Self {
        self.targets = targets;
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iters(mut self, max_iters: u32) -> Self {
        self.budgets.max_iters = max_iters;
        self
    }

    /// Reject requests with empty source text or an empty top module.
    ///
    /// Backends call this before performing any I/O.
    pub fn validate(&self) -> JobResult<()> {
        if self.source.trim().is_empty() {
            return Err(JobError::Validation("source RTL must not be empty".into()));
        }
        if self.top.trim().is_empty() {
            return Err(JobError::Validation("top module must not be empty".into()));
        }
        Ok(())
    }
}
