//! In-memory simulated backend.
//!
//! Every `start` inserts a job in `queued` and spawns a driver task that walks
//! it through a fixed script on the tokio timer:
//!
//! ```text
//!   t0                queued
//!   t0 + 1s           running           (log appended)
//!   t0 + 3s           iteration 1,      (synthetic best result, log appended)
//!   t0 + 5s           succeeded         (log appended)
//! ```
//!
//! Each job owns a [`CancellationToken`] (child of the backend's token).
//! `stop` cancels it under the same lock that guards the job table, and the
//! driver re-checks it under that lock before applying a step, so a stopped
//! job can never be flipped to a later state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use crate::backend::JobBackend;
use crate::error::{JobError, JobResult};
use crate::job::{JobHandle, JobRequest, JobState};
use crate::result::{BestResult, JobStatusSnapshot, PpaMetrics};

/// Delay before a queued job starts running.
pub const RUNNING_DELAY: Duration = Duration::from_secs(1);
/// Delay between running and the first best result.
pub const RESULT_DELAY: Duration = Duration::from_secs(2);
/// Delay between the first best result and success.
pub const FINISH_DELAY: Duration = Duration::from_secs(2);

const CANDIDATE_BANNER: &str = "// optimized by simulator (iteration 1)";

type JobTable = Arc<Mutex<FxHashMap<JobHandle, SimulatedJob>>>;

struct SimulatedJob {
    snapshot: JobStatusSnapshot,
    transitions: CancellationToken,
}

/// One scripted self-transition.
#[derive(Debug, Clone, Copy)]
enum Step {
    Run,
    Improve,
    Finish,
}

impl Step {
    const SCRIPT: [Step; 3] = [Step::Run, Step::Improve, Step::Finish];

    fn delay(self) -> Duration {
        match self {
            Step::Run => RUNNING_DELAY,
            Step::Improve => RESULT_DELAY,
            Step::Finish => FINISH_DELAY,
        }
    }

    fn apply(self, snapshot: &mut JobStatusSnapshot, request: &JobRequest) {
        match self {
            Step::Run => {
                snapshot.state = JobState::Running;
                append_log(snapshot, "optimization started");
            }
            Step::Improve => {
                snapshot.iteration = 1;
                snapshot.best_result = Some(synthetic_result(request));
                append_log(snapshot, "iteration 1: candidate accepted");
            }
            Step::Finish => {
                snapshot.state = JobState::Succeeded;
                append_log(snapshot, "optimization finished");
            }
        }
    }
}

/// Backend that runs jobs against an in-process table.
pub struct SimulatedBackend {
    jobs: JobTable,
    next_id: Mutex<u64>,
    cancel: CancellationToken,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(Mutex::new(FxHashMap::default())),
            next_id: Mutex::new(0),
            cancel: CancellationToken::new(),
        }
    }

    fn jobs(&self) -> MutexGuard<'_, FxHashMap<JobHandle, SimulatedJob>> {
        lock(&self.jobs)
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SimulatedBackend {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl JobBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn start(&self, request: &JobRequest) -> JobResult<JobHandle> {
        request.validate()?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| JobError::BackendUnavailable(format!("no async runtime: {e}")))?;

        let handle = {
            let mut next = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
            *next += 1;
            JobHandle::new(format!("sim-{}", *next))
        };

        let transitions = self.cancel.child_token();
        self.jobs().insert(
            handle.clone(),
            SimulatedJob {
                snapshot: JobStatusSnapshot::queued(),
                transitions: transitions.clone(),
            },
        );

        tracing::debug!(handle = %handle, top = %request.top, "Simulated job queued");
        runtime.spawn(drive(
            Arc::clone(&self.jobs),
            handle.clone(),
            request.clone(),
            transitions,
        ));

        Ok(handle)
    }

    async fn status(&self, handle: &JobHandle) -> JobResult<JobStatusSnapshot> {
        self.jobs()
            .get(handle)
            .map(|job| job.snapshot.clone())
            .ok_or_else(|| JobError::UnknownHandle(handle.0.clone()))
    }

    async fn stop(&self, handle: &JobHandle) -> JobResult<()> {
        let mut jobs = self.jobs();
        let job = jobs
            .get_mut(handle)
            .ok_or_else(|| JobError::UnknownHandle(handle.0.clone()))?;

        job.transitions.cancel();
        if !job.snapshot.state.is_terminal() {
            job.snapshot.state = JobState::Stopped;
            append_log(&mut job.snapshot, "stopped by request");
            tracing::debug!(handle = %handle, "Simulated job stopped");
        }
        Ok(())
    }
}

/// Walk one job through the script until it finishes or is cancelled.
async fn drive(jobs: JobTable, handle: JobHandle, request: JobRequest, token: CancellationToken) {
    for step in Step::SCRIPT {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(step.delay()) => {}
        }

        if !apply_step(&jobs, &handle, &token, step, &request) {
            return;
        }
    }
}

/// Apply `step` unless the job was stopped or removed. Returns whether it applied.
fn apply_step(
    jobs: &JobTable,
    handle: &JobHandle,
    token: &CancellationToken,
    step: Step,
    request: &JobRequest,
) -> bool {
    let mut table = lock(jobs);
    if token.is_cancelled() {
        return false;
    }
    let Some(job) = table.get_mut(handle) else {
        return false;
    };
    step.apply(&mut job.snapshot, request);
    tracing::debug!(
        handle = %handle,
        state = %job.snapshot.state,
        iteration = job.snapshot.iteration,
        "Simulated transition applied"
    );
    true
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn append_log(snapshot: &mut JobStatusSnapshot, line: &str) {
    let stamp = Utc::now().format("%H:%M:%S");
    snapshot.log_tail.push_str(&format!("[{stamp}] {line}\n"));
}

fn synthetic_result(request: &JobRequest) -> BestResult {
    let candidate = format!("{CANDIDATE_BANNER}\n{}", request.source);
    BestResult {
        diff_unified: unified_diff(&request.top, &request.source),
        candidate_rtl: candidate,
        metrics: PpaMetrics {
            power_savings_pct: Some(12.5),
            timing_improvement_pct: Some(8.0),
            area_eq_gates: Some(742.0),
            notes: "synthetic".into(),
            ..PpaMetrics::default()
        },
        score: Some(0.5),
    }
}

/// Diff for the banner-prepending transformation.
fn unified_diff(top: &str, source: &str) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let mut diff = format!(
        "--- a/{top}.v\n+++ b/{top}_optimized.v\n@@ -1,{} +1,{} @@\n+{CANDIDATE_BANNER}\n",
        lines.len(),
        lines.len() + 1
    );
    for line in lines {
        diff.push(' ');
        diff.push_str(line);
        diff.push('\n');
    }
    diff
}
