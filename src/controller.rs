//! Job controller.
//!
//! [`JobController`] owns at most one active [`JobHandle`] and the latest
//! snapshot for it. After a successful `submit` it spawns a polling task that
//! reads `status` every [`POLL_INTERVAL`] until the job is terminal, the
//! backend loses the handle, or the controller detaches. `attach` does the
//! same for a job started elsewhere.
//!
//! Every polling task is tagged with the generation it was spawned for.
//! `submit`, `attach` and `reset` bump the generation and cancel the previous
//! task's token; a status response that arrives for an older generation is
//! discarded instead of applied.
//!
//! Observers receive a [`JobView`] over a [`watch`] channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::auth::{Anonymous, CredentialProvider, SubmitGate};
use crate::backend::JobBackend;
use crate::error::{JobError, JobResult};
use crate::job::{JobHandle, JobRequest, JobState};
use crate::normalize::normalize;
use crate::result::{JobStatusSnapshot, MetricsRecord};

/// Fixed period between status reads.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// What observers see of the controller.
#[derive(Debug, Clone, Default)]
pub struct JobView {
    pub handle: Option<JobHandle>,
    pub snapshot: Option<Arc<JobStatusSnapshot>>,
    /// Normalized from `snapshot`; empty until one arrives.
    pub metrics: MetricsRecord,
    /// Last non-transient polling error for the current handle.
    pub error: Option<JobError>,
    /// Whether a polling task is still running for the current handle.
    pub polling: bool,
    pub updated_at: DateTime<Utc>,
}

impl JobView {
    pub fn state(&self) -> Option<JobState> {
        self.snapshot.as_ref().map(|s| s.state)
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_some_and(JobState::is_terminal)
    }

    /// Progress percentage for a progress indicator.
    pub fn progress(&self) -> u8 {
        match (self.state(), &self.handle) {
            (Some(JobState::Queued), _) => 10,
            (Some(JobState::Running), _) => 50,
            (Some(_), _) => 100,
            (None, Some(_)) => 20,
            (None, None) => 0,
        }
    }

    /// Badge text: the canonical state, `pending` or `idle`.
    pub fn status_label(&self) -> &'static str {
        match (self.state(), &self.handle) {
            (Some(state), _) => state.as_str(),
            (None, Some(_)) => "pending",
            (None, None) => "idle",
        }
    }
}

struct ActiveJob {
    generation: u64,
    handle: JobHandle,
    snapshot: Option<Arc<JobStatusSnapshot>>,
    error: Option<JobError>,
    polling: bool,
    cancel: CancellationToken,
    refresh: Arc<Notify>,
}

#[derive(Default)]
struct ControllerState {
    generation: u64,
    active: Option<ActiveJob>,
}

enum PollOutcome {
    Continue,
    Stop,
}

struct Shared {
    state: Mutex<ControllerState>,
    view_tx: watch::Sender<JobView>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &ControllerState) {
        let view = match &state.active {
            None => JobView {
                updated_at: Utc::now(),
                ..JobView::default()
            },
            Some(active) => JobView {
                handle: Some(active.handle.clone()),
                metrics: active
                    .snapshot
                    .as_deref()
                    .map(normalize)
                    .unwrap_or_default(),
                snapshot: active.snapshot.clone(),
                error: active.error.clone(),
                polling: active.polling,
                updated_at: Utc::now(),
            },
        };
        self.view_tx.send_replace(view);
    }

    /// Apply one status read for `generation`.
    fn apply(&self, generation: u64, outcome: JobResult<JobStatusSnapshot>) -> PollOutcome {
        let mut state = self.lock();
        let Some(active) = state
            .active
            .as_mut()
            .filter(|a| a.generation == generation && !a.cancel.is_cancelled())
        else {
            tracing::debug!(generation, "Discarding status for a detached job");
            return PollOutcome::Stop;
        };

        let outcome = match outcome {
            Ok(snapshot) => {
                let previous = active.snapshot.as_ref().map(|s| s.state);
                match previous {
                    Some(prev) if !prev.may_advance_to(snapshot.state) => {
                        let err = JobError::Protocol(format!(
                            "job {} went from {prev} back to {}",
                            active.handle, snapshot.state
                        ));
                        tracing::warn!(handle = %active.handle, error = %err, "Rejecting snapshot");
                        active.error = Some(err);
                        PollOutcome::Stop
                    }
                    _ => {
                        if previous != Some(snapshot.state) {
                            tracing::info!(
                                handle = %active.handle,
                                state = %snapshot.state,
                                iteration = snapshot.iteration,
                                "Job state changed"
                            );
                        }
                        let terminal = snapshot.state.is_terminal();
                        active.snapshot = Some(Arc::new(snapshot));
                        active.error = None;
                        if terminal {
                            PollOutcome::Stop
                        } else {
                            PollOutcome::Continue
                        }
                    }
                }
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(handle = %active.handle, error = %err, "Status read failed, will retry");
                PollOutcome::Continue
            }
            Err(err) => {
                tracing::warn!(handle = %active.handle, error = %err, "Status read failed");
                active.error = Some(err);
                PollOutcome::Stop
            }
        };

        if matches!(outcome, PollOutcome::Stop) {
            active.polling = false;
            tracing::info!(handle = %active.handle, "Polling stopped");
        }
        self.publish(&state);
        outcome
    }
}

/// Owns the lifecycle of one active job at a time.
pub struct JobController {
    backend: Arc<dyn JobBackend>,
    credentials: Arc<dyn CredentialProvider>,
    gate: SubmitGate,
    shared: Arc<Shared>,
}

impl JobController {
    /// Controller for anonymous callers with no auth requirement.
    pub fn new(backend: Arc<dyn JobBackend>) -> Self {
        Self::with_auth(backend, Arc::new(Anonymous), SubmitGate::new(false))
    }

    pub fn with_auth(
        backend: Arc<dyn JobBackend>,
        credentials: Arc<dyn CredentialProvider>,
        gate: SubmitGate,
    ) -> Self {
        let (view_tx, _) = watch::channel(JobView::default());
        Self {
            backend,
            credentials,
            gate,
            shared: Arc::new(Shared {
                state: Mutex::new(ControllerState::default()),
                view_tx,
            }),
        }
    }

    /// Whether the current caller may submit.
    pub fn can_submit(&self) -> bool {
        self.gate.permits(self.credentials.as_ref())
    }

    /// Subscribe to view updates.
    pub fn subscribe(&self) -> watch::Receiver<JobView> {
        self.shared.view_tx.subscribe()
    }

    /// Current view.
    pub fn view(&self) -> JobView {
        self.shared.view_tx.borrow().clone()
    }

    pub fn current_handle(&self) -> Option<JobHandle> {
        self.shared.lock().active.as_ref().map(|a| a.handle.clone())
    }

    pub fn snapshot(&self) -> Option<Arc<JobStatusSnapshot>> {
        self.shared
            .lock()
            .active
            .as_ref()
            .and_then(|a| a.snapshot.clone())
    }

    /// Start a job and begin polling it.
    ///
    /// On failure the error is returned unmodified and the previous job, if
    /// any, stays attached.
    pub async fn submit(&self, request: JobRequest) -> JobResult<JobHandle> {
        if !self.can_submit() {
            return Err(JobError::AuthenticationRequired);
        }

        let handle = self.backend.start(&request).await?;
        self.follow(&handle);
        tracing::info!(
            handle = %handle,
            backend = self.backend.name(),
            top = %request.top,
            "Job submitted"
        );
        Ok(handle)
    }

    /// Begin polling a job started elsewhere, detaching from the current one.
    ///
    /// No credential is needed; the first read reports an unknown handle on
    /// the view. Must be called from within a tokio runtime.
    pub fn attach(&self, handle: JobHandle) {
        self.follow(&handle);
        tracing::info!(handle = %handle, backend = self.backend.name(), "Attached to job");
    }

    fn follow(&self, handle: &JobHandle) {
        let (generation, cancel, refresh) = {
            let mut state = self.shared.lock();
            if let Some(previous) = state.active.take() {
                previous.cancel.cancel();
                tracing::debug!(handle = %previous.handle, "Detached from previous job");
            }
            state.generation += 1;
            let active = ActiveJob {
                generation: state.generation,
                handle: handle.clone(),
                snapshot: None,
                error: None,
                polling: true,
                cancel: CancellationToken::new(),
                refresh: Arc::new(Notify::new()),
            };
            let parts = (
                active.generation,
                active.cancel.clone(),
                Arc::clone(&active.refresh),
            );
            state.active = Some(active);
            self.shared.publish(&state);
            parts
        };
        self.spawn_poll(handle, generation, cancel, refresh);
    }

    fn spawn_poll(
        &self,
        handle: &JobHandle,
        generation: u64,
        cancel: CancellationToken,
        refresh: Arc<Notify>,
    ) {
        tokio::spawn(poll_loop(
            Arc::clone(&self.shared),
            Arc::clone(&self.backend),
            handle.clone(),
            generation,
            cancel,
            refresh,
        ));
    }

    /// Request cancellation of the current job. No-op without one.
    ///
    /// The `stopped` state is read back immediately: a running poll task is
    /// woken, and one that already ended on an error is restarted.
    pub async fn stop(&self) -> JobResult<()> {
        let Some((handle, refresh)) = self
            .shared
            .lock()
            .active
            .as_ref()
            .map(|a| (a.handle.clone(), Arc::clone(&a.refresh)))
        else {
            return Ok(());
        };

        self.backend.stop(&handle).await?;
        tracing::info!(handle = %handle, "Stop requested");

        let resumed = {
            let mut state = self.shared.lock();
            let parts = state
                .active
                .as_mut()
                .filter(|a| a.handle == handle && !a.polling && !a.cancel.is_cancelled())
                .map(|a| {
                    a.polling = true;
                    (a.generation, a.cancel.clone(), Arc::clone(&a.refresh))
                });
            if parts.is_some() {
                self.shared.publish(&state);
            }
            parts
        };
        match resumed {
            Some((generation, cancel, refresh)) => {
                tracing::debug!(handle = %handle, "Resuming polling after stop");
                self.spawn_poll(&handle, generation, cancel, refresh);
            }
            None => refresh.notify_one(),
        }
        Ok(())
    }

    /// Detach from the current job without stopping it.
    pub fn reset(&self) {
        let mut state = self.shared.lock();
        if let Some(previous) = state.active.take() {
            previous.cancel.cancel();
            tracing::info!(handle = %previous.handle, "Detached from job");
        }
        state.generation += 1;
        self.shared.publish(&state);
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        if let Some(active) = self.shared.lock().active.as_ref() {
            active.cancel.cancel();
        }
    }
}

async fn poll_loop(
    shared: Arc<Shared>,
    backend: Arc<dyn JobBackend>,
    handle: JobHandle,
    generation: u64,
    cancel: CancellationToken,
    refresh: Arc<Notify>,
) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = refresh.notified() => ticker.reset(),
            _ = ticker.tick() => {}
        }

        let outcome = backend.status(&handle).await;
        tracing::debug!(handle = %handle, ok = outcome.is_ok(), "Status read");
        if let PollOutcome::Stop = shared.apply(generation, outcome) {
            break;
        }
    }
}
