//! Lifecycle scenarios against the simulated backend.
//!
//! All tests run on tokio's paused clock, so `sleep` advances virtual time
//! deterministically past the simulator's scripted delays.

use std::time::Duration;

use tokio::time::sleep;
use verirl_client::simulated::{FINISH_DELAY, RESULT_DELAY, RUNNING_DELAY};
use verirl_client::{
    JobBackend, JobError, JobHandle, JobRequest, JobState, SimulatedBackend, normalize,
};

const HALF_SECOND: Duration = Duration::from_millis(500);

fn request() -> JobRequest {
    JobRequest::new("module m; endmodule", "m")
}

// ---------------------------------------------------------------------------
// Scenario A: the full script is observable through successive reads
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn full_script_is_observable() {
    let backend = SimulatedBackend::new();
    let handle = backend.start(&request()).await.unwrap();

    let snap = backend.status(&handle).await.unwrap();
    assert_eq!(snap.state, JobState::Queued);
    assert_eq!(snap.iteration, 0);
    assert!(snap.best_result.is_none());

    sleep(RUNNING_DELAY + HALF_SECOND).await;
    let snap = backend.status(&handle).await.unwrap();
    assert_eq!(snap.state, JobState::Running);
    assert!(snap.best_result.is_none());
    assert!(!snap.log_tail.is_empty());

    sleep(RESULT_DELAY).await;
    let snap = backend.status(&handle).await.unwrap();
    assert_eq!(snap.state, JobState::Running);
    assert_eq!(snap.iteration, 1);
    let best = snap.best_result.as_ref().expect("best result attached");
    assert!(best.candidate_rtl.contains("module m; endmodule"));
    assert!(!best.diff_unified.is_empty());
    let metrics = normalize(&snap);
    assert!(metrics.power_savings_pct.is_some());
    assert!(metrics.timing_improvement_pct.is_some());
    assert!(metrics.area_eq_gates.is_some());

    sleep(FINISH_DELAY).await;
    assert_eq!(
        backend.status(&handle).await.unwrap().state,
        JobState::Succeeded
    );

    sleep(Duration::from_secs(30)).await;
    assert_eq!(
        backend.status(&handle).await.unwrap().state,
        JobState::Succeeded
    );
}

// ---------------------------------------------------------------------------
// Scenario B: stop before the job starts running
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn stop_while_queued_wins_over_pending_transitions() {
    let backend = SimulatedBackend::new();
    let handle = backend.start(&request()).await.unwrap();

    sleep(RUNNING_DELAY / 2).await;
    backend.stop(&handle).await.unwrap();

    for _ in 0..12 {
        let snap = backend.status(&handle).await.unwrap();
        assert_eq!(snap.state, JobState::Stopped);
        assert!(snap.best_result.is_none());
        sleep(HALF_SECOND).await;
    }
}

#[tokio::test(start_paused = true)]
async fn stop_while_running_keeps_partial_result() {
    let backend = SimulatedBackend::new();
    let handle = backend.start(&request()).await.unwrap();

    sleep(RUNNING_DELAY + RESULT_DELAY + HALF_SECOND).await;
    backend.stop(&handle).await.unwrap();

    sleep(FINISH_DELAY * 2).await;
    let snap = backend.status(&handle).await.unwrap();
    assert_eq!(snap.state, JobState::Stopped);
    assert_eq!(snap.iteration, 1);
    assert!(snap.best_result.is_some());
}

// ---------------------------------------------------------------------------
// Scenario C: unknown handle
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn status_of_unknown_handle_fails() {
    let backend = SimulatedBackend::new();
    let err = backend
        .status(&JobHandle::from("never-issued"))
        .await
        .unwrap_err();
    assert_eq!(err, JobError::UnknownHandle("never-issued".into()));
}

#[tokio::test(start_paused = true)]
async fn handles_do_not_survive_backend_restart() {
    let handle = SimulatedBackend::new().start(&request()).await.unwrap();
    let restarted = SimulatedBackend::new();
    assert!(matches!(
        restarted.status(&handle).await,
        Err(JobError::UnknownHandle(_))
    ));
}

// ---------------------------------------------------------------------------
// Scenario D: validation happens before anything is created
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn empty_source_is_rejected() {
    let backend = SimulatedBackend::new();
    let err = backend
        .start(&JobRequest::new("", "m"))
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Validation(_)));

    // The rejected call consumed no handle.
    let handle = backend.start(&request()).await.unwrap();
    assert_eq!(handle.as_str(), "sim-1");
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn stop_twice_equals_stop_once() {
    let backend = SimulatedBackend::new();
    let once = backend.start(&request()).await.unwrap();
    let twice = backend.start(&request()).await.unwrap();

    sleep(RUNNING_DELAY + HALF_SECOND).await;
    backend.stop(&once).await.unwrap();
    backend.stop(&twice).await.unwrap();
    backend.stop(&twice).await.unwrap();

    let a = backend.status(&once).await.unwrap();
    let b = backend.status(&twice).await.unwrap();
    assert_eq!(a.state, JobState::Stopped);
    assert_eq!(b.state, a.state);
    assert_eq!(b.iteration, a.iteration);
}

#[tokio::test(start_paused = true)]
async fn terminal_state_is_never_left() {
    let backend = SimulatedBackend::new();
    let handle = backend.start(&request()).await.unwrap();

    let mut last = JobState::Queued;
    let mut seen_terminal = false;
    for _ in 0..40 {
        let state = backend.status(&handle).await.unwrap().state;
        assert!(last.may_advance_to(state), "{last} -> {state}");
        if seen_terminal {
            assert!(state.is_terminal());
        }
        seen_terminal |= state.is_terminal();
        last = state;
        sleep(Duration::from_millis(250)).await;
    }
    assert_eq!(last, JobState::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn independent_jobs_progress_independently() {
    let backend = SimulatedBackend::new();
    let first = backend.start(&request()).await.unwrap();
    sleep(RUNNING_DELAY + HALF_SECOND).await;
    let second = backend.start(&request()).await.unwrap();

    assert_eq!(backend.status(&first).await.unwrap().state, JobState::Running);
    assert_eq!(backend.status(&second).await.unwrap().state, JobState::Queued);

    backend.stop(&first).await.unwrap();
    let done = backend.wait(&second).await.unwrap();
    assert_eq!(done.state, JobState::Succeeded);
    assert_eq!(backend.status(&first).await.unwrap().state, JobState::Stopped);
}
