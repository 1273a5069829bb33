//! Backend adapter trait.
//!
//! The [`JobBackend`] trait defines the three-operation contract every
//! execution backend satisfies:
//!
//! ```text
//!   start() ──→ status() ──→ ... ──→ status() (terminal)
//!                  │
//!                  └──→ stop() (idempotent)
//! ```
//!
//! ## Method table
//!
//! | Method | Kind | Required | Returns |
//! |--------|------|----------|---------|
//! | `name()` | sync | yes | `&str` |
//! | `start()` | async | yes | `JobResult<JobHandle>` |
//! | `status()` | async | yes | `JobResult<JobStatusSnapshot>` |
//! | `stop()` | async | yes | `JobResult<()>` |
//! | `wait()` | async | provided | `JobResult<JobStatusSnapshot>` |

use std::time::Duration;

use async_trait::async_trait;

use crate::error::JobResult;
use crate::job::{JobHandle, JobRequest};
use crate::result::JobStatusSnapshot;

/// Trait for optimization job backends.
///
/// # Contract
///
/// - `start()` MUST call [`JobRequest::validate`] before any I/O and leave
///   the new job in `queued`. Each call creates an independent job with a
///   handle that is never reused.
/// - `status()` is a read. It fails with `UnknownHandle` for handles the
///   backend has no record of.
/// - `stop()` is idempotent: stopping a terminal job is a no-op.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Submit a job. The job begins existing in state `queued`.
    async fn start(&self, request: &JobRequest) -> JobResult<JobHandle>;

    /// Read the current snapshot of a job.
    async fn status(&self, handle: &JobHandle) -> JobResult<JobStatusSnapshot>;

    /// Request cancellation of a job.
    async fn stop(&self, handle: &JobHandle) -> JobResult<()>;

    /// Poll a job until it reaches a terminal state and return that snapshot.
    ///
    /// Default implementation polls every 500ms for up to 5 minutes.
    async fn wait(&self, handle: &JobHandle) -> JobResult<JobStatusSnapshot> {
        use crate::error::JobError;
        use tokio::time::sleep;

        let poll_interval = Duration::from_millis(500);
        let max_polls = 600; // 5 minutes max

        for _ in 0..max_polls {
            let snapshot = self.status(handle).await?;
            if snapshot.state.is_terminal() {
                return Ok(snapshot);
            }
            sleep(poll_interval).await;
        }

        Err(JobError::BackendUnavailable(format!(
            "job {handle} did not finish in time"
        )))
    }
}
