//! Client error types.
//!
//! Errors are categorized by recoverability:
//!
//! | Category | Variants | Recovery |
//! |----------|----------|----------|
//! | **Transient** | `BackendUnavailable` | Keep polling on the same schedule |
//! | **Permanent** | `Validation` | Fix input, never retried |
//! | **Job-level** | `UnknownHandle`, `Protocol` | Stop polling, resubmit |
//! | **Rejected** | `Rejected` | Stop polling, check credentials or request |
//! | **Auth** | `AuthenticationRequired` | Sign in |
//! | **Config** | `Configuration` | Fix configuration |

use thiserror::Error;

/// Errors that can occur in job operations.
///
/// Adapter errors pass through the controller unmodified.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum JobError {
    /// Malformed request, rejected before any I/O.
    #[error("Invalid job request: {0}")]
    Validation(String),

    /// Backend could not be reached or answered with a failure.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// Backend has no record of the handle.
    #[error("Unknown job handle: {0}")]
    UnknownHandle(String),

    /// Response shape or sequence violates the contract.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The backend refused the request (4xx other than an unknown handle).
    /// Carries the status code and response body.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// A credential is required to submit and none is available.
    #[error("Authentication required to start a job")]
    AuthenticationRequired,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl JobError {
    /// Returns `true` if polling may continue after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }
}

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;
