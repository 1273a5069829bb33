//! VeriRL optimizer job client.
//!
//! This crate submits long-running RTL optimization jobs, tracks them without
//! blocking the caller, and folds partial and final results into a stable
//! shape. Any execution backend, in-memory or remote, implements the
//! [`JobBackend`] trait to participate.
//!
//! # Overview
//!
//! - A [`JobBackend`] trait with `start`, `status` and `stop`
//! - [`SimulatedBackend`] and [`RemoteBackend`] implementations
//! - [`BackendSelector`] picking one of them from [`ClientConfig`]
//! - [`JobController`] owning one active job and its polling loop
//! - [`normalize`] mapping a [`JobStatusSnapshot`] to a [`MetricsRecord`]
//! - [`JobError`] with recoverability categories
//!
//! # Lifecycle
//!
//! ```text
//!   submit() ──→ start() ──→ status() every 2s ──→ terminal ──→ polling ends
//!                               │
//!                  stop() ──────┘ (next read observes `stopped`)
//! ```
//!
//! ```ignore
//! use std::sync::Arc;
//! use verirl_client::{JobController, JobRequest, SimulatedBackend};
//!
//! let controller = JobController::new(Arc::new(SimulatedBackend::new()));
//! let handle = controller.submit(JobRequest::new("module m; endmodule", "m")).await?;
//! let mut views = controller.subscribe();
//! while views.changed().await.is_ok() {
//!     println!("{}: {}%", handle, views.borrow().progress());
//! }
//! ```

pub mod auth;
pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod job;
pub mod normalize;
pub mod remote;
pub mod result;
pub mod selector;
pub mod simulated;

pub use auth::{Anonymous, CredentialProvider, StaticToken, SubmitGate};
pub use backend::JobBackend;
pub use config::{BackendKind, ClientConfig};
pub use controller::{JobController, JobView, POLL_INTERVAL};
pub use error::{JobError, JobResult};
pub use job::{Budgets, JobHandle, JobRequest, JobState, Targets};
pub use normalize::normalize;
pub use remote::RemoteBackend;
pub use result::{BestResult, JobStatusSnapshot, MetricsRecord, PpaMetrics};
pub use selector::BackendSelector;
pub use simulated::SimulatedBackend;
