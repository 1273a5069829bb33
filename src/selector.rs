//! Backend selection.
//!
//! [`BackendSelector`] builds the configured adapter once and forwards the
//! three job operations to it, so callers never branch on which backend is
//! active. [`init`] installs a process-wide selector; [`global`] returns it.

use std::sync::{Arc, OnceLock};

use crate::auth::CredentialProvider;
use crate::backend::JobBackend;
use crate::config::{BackendKind, ClientConfig};
use crate::error::{JobError, JobResult};
use crate::job::{JobHandle, JobRequest};
use crate::remote::RemoteBackend;
use crate::result::JobStatusSnapshot;
use crate::simulated::SimulatedBackend;

static SELECTOR: OnceLock<BackendSelector> = OnceLock::new();

/// One unified call surface over the selected backend.
#[derive(Clone)]
pub struct BackendSelector {
    kind: BackendKind,
    backend: Arc<dyn JobBackend>,
}

impl BackendSelector {
    /// Construct the backend named by `config`.
    pub fn from_config(config: &ClientConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        let backend: Arc<dyn JobBackend> = match config.backend {
            BackendKind::Simulated => Arc::new(SimulatedBackend::new()),
            BackendKind::Remote => Arc::new(RemoteBackend::new(&config.api_base, credentials)),
        };
        tracing::info!(
            backend = backend.name(),
            api_base = %config.api_base,
            "Backend selected"
        );
        Self {
            kind: config.backend,
            backend,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Shared handle to the selected adapter.
    pub fn backend(&self) -> Arc<dyn JobBackend> {
        Arc::clone(&self.backend)
    }

    pub async fn start(&self, request: &JobRequest) -> JobResult<JobHandle> {
        self.backend.start(request).await
    }

    pub async fn status(&self, handle: &JobHandle) -> JobResult<JobStatusSnapshot> {
        self.backend.status(handle).await
    }

    pub async fn stop(&self, handle: &JobHandle) -> JobResult<()> {
        self.backend.stop(handle).await
    }
}

/// Install the process-wide selector. Fails if one is already installed.
pub fn init(
    config: &ClientConfig,
    credentials: Arc<dyn CredentialProvider>,
) -> JobResult<&'static BackendSelector> {
    let selector = BackendSelector::from_config(config, credentials);
    SELECTOR
        .set(selector)
        .map_err(|_| JobError::Configuration("backend selector already initialized".into()))?;
    global()
}

/// The process-wide selector installed by [`init`].
pub fn global() -> JobResult<&'static BackendSelector> {
    SELECTOR
        .get()
        .ok_or_else(|| JobError::Configuration("backend selector not initialized".into()))
}
