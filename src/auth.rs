//! Authentication collaborator.
//!
//! Session handling lives outside this crate. The client only needs the
//! current bearer credential (or none) and a rule for whether a caller
//! without one may start a job.

/// Source of the current bearer credential.
///
/// Consulted once per outgoing remote call, so implementations may refresh
/// between calls.
pub trait CredentialProvider: Send + Sync {
    /// The current bearer token, or `None` for an anonymous caller.
    fn bearer_token(&self) -> Option<String>;
}

/// Caller with no credential.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl CredentialProvider for Anonymous {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}

/// Fixed credential, typically read from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    /// Blank tokens are treated as absent.
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.trim().is_empty()))
    }
}

impl CredentialProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Decides whether a caller may submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitGate {
    auth_required: bool,
}

impl SubmitGate {
    pub fn new(auth_required: bool) -> Self {
        Self { auth_required }
    }

    pub fn auth_required(&self) -> bool {
        self.auth_required
    }

    /// An absent credential blocks submission only when auth is required.
    pub fn permits(&self, credentials: &dyn CredentialProvider) -> bool {
        !self.auth_required || credentials.bearer_token().is_some()
    }
}
