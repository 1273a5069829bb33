//! Client configuration, read once at startup.

use crate::error::{JobError, JobResult};

/// Default remote endpoint root.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

/// Which backend adapter is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Simulated,
    Remote,
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub backend: BackendKind,
    /// Remote endpoint root, without a trailing `/`.
    pub api_base: String,
    /// Whether an absent credential blocks submission.
    pub auth_required: bool,
    /// Static bearer token, if one is configured.
    pub auth_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Remote,
            api_base: DEFAULT_API_BASE.to_string(),
            auth_required: true,
            auth_token: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `OPTIMIZER_SIMULATED`    | `false`                 |
    /// | `OPTIMIZER_API_BASE`     | `http://localhost:8000` |
    /// | `OPTIMIZER_REQUIRE_AUTH` | `true`                  |
    /// | `OPTIMIZER_AUTH_TOKEN`   | unset                   |
    pub fn from_env() -> JobResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> JobResult<Self> {
        let simulated = parse_flag("OPTIMIZER_SIMULATED", lookup("OPTIMIZER_SIMULATED"), false)?;
        let auth_required = parse_flag(
            "OPTIMIZER_REQUIRE_AUTH",
            lookup("OPTIMIZER_REQUIRE_AUTH"),
            true,
        )?;

        let api_base = lookup("OPTIMIZER_API_BASE")
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim()
            .trim_end_matches('/')
            .to_string();

        let backend = if simulated {
            BackendKind::Simulated
        } else {
            BackendKind::Remote
        };
        if backend == BackendKind::Remote && api_base.is_empty() {
            return Err(JobError::Configuration(
                "OPTIMIZER_API_BASE must not be empty for the remote backend".into(),
            ));
        }

        let auth_token = lookup("OPTIMIZER_AUTH_TOKEN").filter(|t| !t.trim().is_empty());

        Ok(Self {
            backend,
            api_base,
            auth_required,
            auth_token,
        })
    }
}

/// Parse a boolean-like value; `None` yields `default`.
pub fn parse_flag(key: &str, value: Option<String>, default: bool) -> JobResult<bool> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(JobError::Configuration(format!(
            "{key} must be boolean-like, got `{other}`"
        ))),
    }
}
