//! Status snapshot and result types.
//!
//! A [`JobStatusSnapshot`] is an immutable point-in-time read. Result fields
//! may arrive nested under a `best_result` wrapper or flat on the snapshot;
//! [`crate::normalize`] folds both into one [`MetricsRecord`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::job::JobState;

/// Placeholder written when no candidate exists yet.
pub const EMPTY_EXPORT: &str = "// No optimized RTL yet";

/// Raw power/performance/area figures as reported by the optimizer.
///
/// Every field is optional: absence means "not yet known", never zero. A
/// malformed field (`null`, a string where a number belongs) reads as absent
/// and leaves its siblings intact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PpaMetrics {
    #[serde(default, deserialize_with = "or_absent", skip_serializing_if = "Option::is_none")]
    pub power_savings_pct: Option<f64>,
    #[serde(default, deserialize_with = "or_absent", skip_serializing_if = "Option::is_none")]
    pub timing_improvement_pct: Option<f64>,
    /// Area in equivalent gates.
    #[serde(default, deserialize_with = "or_absent", skip_serializing_if = "Option::is_none")]
    pub area_eq_gates: Option<f64>,
    #[serde(default, deserialize_with = "or_absent", skip_serializing_if = "Option::is_none")]
    pub fmax_mhz: Option<f64>,
    #[serde(default, deserialize_with = "or_absent", skip_serializing_if = "Option::is_none")]
    pub power_mw: Option<f64>,
    /// Worst negative slack, in ns.
    #[serde(default, deserialize_with = "or_absent", skip_serializing_if = "Option::is_none")]
    pub wns_ns: Option<f64>,
    #[serde(default, deserialize_with = "or_absent", skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

/// Best candidate found so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BestResult {
    #[serde(default, deserialize_with = "or_absent")]
    pub candidate_rtl: String,
    #[serde(default, deserialize_with = "or_absent")]
    pub metrics: PpaMetrics,
    /// Unified diff between the submitted source and the candidate.
    #[serde(default, deserialize_with = "or_absent")]
    pub diff_unified: String,
    #[serde(default, deserialize_with = "or_absent", skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Decode one field, reading a value of the wrong shape as the default.
fn or_absent<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Result of `status(handle)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusSnapshot {
    pub state: JobState,
    /// Completed optimization iterations.
    #[serde(default)]
    pub iteration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_result: Option<BestResult>,
    /// Flat metrics, for sources that do not use the `best_result` wrapper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PpaMetrics>,
    /// Flat candidate, for sources that do not use the `best_result` wrapper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_rtl: Option<String>,
    /// Tail of recent log output.
    #[serde(default)]
    pub log_tail: String,
    /// Failure detail reported by the backend, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatusSnapshot {
    /// Snapshot of a freshly started job.
    pub fn queued() -> Self {
        Self {
            state: JobState::Queued,
            iteration: 0,
            best_result: None,
            metrics: None,
            candidate_rtl: None,
            log_tail: String::new(),
            error: None,
        }
    }

    /// Candidate RTL, wrapper first, flat field second.
    pub fn candidate(&self) -> Option<&str> {
        self.best_result
            .as_ref()
            .map(|b| b.candidate_rtl.as_str())
            .filter(|c| !c.is_empty())
            .or_else(|| self.candidate_rtl.as_deref().filter(|c| !c.is_empty()))
    }
}

/// Canonical metrics record derived from exactly one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub power_savings_pct: Option<f64>,
    pub timing_improvement_pct: Option<f64>,
    pub area_eq_gates: Option<f64>,
}

impl MetricsRecord {
    /// Whether no field is known yet.
    pub fn is_empty(&self) -> bool {
        self.power_savings_pct.is_none()
            && self.timing_improvement_pct.is_none()
            && self.area_eq_gates.is_none()
    }
}

/// File name for an exported candidate of `top`.
pub fn export_file_name(top: &str) -> String {
    let top = top.trim();
    if top.is_empty() {
        "module_optimized.v".to_string()
    } else {
        format!("{top}_optimized.v")
    }
}

/// Text to export for a snapshot, or a placeholder when there is no candidate.
pub fn export_text(snapshot: Option<&JobStatusSnapshot>) -> String {
    snapshot
        .and_then(JobStatusSnapshot::candidate)
        .unwrap_or(EMPTY_EXPORT)
        .to_string()
}
