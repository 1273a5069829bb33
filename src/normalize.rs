//! Result normalization.
//!
//! Precedence, per field: `best_result.metrics` first, then the flat
//! `metrics` on the snapshot. A field found in neither stays absent.
//! Values pass through unchanged; no unit conversion or rounding.

use crate::result::{JobStatusSnapshot, MetricsRecord, PpaMetrics};

/// Fold a snapshot's metrics into the canonical record.
pub fn normalize(snapshot: &JobStatusSnapshot) -> MetricsRecord {
    let wrapped = snapshot.best_result.as_ref().map(|b| &b.metrics);
    let flat = snapshot.metrics.as_ref();

    let pick = |field: fn(&PpaMetrics) -> Option<f64>| {
        wrapped.and_then(field).or_else(|| flat.and_then(field))
    };

    MetricsRecord {
        power_savings_pct: pick(|m| m.power_savings_pct),
        timing_improvement_pct: pick(|m| m.timing_improvement_pct),
        area_eq_gates: pick(|m| m.area_eq_gates),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::BestResult;

    fn metrics() -> PpaMetrics {
        PpaMetrics {
            power_savings_pct: Some(12.5),
            timing_improvement_pct: Some(-3.0),
            area_eq_gates: Some(742.0),
            ..PpaMetrics::default()
        }
    }

    #[test]
    fn test_wrapper_and_flat_normalize_identically() {
        let mut wrapped = JobStatusSnapshot::queued();
        wrapped.best_result = Some(BestResult {
            metrics: metrics(),
            ..BestResult::default()
        });

        let mut flat = JobStatusSnapshot::queued();
        flat.metrics = Some(metrics());

        assert_eq!(normalize(&wrapped), normalize(&flat));
        assert_eq!(normalize(&flat).timing_improvement_pct, Some(-3.0));
    }

    #[test]
    fn test_wrapper_wins_per_field() {
        let mut snap = JobStatusSnapshot::queued();
        snap.best_result = Some(BestResult {
            metrics: PpaMetrics {
                power_savings_pct: Some(20.0),
                ..PpaMetrics::default()
            },
            ..BestResult::default()
        });
        snap.metrics = Some(metrics());

        let record = normalize(&snap);
        assert_eq!(record.power_savings_pct, Some(20.0));
        assert_eq!(record.area_eq_gates, Some(742.0));
    }

    #[test]
    fn test_absent_stays_absent() {
        let record = normalize(&JobStatusSnapshot::queued());
        assert!(record.is_empty());
    }
}
