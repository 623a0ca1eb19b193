//! Quality metrics computed once at job completion (§3.8, §4.8).

use serde::{Deserialize, Serialize};

use crate::job::model::QualityMetrics;
use crate::workflow::WorkflowState;

/// Compute the five-field quality snapshot from a finished workflow's state.
pub fn calculate_quality_metrics(state: &WorkflowState) -> QualityMetrics {
    let total_triples = state.triples.len() as u32;
    let conflict_count = state.conflict_flags.len() as u32;

    let missing_fields_count = state
        .triples
        .iter()
        .filter(|c| c.subject.trim().is_empty() || c.predicate.trim().is_empty() || c.object.trim().is_empty())
        .count() as u32;

    let unsupported_count = state
        .triples
        .iter()
        .filter(|c| !c.source_anchor.is_structurally_present() && c.expert_notes.is_none())
        .count() as u32;

    let unsupported_claim_rate =
        if total_triples > 0 { unsupported_count as f64 / total_triples as f64 } else { 0.0 };

    QualityMetrics {
        unsupported_claim_rate: (unsupported_claim_rate * 10_000.0).round() / 10_000.0,
        conflict_count,
        missing_fields_count,
        total_triples,
        unsupported_count,
    }
}

/// Deltas between a reprocessed job's metrics and its parent's, for the
/// `job_reprocess_completed` telemetry event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityDeltas {
    pub unsupported_claim_rate_delta: f64,
    pub conflict_count_delta: i64,
    pub missing_fields_count_delta: i64,
    pub triples_count_delta: i64,
}

pub fn calculate_quality_deltas(before: &QualityMetrics, after: &QualityMetrics) -> QualityDeltas {
    QualityDeltas {
        unsupported_claim_rate_delta: after.unsupported_claim_rate - before.unsupported_claim_rate,
        conflict_count_delta: after.conflict_count as i64 - before.conflict_count as i64,
        missing_fields_count_delta: after.missing_fields_count as i64 - before.missing_fields_count as i64,
        triples_count_delta: after.total_triples as i64 - before.total_triples as i64,
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::claims::Claim;

    use super::*;

    #[test]
    fn empty_state_yields_zeroed_metrics() {
        let state = WorkflowState::new(Uuid::new_v4(), "t1", "p1", "i1");
        let metrics = calculate_quality_metrics(&state);
        assert_eq!(metrics.total_triples, 0);
        assert_eq!(metrics.unsupported_claim_rate, 0.0);
    }

    #[test]
    fn claims_without_a_source_anchor_count_as_unsupported() {
        let mut state = WorkflowState::new(Uuid::new_v4(), "t1", "p1", "i1");
        state.triples.push(Claim::new("A", "mitigates", "B"));
        let metrics = calculate_quality_metrics(&state);
        assert_eq!(metrics.total_triples, 1);
        assert_eq!(metrics.unsupported_count, 1);
        assert_eq!(metrics.unsupported_claim_rate, 1.0);
    }

    #[test]
    fn deltas_are_after_minus_before() {
        let before = QualityMetrics { unsupported_claim_rate: 0.5, conflict_count: 2, missing_fields_count: 1, total_triples: 4, unsupported_count: 2 };
        let after = QualityMetrics { unsupported_claim_rate: 0.25, conflict_count: 1, missing_fields_count: 0, total_triples: 4, unsupported_count: 1 };
        let deltas = calculate_quality_deltas(&before, &after);
        assert_eq!(deltas.unsupported_claim_rate_delta, -0.25);
        assert_eq!(deltas.conflict_count_delta, -1);
    }
}
