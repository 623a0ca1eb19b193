//! ConflictReport / ConflictItem / ReframingProposal types (§3.5, §3.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Kind of conflict detected by the Critic or Cartographer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    StructuralConflict,
    UnsupportedCoreClaim,
    MissingEvidence,
    Ambiguous,
    Contradiction,
}

/// Severity ranking; `Blocker` is the only level that can trigger a deadlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Medium,
    High,
    Blocker,
}

/// Which node produced the conflict item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Producer {
    Critic,
    Cartographer,
}

/// What the report recommends as the next state-machine move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedNextStep {
    ReviseAndRetry,
    PauseForHuman,
    TriggerReframing,
}

/// A single finding within a [`ConflictReport`] (§3.5 "Item").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictItem {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ConflictType,
    pub severity: Severity,
    pub summary: String,
    pub details: String,
    pub producer: Producer,
    #[serde(default)]
    pub contradicting_claim_ids: Vec<String>,
    #[serde(default)]
    pub evidence_anchors: Vec<serde_json::Value>,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl ConflictItem {
    pub fn new(
        kind: ConflictType,
        severity: Severity,
        summary: impl Into<String>,
        details: impl Into<String>,
        producer: Producer,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            severity,
            summary: summary.into(),
            details: details.into(),
            producer,
            contradicting_claim_ids: Vec::new(),
            evidence_anchors: Vec::new(),
            suggested_actions: Vec::new(),
            confidence: default_confidence(),
        }
    }

    pub fn with_contradicting_claims(mut self, ids: Vec<String>) -> Self {
        self.contradicting_claim_ids = ids;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

/// A stable fingerprint of a conflict item, used to build the report-level conflict hash.
/// Deliberately ignores `id` (random per-run) so logically identical items hash equal.
fn item_canonical(item: &ConflictItem) -> serde_json::Value {
    serde_json::json!({
        "type": item.kind,
        "severity": item.severity,
        "summary": item.summary,
        "details": item.details,
        "producer": item.producer,
        "contradicting_claim_ids": item.contradicting_claim_ids,
    })
}

/// SHA-256 over a stable canonical JSON of the conflict items list (§4.5 "Conflict hash").
pub fn conflict_hash(items: &[ConflictItem]) -> String {
    let canonical: Vec<serde_json::Value> = items.iter().map(item_canonical).collect();
    // serde_json::Value serializes object keys in insertion order; our canonical()
    // builder always inserts keys in the same order, so this is stable across calls.
    let serialized = serde_json::to_string(&canonical).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A persisted conflict report (§3.5 "Report").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictReport {
    pub id: Uuid,
    pub project_id: String,
    pub job_id: Uuid,
    pub doc_hash: Option<String>,
    pub revision_count: u32,
    pub critic_status: String,
    pub deadlock: bool,
    pub deadlock_type: Option<String>,
    pub conflict_items: Vec<ConflictItem>,
    pub conflict_hash: String,
    pub recommended_next_step: RecommendedNextStep,
    pub created_at: DateTime<Utc>,
}

impl ConflictReport {
    /// Canonical deadlock predicate (§9 open question): revision_count >= 2 AND
    /// at least one item is BLOCKER.
    pub fn is_deadlock(revision_count: u32, items: &[ConflictItem], deadlock_revision_threshold: u32) -> bool {
        revision_count >= deadlock_revision_threshold && items.iter().any(|i| i.severity == Severity::Blocker)
    }

    pub fn new(
        project_id: impl Into<String>,
        job_id: Uuid,
        doc_hash: Option<String>,
        revision_count: u32,
        critic_status: impl Into<String>,
        conflict_items: Vec<ConflictItem>,
        deadlock_revision_threshold: u32,
    ) -> Self {
        let deadlock = Self::is_deadlock(revision_count, &conflict_items, deadlock_revision_threshold);
        let recommended_next_step = if deadlock {
            RecommendedNextStep::TriggerReframing
        } else if conflict_items.iter().any(|i| i.severity == Severity::Blocker) {
            RecommendedNextStep::PauseForHuman
        } else {
            RecommendedNextStep::ReviseAndRetry
        };
        let hash = conflict_hash(&conflict_items);
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.into(),
            job_id,
            doc_hash,
            revision_count,
            critic_status: critic_status.into(),
            deadlock,
            deadlock_type: if deadlock { Some("revision_exhausted_with_blocker".to_string()) } else { None },
            conflict_items,
            conflict_hash: hash,
            recommended_next_step,
            created_at: Utc::now(),
        }
    }
}

/// The kind of pivot a [`ReframingProposal`] suggests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PivotType {
    Scope,
    Methodology,
    Thesis,
}

/// A deterministic (no-LLM) proposal produced when a deadlock is declared (§3.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReframingProposal {
    pub id: Uuid,
    pub project_id: String,
    pub job_id: Uuid,
    pub doc_hash: Option<String>,
    pub conflict_hash: String,
    pub pivot_type: PivotType,
    pub proposed_pivot: String,
    pub architectural_rationale: String,
    pub evidence_anchors: Vec<serde_json::Value>,
    pub assumptions_changed: Vec<String>,
    pub what_stays_true: Vec<String>,
    pub requires_human_signoff: bool,
    pub created_at: DateTime<Utc>,
}

impl ReframingProposal {
    pub fn from_report(report: &ConflictReport) -> Self {
        let blockers: Vec<&ConflictItem> = report
            .conflict_items
            .iter()
            .filter(|i| i.severity == Severity::Blocker)
            .collect();

        let pivot_type = if blockers.iter().any(|i| i.kind == ConflictType::Contradiction) {
            PivotType::Scope
        } else if blockers.iter().any(|i| i.kind == ConflictType::UnsupportedCoreClaim) {
            PivotType::Methodology
        } else {
            PivotType::Thesis
        };

        let proposed_pivot = format!(
            "After {} revision attempts, {} blocking issue(s) remain unresolved; propose a {:?} pivot.",
            report.revision_count,
            blockers.len(),
            pivot_type
        );
        let architectural_rationale = blockers
            .iter()
            .map(|i| format!("{}: {}", i.summary, i.details))
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            id: Uuid::new_v4(),
            project_id: report.project_id.clone(),
            job_id: report.job_id,
            doc_hash: report.doc_hash.clone(),
            conflict_hash: report.conflict_hash.clone(),
            pivot_type,
            proposed_pivot,
            architectural_rationale,
            evidence_anchors: blockers.iter().flat_map(|i| i.evidence_anchors.clone()).collect(),
            assumptions_changed: blockers.iter().map(|i| i.summary.clone()).collect(),
            what_stays_true: Vec::new(),
            requires_human_signoff: true,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocker_item() -> ConflictItem {
        ConflictItem::new(
            ConflictType::Contradiction,
            Severity::Blocker,
            "X relates_to conflicting objects",
            "page 3 says Y, page 7 says Z",
            Producer::Critic,
        )
    }

    #[test]
    fn conflict_hash_is_stable_across_serializations() {
        let items = vec![blocker_item()];
        let h1 = conflict_hash(&items);
        let reserialized: Vec<ConflictItem> = serde_json::from_str(&serde_json::to_string(&items).unwrap()).unwrap();
        let h2 = conflict_hash(&reserialized);
        assert_eq!(h1, h2);
    }

    #[test]
    fn conflict_hash_ignores_random_ids() {
        let a = vec![blocker_item()];
        let b = vec![blocker_item()];
        // Two independently constructed but logically identical item lists (different ids) hash equal.
        assert_eq!(conflict_hash(&a), conflict_hash(&b));
    }

    #[test]
    fn deadlock_requires_revision_threshold_and_blocker() {
        let items = vec![blocker_item()];
        assert!(!ConflictReport::is_deadlock(1, &items, 2));
        assert!(ConflictReport::is_deadlock(2, &items, 2));
        assert!(!ConflictReport::is_deadlock(5, &[], 2));
    }

    #[test]
    fn report_recommends_trigger_reframing_on_deadlock() {
        let job_id = Uuid::new_v4();
        let report = ConflictReport::new("proj-1", job_id, None, 2, "fail", vec![blocker_item()], 2);
        assert!(report.deadlock);
        assert_eq!(report.recommended_next_step, RecommendedNextStep::TriggerReframing);
    }

    #[test]
    fn reframing_proposal_requires_signoff() {
        let job_id = Uuid::new_v4();
        let report = ConflictReport::new("proj-1", job_id, None, 2, "fail", vec![blocker_item()], 2);
        let proposal = ReframingProposal::from_report(&report);
        assert!(proposal.requires_human_signoff);
        assert_eq!(proposal.pivot_type, PivotType::Scope);
        assert_eq!(proposal.conflict_hash, report.conflict_hash);
    }
}
