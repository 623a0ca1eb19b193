//! Job record types (§3.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::WorkflowState;

/// Job lifecycle status. Transitions are enforced by [`crate::job::manager::JobManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    /// Reachable only via an explicit operator-driven `finalize_job` call, never
    /// produced by the workflow itself (§9 open question).
    Finalized,
    NeedsSignoff,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Finalized)
    }
}

/// The full input snapshot a job was submitted with (§3.1 "Initial state").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobInput {
    pub raw_text: String,
    pub project_id: String,
    #[serde(default)]
    pub reference_ids: Vec<String>,
    #[serde(default)]
    pub force_refresh_context: bool,
    #[serde(default)]
    pub image_paths: Vec<String>,
    #[serde(default)]
    pub pdf_path: Option<String>,
}

/// Five-field quality snapshot (§3.8, §4.8), computed once at job completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub unsupported_claim_rate: f64,
    pub conflict_count: u32,
    pub missing_fields_count: u32,
    pub total_triples: u32,
    pub unsupported_count: u32,
}

/// A Job represents one end-to-end processing run (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub parent_job_id: Option<Uuid>,
    pub job_version: i64,
    pub status: JobStatus,
    pub progress: f64,
    pub current_step: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub initial_state: JobInput,
    pub result: Option<WorkflowState>,
    pub error: Option<String>,
    pub idempotency_key: Option<String>,
    pub reprocess_reason: Option<String>,
    pub applied_reference_ids: Vec<String>,
    pub conflict_report_id: Option<Uuid>,
    pub reframing_proposal_id: Option<Uuid>,
    pub artifact_manifest_id: Option<Uuid>,
    pub quality_metrics_before: Option<QualityMetrics>,
    pub quality_metrics_after: Option<QualityMetrics>,
}

impl Job {
    pub fn new(
        initial_state: JobInput,
        idempotency_key: Option<String>,
        parent_job_id: Option<Uuid>,
        job_version: i64,
        reprocess_reason: Option<String>,
        applied_reference_ids: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_job_id,
            job_version,
            status: JobStatus::Queued,
            progress: 0.0,
            current_step: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            initial_state,
            result: None,
            error: None,
            idempotency_key,
            reprocess_reason,
            applied_reference_ids,
            conflict_report_id: None,
            reframing_proposal_id: None,
            artifact_manifest_id: None,
            quality_metrics_before: None,
            quality_metrics_after: None,
        }
    }

    /// Clamp progress into [0.0, 1.0] (§3.1 invariant).
    pub fn clamp_progress(value: f64) -> f64 {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_starts_queued_with_zero_progress() {
        let job = Job::new(JobInput::default(), None, None, 1, None, Vec::new());
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0.0);
        assert!(job.started_at.is_none());
    }

    #[test]
    fn clamp_progress_bounds_to_unit_interval() {
        assert_eq!(Job::clamp_progress(-0.5), 0.0);
        assert_eq!(Job::clamp_progress(1.5), 1.0);
        assert_eq!(Job::clamp_progress(0.42), 0.42);
    }
}
