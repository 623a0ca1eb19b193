//! Job lifecycle: submission, concurrency admission, reprocessing lineage, and
//! driving a job through the workflow state machine (§4.1).

use std::sync::Arc;

use serde_json::json;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::job::model::{Job, JobInput, JobStatus};
use crate::job::quality::{calculate_quality_deltas, calculate_quality_metrics};
use crate::job::store::JobStore;
use crate::workflow::{nodes::NodeContext, run_to_completion, Halt, WorkflowState};

/// Owns job persistence, concurrency admission, and the workflow driver.
pub struct JobManager {
    store: JobStore,
    ctx: NodeContext,
    slots: Arc<Semaphore>,
}

impl JobManager {
    pub fn new(store: JobStore, ctx: NodeContext) -> Self {
        let slots = Arc::new(Semaphore::new(ctx.config.job_slot_capacity));
        Self { store, ctx, slots }
    }

    /// Create a new root job, honoring idempotency (§4.1 "Idempotency").
    pub async fn submit(&self, initial_state: JobInput, idempotency_key: Option<String>) -> Result<Job> {
        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.store.find_by_idempotency_key(key).await? {
                return Ok(existing);
            }
        }

        let job = Job::new(initial_state, idempotency_key, None, 1, None, Vec::new());
        self.store.insert(&job).await?;
        Ok(job)
    }

    /// Create a reprocessing job, walking the lineage chain for the next
    /// version number and carrying forward the parent's `initial_state` with
    /// the new reference ids applied (§4.1 "Reprocess").
    pub async fn reprocess(
        &self,
        parent_job_id: Uuid,
        reference_ids: Vec<String>,
        reprocess_reason: Option<String>,
    ) -> Result<Job> {
        let parent = self
            .store
            .get(parent_job_id)
            .await?
            .ok_or_else(|| Error::not_found("job", parent_job_id.to_string()))?;

        let job_version = self.store.job_version(parent_job_id, self.ctx.config.max_lineage_depth).await? + 1;

        let mut initial_state = parent.initial_state.clone();
        initial_state.reference_ids = reference_ids.clone();

        let job = Job::new(initial_state, None, Some(parent_job_id), job_version, reprocess_reason, reference_ids.clone());
        self.store.insert(&job).await?;

        self.ctx
            .telemetry
            .emit_event(
                "job_reprocessed",
                json!({
                    "parent_job_id": parent_job_id,
                    "new_job_id": job.id,
                    "reference_ids": reference_ids,
                }),
            )
            .await;

        Ok(job)
    }

    /// Run a job to completion (or to a pause point), honoring the
    /// configured concurrency cap (§4.1 "Concurrency admission").
    pub async fn run(&self, job_id: Uuid) -> Result<Job> {
        let permit = self
            .slots
            .clone()
            .try_acquire_owned()
            .map_err(|_| Error::dependency_unavailable("job_slots", "job queue full: max concurrent jobs reached"))?;

        let mut job = self.store.get(job_id).await?.ok_or_else(|| Error::not_found("job", job_id.to_string()))?;
        job.status = JobStatus::Running;
        job.started_at = Some(chrono::Utc::now());
        self.store.update(&job).await?;

        let mut initial = WorkflowState::new(job.id, job.id.to_string(), job.initial_state.project_id.clone(), job.id.to_string());
        initial.raw_text = job.initial_state.raw_text.clone();
        initial.image_paths = job.initial_state.image_paths.clone();
        initial.pdf_path = job.initial_state.pdf_path.clone();
        initial.reference_ids = job.initial_state.reference_ids.clone();
        initial.force_refresh_context = job.initial_state.force_refresh_context;

        let (state, halt) = run_to_completion(&self.ctx, initial).await?;
        drop(permit);

        job.conflict_report_id = state.conflict_report_id;
        job.reframing_proposal_id = state.reframing_proposal_id;
        job.completed_at = Some(chrono::Utc::now());

        match halt {
            Halt::Succeeded => {
                job.status = JobStatus::Succeeded;
                job.progress = 1.0;
                let metrics_after = calculate_quality_metrics(&state);
                job.quality_metrics_after = Some(metrics_after.clone());

                if let Some(parent_id) = job.parent_job_id {
                    if let Some(parent) = self.store.get(parent_id).await? {
                        if let Some(parent_result) = &parent.result {
                            let metrics_before = calculate_quality_metrics(parent_result);
                            job.quality_metrics_before = Some(metrics_before.clone());
                            let deltas = calculate_quality_deltas(&metrics_before, &metrics_after);
                            self.ctx
                                .telemetry
                                .emit_event(
                                    "job_reprocess_completed",
                                    json!({
                                        "parent_job_id": parent_id,
                                        "new_job_id": job.id,
                                        "quality_deltas": deltas,
                                        "quality_metrics_after": metrics_after,
                                    }),
                                )
                                .await;
                        }
                    }
                }

                job.result = Some(state);
            }
            Halt::NeedsSignoff => {
                job.status = JobStatus::NeedsSignoff;
                job.result = Some(state);
            }
            Halt::Failed => {
                job.status = JobStatus::Failed;
                job.error = state.critiques.last().cloned();
                job.result = Some(state);
            }
            Halt::RetryLater => {
                job.status = JobStatus::Queued;
                job.current_step = Some("retry_later".to_string());
            }
        }

        self.store.update(&job).await?;
        Ok(job)
    }

    pub async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        self.store.get(job_id).await
    }

    pub async fn list_by_project(&self, project_id: &str, limit: usize) -> Result<Vec<Job>> {
        self.store.list_by_project(project_id, limit).await
    }
}
