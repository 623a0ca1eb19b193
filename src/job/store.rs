//! Job persistence: a thin typed wrapper over [`DocumentStore`]'s `jobs`
//! collection (§3.1, §4.1 "Job store").
//!
//! The original persists jobs to a graph database with an in-memory
//! degrade-to-memory fallback; here that split already lives one layer down,
//! inside the `DocumentStore` implementation the caller wires in (real store
//! vs. [`crate::collections::InMemoryDocumentStore`]). This module only knows
//! how to serialize a [`Job`] in and out of it.

use std::sync::Arc;

use uuid::Uuid;

use crate::collections::DocumentStore;
use crate::error::Result;
use crate::job::model::{Job, JobStatus};

const COLLECTION: &str = "jobs";

/// Typed job persistence over a [`DocumentStore`].
pub struct JobStore {
    documents: Arc<dyn DocumentStore>,
}

impl JobStore {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Find an existing job by idempotency key, if one was already created
    /// with it (§4.1 "Idempotency").
    pub async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Job>> {
        for job in self.list_all().await? {
            if job.idempotency_key.as_deref() == Some(key) {
                return Ok(Some(job));
            }
        }
        Ok(None)
    }

    pub async fn insert(&self, job: &Job) -> Result<()> {
        let value = serde_json::to_value(job)?;
        self.documents.put(COLLECTION, &job.id.to_string(), value).await
    }

    pub async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        match self.documents.get(COLLECTION, &job_id.to_string()).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(None),
        }
    }

    pub async fn update(&self, job: &Job) -> Result<()> {
        self.insert(job).await
    }

    async fn list_all(&self) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        for key in self.documents.list_keys(COLLECTION).await? {
            if let Some(value) = self.documents.get(COLLECTION, &key).await? {
                if let Ok(job) = serde_json::from_value::<Job>(value) {
                    jobs.push(job);
                }
            }
        }
        Ok(jobs)
    }

    /// List jobs for a project, most recent first (§4.1 "List jobs").
    pub async fn list_by_project(&self, project_id: &str, limit: usize) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> =
            self.list_all().await?.into_iter().filter(|j| j.initial_state.project_id == project_id).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit);
        Ok(jobs)
    }

    /// Walk the parent chain to compute the version a reprocess of `job_id`
    /// should receive, with cycle and depth protection (§4.1 "Lineage").
    /// Mirrors the original's sentinel-on-cycle-or-overflow behavior: both
    /// fold back to version 1 at the root call.
    pub async fn job_version(&self, job_id: Uuid, max_depth: u32) -> Result<i64> {
        let mut visited = std::collections::HashSet::new();
        match self.job_version_inner(job_id, &mut visited, 0, max_depth).await? {
            v if v < 1 => Ok(1),
            v => Ok(v),
        }
    }

    fn job_version_inner<'a>(
        &'a self,
        job_id: Uuid,
        visited: &'a mut std::collections::HashSet<Uuid>,
        depth: u32,
        max_depth: u32,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<i64>> + Send + 'a>> {
        Box::pin(async move {
            if visited.contains(&job_id) || depth > max_depth {
                return Ok(-1);
            }
            visited.insert(job_id);

            let version = match self.get(job_id).await? {
                Some(job) => match job.parent_job_id {
                    Some(parent_id) => {
                        let parent_version = self.job_version_inner(parent_id, visited, depth + 1, max_depth).await?;
                        if parent_version < 0 { -1 } else { parent_version + 1 }
                    }
                    None => job.job_version,
                },
                None => 1,
            };

            visited.remove(&job_id);
            Ok(version)
        })
    }

    /// Attach a conflict report id to a job record (§3.5).
    pub async fn attach_conflict_report(&self, job_id: Uuid, report_id: Uuid) -> Result<()> {
        if let Some(mut job) = self.get(job_id).await? {
            job.conflict_report_id = Some(report_id);
            self.update(&job).await?;
        }
        Ok(())
    }

    /// Attach a reframing proposal id and move the job to `NEEDS_SIGNOFF` (§3.6).
    pub async fn attach_reframing_proposal(&self, job_id: Uuid, proposal_id: Uuid) -> Result<()> {
        if let Some(mut job) = self.get(job_id).await? {
            job.reframing_proposal_id = Some(proposal_id);
            job.status = JobStatus::NeedsSignoff;
            self.update(&job).await?;
        }
        Ok(())
    }
}
