//! Workflow state: the record nodes exchange, and the reducer that merges
//! partial updates between them (§3.2, §9 "Reducer semantics").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::claims::Claim;
use crate::conflict::ConflictReport;
use crate::context::ProjectContext;
use crate::prompts::PromptUse;
use crate::validation::ManuscriptBlock;

/// Policy tier controlling whether missing evidence fails hard or warns (Glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RigorLevel {
    Exploratory,
    Conservative,
}

/// Which stage of the pipeline a job is currently in (§3.2 `phase`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Ingesting,
    Mapping,
    Vetting,
    Synthesizing,
    Persisting,
    Done,
}

/// The Critic's verdict for the current revision (§3.2 `critic_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticStatus {
    Pass,
    Fail,
    RetryLater,
}

/// The record nodes exchange; each node returns a [`StateUpdate`] that the
/// reducer merges into this (§3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub job_id: Uuid,
    pub thread_id: String,
    pub project_id: String,
    pub ingestion_id: String,

    pub raw_text: String,
    pub image_paths: Vec<String>,
    pub pdf_path: Option<String>,
    pub reference_ids: Vec<String>,

    pub project_context: Option<ProjectContext>,

    pub triples: Vec<Claim>,
    pub critiques: Vec<String>,
    pub revision_count: u32,
    pub critic_status: Option<CriticStatus>,

    pub conflict_flags: Vec<String>,
    pub conflict_report: Option<ConflictReport>,
    pub conflict_report_id: Option<Uuid>,
    pub conflict_detected: bool,

    pub needs_human_review: bool,
    pub needs_signoff: bool,
    pub reframing_proposal_id: Option<Uuid>,

    pub manuscript_blocks: Vec<ManuscriptBlock>,
    pub prompt_manifest: HashMap<String, PromptUse>,

    pub phase: Phase,
    pub force_refresh_context: bool,
}

impl WorkflowState {
    pub fn new(job_id: Uuid, thread_id: impl Into<String>, project_id: impl Into<String>, ingestion_id: impl Into<String>) -> Self {
        Self {
            job_id,
            thread_id: thread_id.into(),
            project_id: project_id.into(),
            ingestion_id: ingestion_id.into(),
            raw_text: String::new(),
            image_paths: Vec::new(),
            pdf_path: None,
            reference_ids: Vec::new(),
            project_context: None,
            triples: Vec::new(),
            critiques: Vec::new(),
            revision_count: 0,
            critic_status: None,
            conflict_flags: Vec::new(),
            conflict_report: None,
            conflict_report_id: None,
            conflict_detected: false,
            needs_human_review: false,
            needs_signoff: false,
            reframing_proposal_id: None,
            manuscript_blocks: Vec::new(),
            prompt_manifest: HashMap::new(),
            phase: Phase::Ingesting,
            force_refresh_context: false,
        }
    }

    /// Apply a partial update: scalar fields overwrite when set, the
    /// designated list fields (triples, manuscript_blocks, critiques,
    /// conflict_flags) are append-reduced (§9 "Reducer semantics").
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(phase) = update.phase {
            self.phase = phase;
        }
        if let Some(project_context) = update.project_context {
            self.project_context = Some(project_context);
        }
        if let Some(critic_status) = update.critic_status {
            self.critic_status = Some(critic_status);
        }
        if update.increment_revision_count {
            self.revision_count += 1;
        }
        if let Some(conflict_report_id) = update.conflict_report_id {
            self.conflict_report_id = Some(conflict_report_id);
        }
        if let Some(conflict_report) = update.conflict_report {
            self.conflict_report = Some(conflict_report);
        }
        if let Some(reframing_proposal_id) = update.reframing_proposal_id {
            self.reframing_proposal_id = Some(reframing_proposal_id);
        }
        if let Some(conflict_detected) = update.conflict_detected {
            self.conflict_detected = conflict_detected;
        }
        if let Some(needs_human_review) = update.needs_human_review {
            self.needs_human_review = needs_human_review;
        }
        if let Some(needs_signoff) = update.needs_signoff {
            self.needs_signoff = needs_signoff;
        }
        if let Some(triples) = update.replace_triples {
            self.triples = triples;
        }
        if let Some(raw_text) = update.raw_text {
            self.raw_text = raw_text;
        }

        self.triples.extend(update.append_triples);
        self.manuscript_blocks.extend(update.append_manuscript_blocks);
        self.critiques.extend(update.append_critiques);
        self.conflict_flags.extend(update.append_conflict_flags);
        self.prompt_manifest.extend(update.prompt_manifest);
    }
}

/// A partial update returned by a node; fields left at their default are no-ops
/// in the reducer (§3.2, §9).
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub phase: Option<Phase>,
    pub project_context: Option<ProjectContext>,
    pub critic_status: Option<CriticStatus>,
    pub increment_revision_count: bool,
    pub conflict_report: Option<ConflictReport>,
    pub conflict_report_id: Option<Uuid>,
    pub reframing_proposal_id: Option<Uuid>,
    pub conflict_detected: Option<bool>,
    pub needs_human_review: Option<bool>,
    pub needs_signoff: Option<bool>,
    pub raw_text: Option<String>,

    /// Overwrite the full triples list (used to reset to `[]` on parse failure).
    pub replace_triples: Option<Vec<Claim>>,
    pub append_triples: Vec<Claim>,
    pub append_manuscript_blocks: Vec<ManuscriptBlock>,
    pub append_critiques: Vec<String>,
    pub append_conflict_flags: Vec<String>,
    pub prompt_manifest: HashMap<String, PromptUse>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_critic_status(mut self, status: CriticStatus) -> Self {
        self.critic_status = Some(status);
        self
    }

    /// Set the hydrated project context (§4.4 Cartographer step 1).
    pub fn with_project_context(mut self, context: ProjectContext) -> Self {
        self.project_context = Some(context);
        self
    }

    pub fn incrementing_revision_count(mut self) -> Self {
        self.increment_revision_count = true;
        self
    }

    pub fn with_conflict_report(mut self, report: ConflictReport) -> Self {
        self.conflict_report_id = Some(report.id);
        self.conflict_report = Some(report);
        self
    }

    pub fn with_critique(mut self, critique: impl Into<String>) -> Self {
        self.append_critiques.push(critique.into());
        self
    }

    pub fn with_triples(mut self, triples: Vec<Claim>) -> Self {
        self.append_triples = triples;
        self
    }

    pub fn replacing_triples(mut self, triples: Vec<Claim>) -> Self {
        self.replace_triples = Some(triples);
        self
    }

    pub fn with_manuscript_blocks(mut self, blocks: Vec<ManuscriptBlock>) -> Self {
        self.append_manuscript_blocks = blocks;
        self
    }

    pub fn with_conflict_flag(mut self, flag: impl Into<String>) -> Self {
        self.append_conflict_flags.push(flag.into());
        self
    }

    pub fn with_prompt_use(mut self, node_name: impl Into<String>, prompt_use: PromptUse) -> Self {
        self.prompt_manifest.insert(node_name.into(), prompt_use);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::PromptSource;

    fn base_state() -> WorkflowState {
        WorkflowState::new(Uuid::new_v4(), "thread-1", "proj-1", "ing-1")
    }

    #[test]
    fn scalar_fields_overwrite() {
        let mut state = base_state();
        state.apply(StateUpdate::new().with_phase(Phase::Mapping));
        assert_eq!(state.phase, Phase::Mapping);
        state.apply(StateUpdate::new().with_phase(Phase::Vetting));
        assert_eq!(state.phase, Phase::Vetting);
    }

    #[test]
    fn list_fields_append_across_updates() {
        let mut state = base_state();
        state.apply(StateUpdate::new().with_critique("first issue"));
        state.apply(StateUpdate::new().with_critique("second issue"));
        assert_eq!(state.critiques, vec!["first issue", "second issue"]);
    }

    #[test]
    fn revision_count_increments_are_additive() {
        let mut state = base_state();
        state.apply(StateUpdate::new().incrementing_revision_count());
        state.apply(StateUpdate::new().incrementing_revision_count());
        assert_eq!(state.revision_count, 2);
    }

    #[test]
    fn replace_triples_resets_rather_than_appends() {
        let mut state = base_state();
        state.apply(StateUpdate::new().with_triples(vec![Claim::new("A", "B", "C")]));
        assert_eq!(state.triples.len(), 1);
        state.apply(StateUpdate::new().replacing_triples(vec![]));
        assert_eq!(state.triples.len(), 0);
    }

    #[test]
    fn prompt_manifest_entries_accumulate_by_node_name() {
        let mut state = base_state();
        let prompt_use = PromptUse {
            prompt_name: "cartographer-v1".into(),
            tag: "production".into(),
            resolved_source: PromptSource::Default,
            cache_hit: false,
            template_length: 42,
            template_sha256: "deadbeef".into(),
            retrieved_at: "2024-01-01T00:00:00+00:00".into(),
        };
        state.apply(StateUpdate::new().with_prompt_use("cartographer", prompt_use));
        assert!(state.prompt_manifest.contains_key("cartographer"));
    }
}
