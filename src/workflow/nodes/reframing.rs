//! Reframing: on a declared deadlock, produce a deterministic pivot proposal and
//! pause the workflow for human signoff (§4.4 "Reframing").

use serde_json::json;

use crate::conflict::{RecommendedNextStep, ReframingProposal};
use crate::workflow::{StateUpdate, WorkflowState};

use super::NodeContext;

/// Build and persist a [`ReframingProposal`] when the conflict report recommends
/// pausing or reframing and the revision count has reached the deadlock
/// threshold; otherwise a no-op (`needs_signoff` stays false).
pub async fn run(ctx: &NodeContext, state: &WorkflowState) -> crate::error::Result<StateUpdate> {
    let Some(report) = &state.conflict_report else {
        return Ok(StateUpdate::new());
    };

    let triggered = state.revision_count >= ctx.config.deadlock_revision_threshold
        && report.deadlock
        && matches!(
            report.recommended_next_step,
            RecommendedNextStep::TriggerReframing | RecommendedNextStep::PauseForHuman
        );

    if !triggered {
        return Ok(StateUpdate::new());
    }

    let proposal = ReframingProposal::from_report(report);

    let _ = ctx
        .document_store
        .put("reframing_proposals", &proposal.id.to_string(), serde_json::to_value(&proposal).unwrap_or_default())
        .await;

    ctx.telemetry
        .emit_event(
            "reframe_proposed",
            json!({
                "proposal_id": proposal.id,
                "job_id": state.job_id,
                "conflict_hash": proposal.conflict_hash,
                "pivot_type": proposal.pivot_type,
            }),
        )
        .await;

    Ok(StateUpdate {
        reframing_proposal_id: Some(proposal.id),
        needs_signoff: Some(true),
        ..StateUpdate::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::{InMemoryDocumentStore, InMemoryGraphStore, InMemoryVectorStore};
    use crate::config::{BackpressureConfig, OrchestratorConfig, RegistryConfig};
    use crate::conflict::{ConflictItem, ConflictReport, ConflictType, Producer, Severity};
    use crate::llm::{Gateway, ModelRegistry, ModelRouter};
    use crate::prompts::PromptRegistry;
    use crate::telemetry::TelemetryEmitter;
    use crate::validation::VocabGuard;
    use std::sync::Arc;
    use uuid::Uuid;

    fn test_ctx() -> NodeContext {
        let router = ModelRouter::new(ModelRegistry::with_defaults());
        NodeContext {
            gateway: Arc::new(Gateway::new(router, BackpressureConfig::default())),
            prompts: Arc::new(PromptRegistry::new(RegistryConfig::default())),
            vocab_guard: Arc::new(VocabGuard::default()),
            document_store: Arc::new(InMemoryDocumentStore::new()),
            vector_store: Arc::new(InMemoryVectorStore::new()),
            graph_store: Arc::new(InMemoryGraphStore::new()),
            config: Arc::new(OrchestratorConfig::default()),
            telemetry: Arc::new(TelemetryEmitter::noop()),
        }
    }

    fn blocker_item() -> ConflictItem {
        ConflictItem::new(ConflictType::Contradiction, Severity::Blocker, "X relates_to conflicting objects", "details", Producer::Critic)
    }

    #[tokio::test]
    async fn no_conflict_report_is_a_noop() {
        let ctx = test_ctx();
        let state = WorkflowState::new(Uuid::new_v4(), "t1", "p1", "i1");
        let update = run(&ctx, &state).await.unwrap();
        assert!(update.needs_signoff.is_none());
    }

    #[tokio::test]
    async fn deadlocked_report_triggers_signoff() {
        let ctx = test_ctx();
        let mut state = WorkflowState::new(Uuid::new_v4(), "t1", "p1", "i1");
        state.revision_count = 2;
        state.conflict_report = Some(ConflictReport::new("p1", state.job_id, None, 2, "fail", vec![blocker_item()], 2));
        let update = run(&ctx, &state).await.unwrap();
        assert_eq!(update.needs_signoff, Some(true));
        assert!(update.reframing_proposal_id.is_some());
    }

    #[tokio::test]
    async fn non_deadlocked_report_is_a_noop() {
        let ctx = test_ctx();
        let mut state = WorkflowState::new(Uuid::new_v4(), "t1", "p1", "i1");
        state.revision_count = 1;
        state.conflict_report = Some(ConflictReport::new("p1", state.job_id, None, 1, "fail", vec![blocker_item()], 2));
        let update = run(&ctx, &state).await.unwrap();
        assert!(update.needs_signoff.is_none());
    }
}
