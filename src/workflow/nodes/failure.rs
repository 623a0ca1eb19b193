//! Failure Cleanup: terminal handler that surfaces the workflow's error and
//! emits a closing telemetry event (§4.4 "Failure Cleanup").

use serde_json::json;

use crate::workflow::{Phase, StateUpdate, WorkflowState};

use super::NodeContext;

/// Mark the job phase `Done` with the failure recorded in `critiques`, and emit
/// a terminal `system_failure` telemetry event. Never raises: this is the last
/// node on the failure path and must always leave the job in a terminal state.
pub async fn run(ctx: &NodeContext, state: &WorkflowState) -> crate::error::Result<StateUpdate> {
    let reason = state
        .critiques
        .last()
        .cloned()
        .unwrap_or_else(|| "workflow failed with no recorded critique".to_string());

    ctx.telemetry
        .emit_event(
            "system_failure",
            json!({
                "job_id": state.job_id,
                "project_id": state.project_id,
                "node_name": "failure_cleanup",
                "error": reason,
                "revision_count": state.revision_count,
            }),
        )
        .await;

    Ok(StateUpdate::new().with_phase(Phase::Done).with_critique(format!("job failed: {reason}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::{InMemoryDocumentStore, InMemoryGraphStore, InMemoryVectorStore};
    use crate::config::{BackpressureConfig, OrchestratorConfig, RegistryConfig};
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

    #[tokio::test]
    async fn always_sets_done_phase() {
        let ctx = test_ctx();
        let mut state = WorkflowState::new(Uuid::new_v4(), "t1", "p1", "i1");
        state.critiques.push("deadlock detected".to_string());
        let update = run(&ctx, &state).await.unwrap();
        assert_eq!(update.phase, Some(Phase::Done));
    }

    #[tokio::test]
    async fn falls_back_to_generic_reason_without_critiques() {
        let ctx = test_ctx();
        let state = WorkflowState::new(Uuid::new_v4(), "t1", "p1", "i1");
        let update = run(&ctx, &state).await.unwrap();
        assert_eq!(update.append_critiques.len(), 1);
    }
}
