//! The workflow state machine: drives a [`WorkflowState`] through the node
//! graph and implements the Router-after-Critic branching (§4.4 "Router",
//! "State machine invariants").
//!
//! The router is data-driven rather than a trait hierarchy: a node is just an
//! `async fn(&NodeContext, &WorkflowState) -> Result<StateUpdate>`, and the
//! "interface" is the function signature itself (§9 "Dynamic dispatch").

use serde_json::json;

use crate::conflict::{RecommendedNextStep, Severity};
use crate::error::Result;
use crate::telemetry::NodeSpan;

use super::nodes::{self, NodeContext};
use super::state::{CriticStatus, Phase, StateUpdate, WorkflowState};

/// A node in the workflow graph, or one of the two terminal sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeName {
    Cartographer,
    Vision,
    Critic,
    Synthesizer,
    Saver,
    Reframing,
    FailureCleanup,
}

impl NodeName {
    fn label(self) -> &'static str {
        match self {
            Self::Cartographer => "cartographer",
            Self::Vision => "vision",
            Self::Critic => "critic",
            Self::Synthesizer => "synthesizer",
            Self::Saver => "saver",
            Self::Reframing => "reframing",
            Self::FailureCleanup => "failure_cleanup",
        }
    }
}

/// Why [`run_to_completion`] stopped advancing the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// The Saver ran and the job reached its terminal `Done` phase successfully.
    Succeeded,
    /// Reframing raised an interrupt; the job is parked at `NEEDS_SIGNOFF`.
    NeedsSignoff,
    /// Failure Cleanup ran; the job is terminally failed.
    Failed,
    /// Critic hit KV-cache backpressure; the caller should re-enter after a
    /// delay rather than have this loop spin on it (§4.2, §4.4 step 4).
    RetryLater,
}

/// Decide the next node after Critic has run, per the canonical router rules
/// (§4.4 "Router (after Critic)"). Pure function of state + config so it can
/// be unit tested without a [`NodeContext`].
pub fn route_after_critic(state: &WorkflowState, max_revisions: u32, deadlock_revision_threshold: u32) -> NodeName {
    if state.critic_status == Some(CriticStatus::Pass) {
        return NodeName::Synthesizer;
    }

    if state.revision_count < max_revisions {
        return NodeName::Cartographer;
    }

    let recommends_reframing = state
        .conflict_report
        .as_ref()
        .map(|report| {
            matches!(report.recommended_next_step, RecommendedNextStep::TriggerReframing)
                && report.conflict_items.iter().any(|item| item.severity == Severity::Blocker)
        })
        .unwrap_or(false);

    if recommends_reframing && state.revision_count >= deadlock_revision_threshold {
        NodeName::Reframing
    } else {
        NodeName::FailureCleanup
    }
}

/// Wrap a node call with a [`NodeSpan`], recording its duration and ok/error
/// outcome under `node.<name>.<outcome>` (§4.6 "node wrapper").
async fn run_node<F>(ctx: &NodeContext, state: &WorkflowState, node: NodeName, fut: F) -> Result<StateUpdate>
where
    F: std::future::Future<Output = Result<StateUpdate>>,
{
    let span = NodeSpan::start(
        (*ctx.telemetry).clone(),
        node.label(),
        state.job_id.to_string(),
        Some(state.project_id.clone()),
    );
    let result = fut.await;
    let outcome = if result.is_ok() { "ok" } else { "error" };
    span.finish(outcome, json!({})).await;
    result
}

async fn checkpoint(ctx: &NodeContext, state: &WorkflowState, node: NodeName) {
    let Ok(value) = serde_json::to_value(state) else { return };
    let _ = ctx.document_store.put("checkpoints", &state.thread_id, value).await;
    ctx.telemetry
        .emit_event(
            "checkpoint_saved",
            json!({
                "thread_id": state.thread_id,
                "job_id": state.job_id,
                "node": node.label(),
                "phase": state.phase,
            }),
        )
        .await;
}

/// Drive `state` through the node graph until it reaches a terminal sink,
/// checkpointing after every node transition so a crash can resume from the
/// last-applied update (§4.4 "Checkpointing").
///
/// `RetryLater` from Critic (KV-cache backpressure) is the caller's concern:
/// this function returns with `critic_status = RetryLater` and an unchanged
/// phase, and the caller is expected to re-enter after a delay rather than
/// have this loop spin on it.
pub async fn run_to_completion(ctx: &NodeContext, mut state: WorkflowState) -> Result<(WorkflowState, Halt)> {
    loop {
        let update = run_node(ctx, &state, NodeName::Cartographer, nodes::run_cartographer(ctx, &state)).await?;
        state.apply(update);
        checkpoint(ctx, &state, NodeName::Cartographer).await;

        if !state.image_paths.is_empty() {
            let update = run_node(ctx, &state, NodeName::Vision, nodes::run_vision(ctx, &state)).await?;
            state.apply(update);
            checkpoint(ctx, &state, NodeName::Vision).await;
        }

        let update = run_node(ctx, &state, NodeName::Critic, nodes::run_critic(ctx, &state)).await?;
        state.apply(update);
        checkpoint(ctx, &state, NodeName::Critic).await;

        if state.critic_status == Some(CriticStatus::RetryLater) {
            return Ok((state, Halt::RetryLater));
        }

        match route_after_critic(&state, ctx.config.max_revisions, ctx.config.deadlock_revision_threshold) {
            NodeName::Synthesizer => {
                let update = run_node(ctx, &state, NodeName::Synthesizer, nodes::run_synthesizer(ctx, &state)).await?;
                state.apply(update);
                checkpoint(ctx, &state, NodeName::Synthesizer).await;

                let update = run_node(ctx, &state, NodeName::Saver, nodes::run_saver(ctx, &state)).await?;
                state.apply(update);
                checkpoint(ctx, &state, NodeName::Saver).await;

                return Ok((state, Halt::Succeeded));
            }
            NodeName::Cartographer => continue,
            NodeName::Reframing => {
                let update = run_node(ctx, &state, NodeName::Reframing, nodes::run_reframing(ctx, &state)).await?;
                state.apply(update);
                checkpoint(ctx, &state, NodeName::Reframing).await;

                if state.needs_signoff {
                    return Ok((state, Halt::NeedsSignoff));
                }
                let update = run_node(ctx, &state, NodeName::FailureCleanup, nodes::run_failure_cleanup(ctx, &state)).await?;
                state.apply(update);
                checkpoint(ctx, &state, NodeName::FailureCleanup).await;
                return Ok((state, Halt::Failed));
            }
            NodeName::FailureCleanup => {
                let update = run_node(ctx, &state, NodeName::FailureCleanup, nodes::run_failure_cleanup(ctx, &state)).await?;
                state.apply(update);
                checkpoint(ctx, &state, NodeName::FailureCleanup).await;
                return Ok((state, Halt::Failed));
            }
            NodeName::Vision | NodeName::Critic | NodeName::Saver => unreachable!("router never selects these"),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::conflict::{ConflictItem, ConflictReport, ConflictType, Producer};

    use super::*;

    fn base_state() -> WorkflowState {
        WorkflowState::new(Uuid::new_v4(), "t1", "p1", "i1")
    }

    #[test]
    fn pass_routes_to_synthesizer() {
        let mut state = base_state();
        state.critic_status = Some(CriticStatus::Pass);
        assert_eq!(route_after_critic(&state, 3, 2), NodeName::Synthesizer);
    }

    #[test]
    fn fail_under_max_revisions_loops_to_cartographer() {
        let mut state = base_state();
        state.critic_status = Some(CriticStatus::Fail);
        state.revision_count = 1;
        assert_eq!(route_after_critic(&state, 3, 2), NodeName::Cartographer);
    }

    #[test]
    fn exhausted_revisions_with_blocker_recommendation_goes_to_reframing() {
        let mut state = base_state();
        state.critic_status = Some(CriticStatus::Fail);
        state.revision_count = 3;
        let item = ConflictItem::new(ConflictType::Contradiction, Severity::Blocker, "s", "d", Producer::Critic);
        state.conflict_report = Some(ConflictReport::new("p1", state.job_id, None, 3, "fail", vec![item], 2));
        assert_eq!(route_after_critic(&state, 3, 2), NodeName::Reframing);
    }

    #[test]
    fn exhausted_revisions_without_conflict_report_goes_to_failure_cleanup() {
        let mut state = base_state();
        state.critic_status = Some(CriticStatus::Fail);
        state.revision_count = 3;
        assert_eq!(route_after_critic(&state, 3, 2), NodeName::FailureCleanup);
    }

    #[test]
    fn exhausted_revisions_below_deadlock_threshold_goes_to_failure_cleanup() {
        let mut state = base_state();
        state.critic_status = Some(CriticStatus::Fail);
        state.revision_count = 3;
        let item = ConflictItem::new(ConflictType::Contradiction, Severity::Blocker, "s", "d", Producer::Critic);
        state.conflict_report = Some(ConflictReport::new("p1", state.job_id, None, 1, "fail", vec![item], 5));
        assert_eq!(route_after_critic(&state, 3, 5), NodeName::FailureCleanup);
    }
}
