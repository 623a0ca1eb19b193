//! Critic: validates evidence binding, detects contradictions, and issues a
//! pass/fail/retry_later verdict (§4.4 "Critic").

use serde::Deserialize;

use crate::claims::validate_claim_evidence;
use crate::conflict::{detect_contradictions, ConflictReport, Severity};
use crate::context::wrap_prompt_with_context;
use crate::llm::{is_garbled, ChatMessage, CompletionRequest, RouteRequest, TaskType};
use crate::prompts::{CRITIC_PROMPT, CRITIC_PROMPT_NAME};
use crate::workflow::{CriticStatus, Phase, RigorLevel, StateUpdate, WorkflowState};

use super::NodeContext;

const PROMPT_TAG: &str = "production";

#[derive(Debug, Deserialize, Default)]
struct BrainVerdict {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    critiques: Vec<String>,
}

fn rigor_of(state: &WorkflowState) -> RigorLevel {
    state.project_context.as_ref().map(|c| c.rigor_level).unwrap_or(RigorLevel::Exploratory)
}

async fn load_page_text(ctx: &NodeContext, doc_id: &str, page: u32) -> Option<String> {
    let key = format!("{doc_id}:{page}");
    ctx.document_store
        .get("pdf_text_cache", &key)
        .await
        .ok()
        .flatten()
        .and_then(|v| v.get("text").and_then(|t| t.as_str().map(str::to_string)))
}

/// Validate evidence binding and deterministic contradiction-freedom, issue a
/// Brain-adjudicated verdict, and build a [`ConflictReport`] on any conflict (§4.4).
pub async fn run(ctx: &NodeContext, state: &WorkflowState) -> crate::error::Result<StateUpdate> {
    let serialized = serde_json::to_string(&state.triples).unwrap_or_default();
    if is_garbled(&serialized) {
        return Ok(StateUpdate::new()
            .with_phase(Phase::Vetting)
            .with_critique("Extraction appears garbled or contains repetitive tokens (possible FP4 quantization failure)")
            .incrementing_revision_count()
            .with_critic_status(CriticStatus::Fail));
    }

    let rigor = rigor_of(state);
    let mut critiques = Vec::new();
    let mut evidence_ok = !state.triples.is_empty();
    if state.triples.is_empty() {
        critiques.push("extraction produced no triples".to_string());
    }

    for claim in &state.triples {
        let page_text = match (&claim.source_anchor.doc_id, claim.source_anchor.page_number) {
            (Some(doc_id), Some(page)) => load_page_text(ctx, doc_id, page).await,
            _ => None,
        };
        let violations = validate_claim_evidence(claim, page_text.as_deref());
        if rigor == RigorLevel::Conservative && !violations.is_empty() {
            evidence_ok = false;
        } else if violations.iter().any(|v| !matches!(v, crate::claims::EvidenceViolation::SnippetMismatch { .. })) {
            // Missing hard fields fail in every rigor level; only snippet fuzziness is conservative-only.
            evidence_ok = false;
        }
        for violation in violations {
            critiques.push(violation.message());
        }
    }

    let existing = ctx.graph_store.existing_claims(&state.project_id, &state.ingestion_id).await?;
    let mut conflict_items = detect_contradictions(&existing, &state.triples);
    let recurring = state.revision_count + 1 >= ctx.config.deadlock_revision_threshold;
    if recurring {
        for item in conflict_items.iter_mut() {
            item.severity = Severity::Blocker;
        }
    }

    let needs_human_review = rigor == RigorLevel::Conservative && conflict_items.len() >= 3;
    let has_conflict = !conflict_items.is_empty() || !state.conflict_flags.is_empty();

    let (template, prompt_use) =
        ctx.prompts.get_active_prompt_with_meta(CRITIC_PROMPT_NAME, CRITIC_PROMPT, PROMPT_TAG).await;
    let system_prompt = wrap_prompt_with_context(state.project_context.as_ref(), &template);

    let route = RouteRequest::new(TaskType::Adjudicate).deterministic();
    let request = CompletionRequest::new()
        .with_message(ChatMessage::system(system_prompt))
        .with_message(ChatMessage::user(format!("Extracted triples:\n{serialized}")))
        .deterministic();

    let brain_outcome = ctx.gateway.complete(&route, request).await;

    let mut forbidden_hit = None;
    for claim in &state.triples {
        if let Some(word) = ctx.vocab_guard.check_forbidden(&claim.claim_text) {
            forbidden_hit = Some(word);
            break;
        }
    }

    let status = if !evidence_ok {
        CriticStatus::Fail
    } else if has_conflict {
        CriticStatus::Fail
    } else if forbidden_hit.is_some() {
        CriticStatus::Fail
    } else {
        match brain_outcome {
            Err(e) if e.is_dependency_unavailable() => CriticStatus::RetryLater,
            Err(_) => CriticStatus::Fail,
            Ok(response) => {
                let verdict: BrainVerdict = serde_json::from_str(&response.content).unwrap_or_default();
                critiques.extend(verdict.critiques);
                match verdict.status.as_deref() {
                    Some("fail") => CriticStatus::Fail,
                    Some("retry_later") => CriticStatus::RetryLater,
                    _ => CriticStatus::Pass,
                }
            }
        }
    };

    if let Some(word) = &forbidden_hit {
        critiques.push(format!("synthesis uses forbidden term: {word}"));
    }

    let mut update = StateUpdate::new()
        .with_phase(Phase::Vetting)
        .with_critic_status(status)
        .with_prompt_use("critic", prompt_use);

    if needs_human_review {
        update = update.with_conflict_flag("conservative rigor: 3+ contradictions, human review required");
    }
    update.needs_human_review = Some(needs_human_review);

    if matches!(status, CriticStatus::Fail) {
        update = update.incrementing_revision_count();
    }

    for critique in critiques {
        update = update.with_critique(critique);
    }

    if matches!(status, CriticStatus::Fail) && has_conflict {
        let doc_hash = state.triples.first().and_then(|c| c.source_anchor.doc_id.clone());
        let report = ConflictReport::new(
            state.project_id.clone(),
            state.job_id,
            doc_hash,
            state.revision_count + 1,
            "fail",
            conflict_items,
            ctx.config.deadlock_revision_threshold,
        );
        // Persist immutably so `/conflict-report` can address it by id even
        // if the job never reaches a terminal state (§3.5, §6.2).
        let _ = ctx
            .document_store
            .put("conflict_reports", &report.id.to_string(), serde_json::to_value(&report).unwrap_or_default())
            .await;
        update = update.with_conflict_report(report);
    }

    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rigor_defaults_to_exploratory_without_project_context() {
        let state = WorkflowState::new(uuid::Uuid::new_v4(), "t1", "p1", "i1");
        assert_eq!(rigor_of(&state), RigorLevel::Exploratory);
    }
}
