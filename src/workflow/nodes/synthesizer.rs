//! Synthesizer: turns vetted claims into manuscript prose bound to claim ids
//! via the citation integrity gate (§4.4 "Synthesizer", §4.5).

use std::collections::HashSet;

use crate::context::wrap_prompt_with_context;
use crate::llm::{ChatMessage, CompletionRequest, RouteRequest, TaskType};
use crate::prompts::{SYNTHESIZER_PROMPT, SYNTHESIZER_PROMPT_NAME};
use crate::validation::{apply_tone_guard, extract_claim_ids_from_text, validate_manuscript_blocks, ManuscriptBlock};
use crate::workflow::{Phase, RigorLevel, StateUpdate, WorkflowState};

use super::NodeContext;

const PROMPT_TAG: &str = "production";
const MAX_CLAIMS_IN_PROMPT: usize = 20;

fn rigor_of(state: &WorkflowState) -> RigorLevel {
    state.project_context.as_ref().map(|c| c.rigor_level).unwrap_or(RigorLevel::Exploratory)
}

fn binding_instruction(state: &WorkflowState) -> String {
    let listed = state
        .triples
        .iter()
        .take(MAX_CLAIMS_IN_PROMPT)
        .map(|c| format!("- {}: {}", c.id, c.claim_text))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "CRITICAL OUTPUT REQUIREMENT:\nEnd every paragraph with at least one [[claim_id]] marker drawn from \
the claims below. Do not invent claim ids.\n\nAvailable Claims:\n{}\n",
        if listed.is_empty() { "(none)".to_string() } else { listed }
    )
}

/// Split a raw synthesis response into paragraph-level manuscript blocks,
/// tagging each with the claim ids it cites inline.
fn split_into_blocks(job_id: &str, content: &str) -> Vec<ManuscriptBlock> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .enumerate()
        .map(|(idx, paragraph)| ManuscriptBlock {
            block_id: format!("block_{job_id}_{idx}"),
            text: paragraph.to_string(),
            claim_ids: extract_claim_ids_from_text(paragraph),
            citation_keys: Vec::new(),
        })
        .collect()
}

/// Synthesize vetted claims into manuscript blocks, gated by citation integrity.
/// Aborts with `needs_signoff` set when conservative rigor already flagged
/// human review (the Critic's unresolved-contradiction escape hatch).
pub async fn run(ctx: &NodeContext, state: &WorkflowState) -> crate::error::Result<StateUpdate> {
    let rigor = rigor_of(state);

    if rigor == RigorLevel::Conservative && state.needs_human_review {
        return Ok(StateUpdate::new().with_phase(Phase::Synthesizing).with_critique(
            "synthesis withheld: conservative rigor requires human sign-off before manuscript generation",
        ));
    }

    let (template, prompt_use) = ctx
        .prompts
        .get_active_prompt_with_meta(SYNTHESIZER_PROMPT_NAME, SYNTHESIZER_PROMPT, PROMPT_TAG)
        .await;

    let mut system_prompt = wrap_prompt_with_context(state.project_context.as_ref(), &template);
    system_prompt.push_str("\n\n");
    system_prompt.push_str(&binding_instruction(state));
    system_prompt = ctx.vocab_guard.apply_constraints(&system_prompt);

    let claims_json = serde_json::to_string(&state.triples).unwrap_or_default();
    let request = CompletionRequest::new()
        .with_message(ChatMessage::system(system_prompt))
        .with_message(ChatMessage::user(format!("Vetted claims:\n{claims_json}")))
        .with_max_tokens(8192)
        .deterministic();

    let route = RouteRequest::new(TaskType::Synthesize).deterministic();
    let content = match ctx.gateway.complete(&route, request).await {
        Ok(response) => response.content,
        Err(e) => {
            return Ok(StateUpdate::new()
                .with_phase(Phase::Synthesizing)
                .with_critique(format!("synthesizer expert call failed: {e}")));
        }
    };

    let mut blocks = split_into_blocks(&state.job_id.to_string(), &content);
    for block in &mut blocks {
        let (rewritten, _) = apply_tone_guard(&block.text, &ctx.vocab_guard);
        block.text = rewritten;
    }

    let available_claim_ids: HashSet<String> = state.triples.iter().map(|c| c.id.clone()).collect();
    let (valid_blocks, errors) = validate_manuscript_blocks(&blocks, Some(&available_claim_ids), rigor);

    if rigor == RigorLevel::Conservative && !errors.is_empty() {
        return Ok(StateUpdate::new()
            .with_phase(Phase::Synthesizing)
            .with_critique(format!("citation integrity validation failed: {}", errors.join("; "))));
    }

    let mut update = StateUpdate::new()
        .with_phase(Phase::Synthesizing)
        .with_manuscript_blocks(valid_blocks)
        .with_prompt_use("synthesizer", prompt_use);

    for error in errors {
        update = update.with_critique(error);
    }

    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_blank_lines_and_extracts_claim_ids() {
        let content = "First paragraph cites [[claim_1]].\n\nSecond paragraph cites [[claim_2]] and [[claim_3]].";
        let blocks = split_into_blocks("job1", content);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].claim_ids, vec!["claim_1".to_string()]);
        assert_eq!(blocks[1].claim_ids, vec!["claim_2".to_string(), "claim_3".to_string()]);
    }

    #[test]
    fn empty_paragraphs_are_dropped() {
        let content = "Only one paragraph here.\n\n\n\n";
        let blocks = split_into_blocks("job1", content);
        assert_eq!(blocks.len(), 1);
    }
}
