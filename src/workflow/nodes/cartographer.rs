//! Cartographer: extracts a knowledge graph from `raw_text` (§4.4 "Cartographer").

use serde::Deserialize;
use serde_json::Value;

use crate::claims::{Bbox, Claim, SourceAnchor};
use crate::context::wrap_prompt_with_context;
use crate::error::Error;
use crate::llm::{ChatMessage, CompletionRequest, RouteRequest, TaskType};
use crate::project::Project;
use crate::prompts::{CARTOGRAPHER_PROMPT, CARTOGRAPHER_PROMPT_NAME};
use crate::workflow::{Phase, StateUpdate, WorkflowState};

use super::{candidate_entity_names, NodeContext};

const PROMPT_TAG: &str = "production";
const MAX_CANDIDATE_ENTITIES: usize = 20;

#[derive(Debug, Deserialize, Default)]
struct ExtractedPayload {
    #[serde(default)]
    triples: Vec<ExtractedTriple>,
}

#[derive(Debug, Deserialize)]
struct ExtractedTriple {
    subject: String,
    predicate: String,
    object: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    claim_text: Option<String>,
    #[serde(default)]
    relevance_score: f64,
    #[serde(default)]
    rq_hits: Vec<String>,
    #[serde(default)]
    source_pointer: Option<SourcePointer>,
}

fn default_confidence() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct SourcePointer {
    doc_hash: Option<String>,
    page: Option<u32>,
    bbox: Option<[f64; 4]>,
    snippet: Option<String>,
}

/// Strip a fenced ```json ... ``` block if the model wrapped its output in one.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.trim_start_matches("json").trim_start();
        rest.strip_suffix("```").unwrap_or(rest).trim()
    } else {
        trimmed
    }
}

/// Parse the Extraction expert's response into a (possibly empty) triples list.
/// A JSON parse failure degrades to an empty list rather than raising, so the
/// Critic is the one that rejects a bad extraction (§4.4 step 5).
fn parse_triples(content: &str) -> Vec<Claim> {
    let stripped = strip_code_fence(content);
    let payload: ExtractedPayload = serde_json::from_str(stripped).unwrap_or_default();

    payload
        .triples
        .into_iter()
        .map(|t| {
            let claim_text = t.claim_text.unwrap_or_else(|| format!("{} {} {}", t.subject, t.predicate, t.object));
            let mut claim = Claim::new(t.subject, t.predicate, t.object);
            claim.confidence = t.confidence;
            claim.claim_text = claim_text;
            claim.relevance_score = t.relevance_score;
            claim.rq_hits = t.rq_hits;

            if let Some(pointer) = t.source_pointer {
                let mut anchor = SourceAnchor::default();
                if let (Some(doc_hash), Some(page)) = (pointer.doc_hash.clone(), pointer.page) {
                    anchor = SourceAnchor::new(doc_hash, page);
                }
                if let Some([x, y, w, h]) = pointer.bbox {
                    anchor = anchor.with_bbox(Bbox { x, y, w, h });
                }
                if let Some(snippet) = pointer.snippet {
                    anchor = anchor.with_snippet(snippet);
                }
                claim = claim.with_source_anchor(anchor);
            }

            claim
        })
        .collect()
}

fn schema_instruction() -> &'static str {
    "CRITICAL: respond with JSON only (no prose, no markdown fences), matching: \
{\"triples\": [{\"subject\": str, \"predicate\": str, \"object\": str, \"confidence\": 0.0-1.0, \
\"claim_text\": str, \"relevance_score\": 0.0-1.0, \"rq_hits\": [str], \
\"source_pointer\": {\"doc_hash\": str, \"page\": int, \"bbox\": [x,y,w,h], \"snippet\": str}}]}. \
Every triple MUST include subject, predicate, object, confidence, claim_text, and a non-empty rq_hits."
}

/// Hydrate the project context by `project_id` when the state doesn't already
/// carry one, raising a terminal not-found error if the project doesn't exist
/// (§4.4 Cartographer step 1).
async fn hydrate_project_context(ctx: &NodeContext, project_id: &str) -> crate::error::Result<crate::context::ProjectContext> {
    let value = ctx
        .document_store
        .get("projects", project_id)
        .await?
        .ok_or_else(|| Error::not_found("project", project_id.to_string()))?;
    let project: Project = serde_json::from_value(value)?;
    Ok(project.to_context())
}

/// Extract a knowledge graph from `state.raw_text`, folding in prior critiques,
/// candidate/canonical knowledge, and RQ-scoped evidence chunks (§4.4 steps 1-6).
pub async fn run(ctx: &NodeContext, state: &WorkflowState) -> crate::error::Result<StateUpdate> {
    let loaded_context = match &state.project_context {
        Some(_) => None,
        None => Some(hydrate_project_context(ctx, &state.project_id).await?),
    };
    let project_context = state.project_context.as_ref().or(loaded_context.as_ref());

    let (template, prompt_use) = ctx
        .prompts
        .get_active_prompt_with_meta(CARTOGRAPHER_PROMPT_NAME, CARTOGRAPHER_PROMPT, PROMPT_TAG)
        .await;

    let mut system_prompt = wrap_prompt_with_context(project_context, &template);
    system_prompt.push_str("\n\n");
    system_prompt.push_str(schema_instruction());

    let entity_names = candidate_entity_names(&state.raw_text, MAX_CANDIDATE_ENTITIES);
    let project_id = state.project_id.as_str();

    let mut conflict_flags = Vec::new();
    if !entity_names.is_empty() {
        let canonical = ctx.graph_store.canonical_knowledge(project_id, &entity_names).await?;
        let candidate = if state.force_refresh_context && !state.reference_ids.is_empty() {
            ctx.graph_store.candidate_knowledge(project_id, &state.reference_ids).await?
        } else {
            Vec::new()
        };

        // Candidate facts take priority: where they disagree with canonical
        // knowledge on the same normalized (subject, predicate), drop canonical.
        for cand in &candidate {
            let conflicting = canonical.iter().find(|c| {
                c.normalized_subject() == cand.normalized_subject()
                    && c.normalized_predicate() == cand.normalized_predicate()
                    && c.normalized_object() != cand.normalized_object()
            });
            if let Some(conflicting) = conflicting {
                conflict_flags.push(format!(
                    "candidate knowledge overrides canonical: {} {} [{} vs {}]",
                    cand.subject, cand.predicate, cand.object, conflicting.object
                ));
            }
        }

        if !canonical.is_empty() {
            let mut knowledge_section = String::from("\n\nEstablished Knowledge:\n");
            for entry in canonical.iter().take(10) {
                knowledge_section.push_str(&format!("- {} {} {}\n", entry.subject, entry.predicate, entry.object));
            }
            knowledge_section.push_str("Use this to focus on novel or updated relationships.");
            system_prompt.push_str(&knowledge_section);
        }
    }

    if state.force_refresh_context {
        system_prompt.push_str("\nForce refresh context: prioritize latest evidence and candidate facts.");
    }

    let mut user_sections = Vec::new();
    if let Some(context) = project_context {
        if !context.research_questions.is_empty() {
            let chunks_per_rq = ctx.config.chunks_per_research_question;
            for (idx, rq_text) in context.research_questions.iter().enumerate() {
                let chunks = ctx
                    .vector_store
                    .top_k("document_chunks", project_id, Some(&state.ingestion_id), rq_text, chunks_per_rq)
                    .await?;
                if chunks.is_empty() {
                    continue;
                }
                user_sections.push(format!("RQ{} Evidence:", idx + 1));
                for chunk in &chunks {
                    user_sections.push(format!("[Page {}] {}", chunk.anchor.page_number, chunk.text));
                }
            }
        }
    }

    if user_sections.is_empty() {
        user_sections.push(format!("Document:\n{}", state.raw_text));
    }
    if !state.critiques.is_empty() {
        user_sections.push(format!("Previous critiques: {}", state.critiques.join(" | ")));
    }

    let request = CompletionRequest::new()
        .with_message(ChatMessage::system(system_prompt))
        .with_message(ChatMessage::user(user_sections.join("\n\n")))
        .with_max_tokens(4096)
        .deterministic();

    let route = RouteRequest::new(TaskType::Extract).deterministic();
    let triples = match ctx.gateway.complete(&route, request).await {
        Ok(response) => parse_triples(&response.content),
        Err(_) => Vec::new(),
    };

    let mut update = StateUpdate::new()
        .with_phase(Phase::Mapping)
        .with_triples(triples)
        .with_prompt_use("cartographer", prompt_use);

    if let Some(context) = loaded_context {
        update = update.with_project_context(context);
    }

    for flag in conflict_flags.drain(..) {
        update = update.with_conflict_flag(flag);
    }

    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::{InMemoryDocumentStore, InMemoryGraphStore, InMemoryVectorStore};
    use crate::config::{BackpressureConfig, OrchestratorConfig, RegistryConfig};
    use crate::llm::{Gateway, ModelRegistry, ModelRouter};
    use crate::project::Project;
    use crate::prompts::PromptRegistry;
    use crate::validation::VocabGuard;
    use crate::workflow::nodes::NodeContext;
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
            telemetry: Arc::new(crate::telemetry::TelemetryEmitter::noop()),
        }
    }

    #[tokio::test]
    async fn missing_project_raises_a_not_found_error() {
        let ctx = test_ctx();
        let state = WorkflowState::new(Uuid::new_v4(), "t1", "missing-project", "i1");
        let result = run(&ctx, &state).await;
        assert!(matches!(result, Err(crate::error::Error::NotFound { kind: "project", .. })));
    }

    #[tokio::test]
    async fn existing_project_is_hydrated_into_the_update() {
        let ctx = test_ctx();
        let project = Project::new("Title", "Thesis").with_research_questions(vec!["RQ1".into()]);
        ctx.document_store.put("projects", &project.id, serde_json::to_value(&project).unwrap()).await.unwrap();
        let state = WorkflowState::new(Uuid::new_v4(), "t1", project.id.clone(), "i1");
        let update = run(&ctx, &state).await.unwrap();
        let context = update.project_context.expect("context should be hydrated");
        assert_eq!(context.thesis.as_deref(), Some("Thesis"));
    }

    #[test]
    fn parses_well_formed_triples_json() {
        let content = r#"{"triples":[{"subject":"Input validation","predicate":"MITIGATES","object":"SQL injection","confidence":0.9,"claim_text":"Input validation mitigates SQL injection.","rq_hits":["RQ1"],"source_pointer":{"doc_hash":"abc123","page":4,"bbox":[1.0,2.0,3.0,4.0],"snippet":"validated inputs"}}]}"#;
        let claims = parse_triples(content);
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].subject, "Input validation");
        assert_eq!(claims[0].rq_hits, vec!["RQ1".to_string()]);
        assert_eq!(claims[0].source_anchor.page_number, Some(4));
    }

    #[test]
    fn strips_markdown_code_fence() {
        let content = "```json\n{\"triples\": []}\n```";
        assert_eq!(parse_triples(content).len(), 0);
    }

    #[test]
    fn malformed_json_degrades_to_empty_list() {
        let claims = parse_triples("not json at all");
        assert!(claims.is_empty());
    }
}
