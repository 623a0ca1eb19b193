//! Saver: persists the vetted extraction and manuscript blocks, enforcing the
//! Librarian Key-Guard on citation keys (§4.4 "Saver").

use serde::Serialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::project::Project;
use crate::workflow::{CriticStatus, Phase, StateUpdate, WorkflowState};

use super::NodeContext;

/// A receipt describing what the Saver wrote, for the caller/telemetry layer.
#[derive(Debug, Clone, Serialize)]
pub struct SavedArtifacts {
    pub extraction_key: String,
    pub saved_block_ids: Vec<String>,
    pub artifact_manifest_id: Option<String>,
}

async fn load_project(ctx: &NodeContext, project_id: &str) -> Option<Project> {
    let value = ctx.document_store.get("projects", project_id).await.ok().flatten()?;
    serde_json::from_value(value).ok()
}

/// Word/claim/citation/table/figure counts and flag tallies, persisted
/// alongside the manifest (§4.4 Saver).
fn build_manifest_summary(state: &WorkflowState) -> serde_json::Value {
    let words: usize = state.manuscript_blocks.iter().map(|b| b.text.split_whitespace().count()).sum();
    let claims = state.triples.len();
    let density = if words > 0 { claims as f64 * 100.0 / words as f64 } else { 0.0 };

    let mut citation_keys = std::collections::HashSet::new();
    for block in &state.manuscript_blocks {
        citation_keys.extend(block.citation_keys.iter().cloned());
    }

    let (mut tables, mut figures) = (0u32, 0u32);
    if let Some(vision_block) = state.raw_text.split("Vision Extracts:\n").nth(1) {
        for line in vision_block.lines().filter(|l| l.starts_with("- ")) {
            if line.to_lowercase().contains("table") {
                tables += 1;
            } else {
                figures += 1;
            }
        }
    }

    let mut flags_by_type = std::collections::HashMap::new();
    if !state.critiques.is_empty() {
        flags_by_type.insert("critique", state.critiques.len());
    }
    if !state.conflict_flags.is_empty() {
        flags_by_type.insert("conflict", state.conflict_flags.len());
    }

    json!({
        "words": words,
        "claims": claims,
        "density": (density * 100.0).round() / 100.0,
        "citations": citation_keys.len(),
        "tables": tables,
        "figures": figures,
        "flags_count_by_type": flags_by_type,
    })
}

async fn next_block_version(ctx: &NodeContext, block_id: &str, project_id: &str) -> u32 {
    let prefix = format!("{project_id}:{block_id}:");
    let keys = ctx.document_store.list_keys("manuscript_blocks").await.unwrap_or_default();
    keys.iter()
        .filter_map(|k| k.strip_prefix(&prefix))
        .filter_map(|v| v.parse::<u32>().ok())
        .max()
        .map(|v| v + 1)
        .unwrap_or(1)
}

/// Persist the extraction and manuscript blocks. Raises on a failed citation
/// key-guard check rather than swallowing it, so job failure is tracked (§4.4 Saver).
pub async fn run(ctx: &NodeContext, state: &WorkflowState) -> Result<StateUpdate> {
    let status_label = match state.critic_status {
        Some(CriticStatus::Pass) => "pass",
        _ => "needs_manual_review",
    };

    let extraction_key = state.job_id.to_string();
    ctx.document_store
        .put(
            "extractions",
            &extraction_key,
            json!({
                "project_id": state.project_id,
                "ingestion_id": state.ingestion_id,
                "triples": state.triples,
                "critiques": state.critiques,
                "status": status_label,
            }),
        )
        .await?;

    ctx.graph_store.store_claims(&state.project_id, &state.ingestion_id, &state.triples).await?;

    let mut saved_block_ids = Vec::new();
    if !state.manuscript_blocks.is_empty() {
        let all_citation_keys: Vec<String> =
            state.manuscript_blocks.iter().flat_map(|b| b.citation_keys.iter().cloned()).collect();

        if !all_citation_keys.is_empty() {
            let project = load_project(ctx, &state.project_id).await;
            let missing = match &project {
                Some(project) => project.missing_citation_keys(&all_citation_keys),
                None => all_citation_keys.clone(),
            };
            if !missing.is_empty() {
                return Err(Error::validation(format!(
                    "citation keys not found in project bibliography: {missing:?}; add these keys before saving"
                )));
            }
        }

        for block in &state.manuscript_blocks {
            let version = next_block_version(ctx, &block.block_id, &state.project_id).await;
            let key = format!("{}:{}:{}", state.project_id, block.block_id, version);
            ctx.document_store
                .put(
                    "manuscript_blocks",
                    &key,
                    json!({
                        "block_id": block.block_id,
                        "project_id": state.project_id,
                        "text": block.text,
                        "claim_ids": block.claim_ids,
                        "citation_keys": block.citation_keys,
                        "version": version,
                    }),
                )
                .await?;
            saved_block_ids.push(block.block_id.clone());
        }
    }

    let manifest_id = format!("manifest-{}", state.job_id);
    let manifest_result = ctx
        .document_store
        .put(
            "artifact_manifests",
            &manifest_id,
            json!({
                "job_id": state.job_id,
                "project_id": state.project_id,
                "extraction_key": extraction_key,
                "saved_block_ids": saved_block_ids,
                "manifest_summary": build_manifest_summary(state),
            }),
        )
        .await;

    let artifact_manifest_id = manifest_result.is_ok().then(|| manifest_id.clone());

    let receipt = SavedArtifacts { extraction_key, saved_block_ids, artifact_manifest_id };

    Ok(StateUpdate::new()
        .with_phase(Phase::Done)
        .with_critique(format!("saved: {} block(s), manifest={:?}", receipt.saved_block_ids.len(), receipt.artifact_manifest_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::{InMemoryDocumentStore, InMemoryGraphStore, InMemoryVectorStore};
    use crate::config::{BackpressureConfig, OrchestratorConfig, RegistryConfig};
    use crate::llm::{Gateway, ModelRegistry, ModelRouter};
    use crate::prompts::PromptRegistry;
    use crate::validation::{ManuscriptBlock, VocabGuard};
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
    async fn saving_without_citation_keys_skips_bibliography_check() {
        let ctx = test_ctx();
        let mut state = WorkflowState::new(Uuid::new_v4(), "t1", "p1", "i1");
        state.manuscript_blocks = vec![ManuscriptBlock {
            block_id: "b0".into(),
            text: "some prose".into(),
            claim_ids: vec![],
            citation_keys: vec![],
        }];
        let update = run(&ctx, &state).await.unwrap();
        assert_eq!(update.phase, Some(Phase::Done));
    }

    #[tokio::test]
    async fn saving_with_unknown_citation_key_fails() {
        let ctx = test_ctx();
        let mut state = WorkflowState::new(Uuid::new_v4(), "t1", "p1", "i1");
        state.manuscript_blocks = vec![ManuscriptBlock {
            block_id: "b0".into(),
            text: "some prose".into(),
            claim_ids: vec![],
            citation_keys: vec!["unknown2024".into()],
        }];
        let result = run(&ctx, &state).await;
        assert!(result.is_err());
    }

    #[test]
    fn manifest_summary_counts_words_claims_and_citations() {
        let mut state = WorkflowState::new(Uuid::new_v4(), "t1", "p1", "i1");
        state.triples.push(crate::claims::Claim::new("A", "mitigates", "B"));
        state.manuscript_blocks = vec![ManuscriptBlock {
            block_id: "b0".into(),
            text: "four distinct words here".into(),
            claim_ids: vec![],
            citation_keys: vec!["smith2020".into(), "smith2020".into()],
        }];
        let summary = build_manifest_summary(&state);
        assert_eq!(summary["words"], 4);
        assert_eq!(summary["claims"], 1);
        assert_eq!(summary["citations"], 1);
    }

    #[test]
    fn manifest_summary_splits_figures_and_tables_from_vision_block() {
        let mut state = WorkflowState::new(Uuid::new_v4(), "t1", "p1", "i1");
        state.raw_text = "body text\n\nVision Extracts:\n- Figure 1: a chart\n- Table 2: rows\n".into();
        let summary = build_manifest_summary(&state);
        assert_eq!(summary["figures"], 1);
        assert_eq!(summary["tables"], 1);
    }
}
