//! Vision: OCRs selected figures/tables and folds the results into `raw_text`
//! (§4.4 "Vision", conditional on non-empty `image_paths`).

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use uuid::Uuid;

use crate::llm::{ChatMessage, CompletionRequest, RouteRequest, TaskType};
use crate::workflow::{StateUpdate, WorkflowState};

use super::NodeContext;

const SIZE_PREFERENCE_THRESHOLD_BYTES: u64 = 500 * 1024;
const PREFERRED_BASENAME_HINTS: &[&str] = &["fig", "table", "chart", "diagram"];

fn is_preferred(path: &str) -> bool {
    let basename = Path::new(path).file_name().and_then(|n| n.to_str()).unwrap_or(path).to_lowercase();
    PREFERRED_BASENAME_HINTS.iter().any(|hint| basename.contains(hint))
        || std::fs::metadata(path).map(|m| m.len() > SIZE_PREFERENCE_THRESHOLD_BYTES).unwrap_or(false)
}

/// Select up to `max_images`, preferring fig/table/chart/diagram basenames or
/// large files, then filling the remainder in input order (§4.4 Vision).
pub fn select_images_for_vision(image_paths: &[String], max_images: usize) -> Vec<String> {
    let mut preferred: Vec<String> = image_paths.iter().filter(|p| is_preferred(p)).cloned().collect();
    if preferred.len() >= max_images {
        preferred.truncate(max_images);
        return preferred;
    }
    for path in image_paths {
        if preferred.len() >= max_images {
            break;
        }
        if !preferred.contains(path) {
            preferred.push(path.clone());
        }
    }
    preferred
}

#[derive(Debug, Deserialize, Default)]
struct VisionExtract {
    #[serde(default)]
    figure_label: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    facts: Vec<VisionFact>,
    #[serde(default)]
    table_rows: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct VisionFact {
    key: String,
    value: String,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

/// Deterministically compose the "Vision Extracts" block appended to `raw_text`.
fn build_vision_context(results: &[(String, VisionExtract)]) -> String {
    let mut block = String::from("\n\nVision Extracts:\n");
    for (path, extract) in results {
        let label = extract.figure_label.clone().unwrap_or_else(|| path.clone());
        block.push_str(&format!("- {label}"));
        if let Some(caption) = &extract.caption {
            block.push_str(&format!(": {caption}"));
        }
        block.push('\n');
        for fact in &extract.facts {
            let unit = fact.unit.as_deref().unwrap_or("");
            block.push_str(&format!("  {} {} {} (confidence={:.2})\n", fact.key, fact.value, unit, fact.confidence));
        }
        for row in &extract.table_rows {
            block.push_str(&format!("  | {} |\n", row.join(" | ")));
        }
    }
    block
}

/// Copy a selected image into `{artifacts_dir}/{project_id}/{artifact_id}-{basename}`,
/// creating the project's artifacts directory if needed (§4.4 Vision). Returns
/// `None` rather than raising: a copy failure degrades to metadata-only, the
/// way a missing source image already does.
fn copy_to_artifacts_dir(artifacts_dir: &Path, project_id: &str, artifact_id: Uuid, source_path: &str) -> Option<std::path::PathBuf> {
    let project_dir = artifacts_dir.join(project_id);
    std::fs::create_dir_all(&project_dir).ok()?;
    let basename = Path::new(source_path).file_name()?.to_str()?;
    let dest = project_dir.join(format!("{artifact_id}-{basename}"));
    std::fs::copy(source_path, &dest).ok()?;
    Some(dest)
}

/// OCR up to `max_images` figures/tables and fold the results into `raw_text`.
/// No-op (returns an empty update) when `image_paths` is empty.
pub async fn run(ctx: &NodeContext, state: &WorkflowState) -> crate::error::Result<StateUpdate> {
    if state.image_paths.is_empty() {
        return Ok(StateUpdate::new());
    }

    let selected = select_images_for_vision(&state.image_paths, ctx.config.max_images);
    let route = RouteRequest::new(TaskType::Vision);

    let mut results = Vec::new();
    for path in &selected {
        let Ok(bytes) = std::fs::read(path) else { continue };
        let encoded = BASE64.encode(bytes);
        let request = CompletionRequest::new()
            .with_message(ChatMessage::system(
                "Extract figure/table contents as JSON: {figure_label, caption, facts: [{key, value, unit, confidence}], table_rows}.",
            ))
            .with_images(vec![encoded])
            .deterministic();

        let Ok(response) = ctx.gateway.complete(&route, request).await else { continue };
        let extract: VisionExtract = serde_json::from_str(&response.content).unwrap_or_default();

        let artifact_id = Uuid::new_v4();
        let artifact_path = copy_to_artifacts_dir(&ctx.config.artifacts_dir, &state.project_id, artifact_id, path);
        let _ = ctx
            .document_store
            .put(
                "artifact_manifests",
                &format!("vision-{artifact_id}"),
                serde_json::json!({
                    "source_path": path,
                    "artifact_id": artifact_id.to_string(),
                    "artifact_path": artifact_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
                }),
            )
            .await;

        results.push((path.clone(), extract));
    }

    if results.is_empty() {
        return Ok(StateUpdate::new());
    }

    let mut raw_text = state.raw_text.clone();
    raw_text.push_str(&build_vision_context(&results));

    Ok(StateUpdate { raw_text: Some(raw_text), ..StateUpdate::new() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_selects_nothing() {
        assert!(select_images_for_vision(&[], 5).is_empty());
    }

    #[test]
    fn prefers_basenames_with_figure_table_hints() {
        let paths = vec!["scan001.png".to_string(), "fig3.png".to_string(), "table2.png".to_string()];
        let selected = select_images_for_vision(&paths, 2);
        assert_eq!(selected, vec!["fig3.png".to_string(), "table2.png".to_string()]);
    }

    #[test]
    fn fills_remainder_with_non_preferred_when_under_cap() {
        let paths = vec!["fig1.png".to_string(), "scan002.png".to_string()];
        let selected = select_images_for_vision(&paths, 5);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn copies_selected_image_into_a_per_project_artifacts_dir() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("fig3.png");
        std::fs::write(&source, b"fake image bytes").unwrap();

        let artifacts_dir = dir.path().join("artifacts");
        let artifact_id = Uuid::new_v4();
        let dest = copy_to_artifacts_dir(&artifacts_dir, "proj-1", artifact_id, source.to_str().unwrap()).unwrap();

        assert!(dest.starts_with(artifacts_dir.join("proj-1")));
        assert_eq!(std::fs::read(&dest).unwrap(), b"fake image bytes");
    }

    #[test]
    fn vision_context_block_includes_facts_and_rows() {
        let extract = VisionExtract {
            figure_label: Some("Figure 3".into()),
            caption: Some("Latency by batch size".into()),
            facts: vec![VisionFact { key: "p99_latency".into(), value: "120".into(), unit: Some("ms".into()), confidence: 0.8 }],
            table_rows: vec![vec!["batch=1".into(), "120ms".into()]],
        };
        let block = build_vision_context(&[("fig3.png".to_string(), extract)]);
        assert!(block.contains("Figure 3"));
        assert!(block.contains("p99_latency 120 ms (confidence=0.80)"));
        assert!(block.contains("batch=1"));
    }
}
