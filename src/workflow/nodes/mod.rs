//! Node implementations for the Cartographer → Vision → Critic → Synthesizer →
//! Saver workflow graph (§4.4).

mod cartographer;
mod critic;
mod failure;
mod reframing;
mod saver;
mod synthesizer;
mod vision;

pub use cartographer::run as run_cartographer;
pub use critic::run as run_critic;
pub use failure::run as run_failure_cleanup;
pub use reframing::run as run_reframing;
pub use saver::{run as run_saver, SavedArtifacts};
pub use synthesizer::run as run_synthesizer;
pub use vision::run as run_vision;

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use std::sync::OnceLock;

use crate::collections::{DocumentStore, GraphStore, VectorStore};
use crate::config::OrchestratorConfig;
use crate::llm::Gateway;
use crate::prompts::PromptRegistry;
use crate::telemetry::TelemetryEmitter;
use crate::validation::VocabGuard;

/// Everything a node needs beyond the state record itself: its collaborators.
/// Cloning is cheap (every field is an `Arc`), so a context can be shared
/// across concurrently-running jobs.
#[derive(Clone)]
pub struct NodeContext {
    pub gateway: Arc<Gateway>,
    pub prompts: Arc<PromptRegistry>,
    pub vocab_guard: Arc<VocabGuard>,
    pub document_store: Arc<dyn DocumentStore>,
    pub vector_store: Arc<dyn VectorStore>,
    pub graph_store: Arc<dyn GraphStore>,
    pub config: Arc<OrchestratorConfig>,
    pub telemetry: Arc<TelemetryEmitter>,
}

fn entity_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b([A-Z][a-zA-Z0-9]*(?:\s+[A-Z][a-zA-Z0-9]*)+)\b").unwrap())
}

/// Candidate entity names: capitalized multi-word spans in `text`, capped at
/// `limit` and de-duplicated in first-seen order (§4.4 Cartographer step 2).
pub fn candidate_entity_names(text: &str, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for capture in entity_name_pattern().captures_iter(text) {
        let Some(m) = capture.get(1) else { continue };
        let name = m.as_str().to_string();
        if seen.insert(name.clone()) {
            names.push(name);
            if names.len() >= limit {
                break;
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_capitalized_multiword_spans() {
        let text = "Input Validation mitigates SQL Injection in Web Applications.";
        let names = candidate_entity_names(text, 20);
        assert!(names.contains(&"Input Validation".to_string()));
        assert!(names.contains(&"SQL Injection".to_string()));
    }

    #[test]
    fn respects_the_cap() {
        let text = "Alpha Beta. Gamma Delta. Epsilon Zeta. Eta Theta.";
        let names = candidate_entity_names(text, 2);
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn deduplicates_repeated_spans() {
        let text = "Input Validation helps. Input Validation again.";
        let names = candidate_entity_names(text, 20);
        assert_eq!(names, vec!["Input Validation".to_string()]);
    }
}
