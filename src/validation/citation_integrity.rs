//! Citation integrity gate for manuscript blocks: every block must be bound to
//! claim ids, and every referenced id must exist (§4.5 "Citation integrity gate").

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{Error, Result};
use crate::workflow::RigorLevel;

fn claim_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[\[([^\]]+)\]\]").unwrap())
}

/// Extract `[[claim_id]]`-style inline references from manuscript text.
pub fn extract_claim_ids_from_text(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    claim_id_pattern()
        .captures_iter(text)
        .filter_map(|caps| {
            let id = caps.get(1)?.as_str().trim();
            (!id.is_empty()).then(|| id.to_string())
        })
        .collect()
}

/// A single synthesized manuscript block, pending citation validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManuscriptBlock {
    pub block_id: String,
    pub text: String,
    #[serde(default)]
    pub claim_ids: Vec<String>,
    /// Bibliography citation keys (distinct from claim ids), checked against the
    /// project's bibliography by the Saver's Librarian Key-Guard (§4.4 Saver).
    #[serde(default)]
    pub citation_keys: Vec<String>,
}

/// Check one block's citation bindings against the set of known claim ids.
/// Conservative mode hard-fails on missing/unknown bindings; exploratory mode
/// warns and allows (§4.5).
pub fn validate_citation_integrity(
    block: &ManuscriptBlock,
    available_claim_ids: Option<&HashSet<String>>,
    rigor_level: RigorLevel,
) -> Result<()> {
    let mut all_ids: HashSet<String> = block.claim_ids.iter().cloned().collect();
    all_ids.extend(extract_claim_ids_from_text(&block.text));

    let invalid_ids: Vec<&String> = match available_claim_ids {
        Some(available) => all_ids.iter().filter(|id| !available.contains(*id)).collect(),
        None => Vec::new(),
    };

    match rigor_level {
        RigorLevel::Conservative => {
            if all_ids.is_empty() {
                return Err(Error::validation(format!(
                    "block {} has no claim bindings; conservative mode requires at least one [[claim_id]]",
                    block.block_id
                )));
            }
            if !invalid_ids.is_empty() {
                return Err(Error::validation(format!(
                    "block {} references unknown claim ids: {invalid_ids:?}",
                    block.block_id
                )));
            }
            Ok(())
        }
        RigorLevel::Exploratory => {
            if all_ids.is_empty() {
                warn!(block_id = %block.block_id, "block has no claim bindings (exploratory mode allows)");
            } else if !invalid_ids.is_empty() {
                warn!(block_id = %block.block_id, ?invalid_ids, "block references unknown claim ids (exploratory mode allows)");
            }
            Ok(())
        }
    }
}

/// Validate every block, partitioning into those that pass and the error
/// messages for those that don't (§4.5).
pub fn validate_manuscript_blocks(
    blocks: &[ManuscriptBlock],
    available_claim_ids: Option<&HashSet<String>>,
    rigor_level: RigorLevel,
) -> (Vec<ManuscriptBlock>, Vec<String>) {
    let mut valid = Vec::new();
    let mut errors = Vec::new();

    for block in blocks {
        match validate_citation_integrity(block, available_claim_ids, rigor_level) {
            Ok(()) => valid.push(block.clone()),
            Err(e) => {
                error!(block_id = %block.block_id, error = %e, "citation integrity validation failed");
                errors.push(format!("block {}: {e}", block.block_id));
            }
        }
    }

    (valid, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str, claim_ids: Vec<&str>) -> ManuscriptBlock {
        ManuscriptBlock {
            block_id: "b1".into(),
            text: text.into(),
            claim_ids: claim_ids.into_iter().map(String::from).collect(),
            citation_keys: Vec::new(),
        }
    }

    #[test]
    fn extracts_inline_claim_ids() {
        let text = "Input validation mitigates injection [[claim_abc]] and [[claim_def]].";
        let ids = extract_claim_ids_from_text(text);
        assert_eq!(ids, vec!["claim_abc", "claim_def"]);
    }

    #[test]
    fn conservative_mode_rejects_unbound_block() {
        let b = block("free prose with no citations", vec![]);
        let result = validate_citation_integrity(&b, None, RigorLevel::Conservative);
        assert!(result.is_err());
    }

    #[test]
    fn conservative_mode_rejects_unknown_claim_id() {
        let b = block("see [[claim_unknown]]", vec![]);
        let available: HashSet<String> = ["claim_known".to_string()].into_iter().collect();
        let result = validate_citation_integrity(&b, Some(&available), RigorLevel::Conservative);
        assert!(result.is_err());
    }

    #[test]
    fn exploratory_mode_allows_unbound_block() {
        let b = block("free prose", vec![]);
        assert!(validate_citation_integrity(&b, None, RigorLevel::Exploratory).is_ok());
    }

    #[test]
    fn bound_block_with_known_ids_passes_conservative() {
        let b = block("see [[claim_known]]", vec![]);
        let available: HashSet<String> = ["claim_known".to_string()].into_iter().collect();
        assert!(validate_citation_integrity(&b, Some(&available), RigorLevel::Conservative).is_ok());
    }

    #[test]
    fn validate_manuscript_blocks_partitions_results() {
        let blocks = vec![block("see [[claim_known]]", vec![]), block("no citation here", vec![])];
        let available: HashSet<String> = ["claim_known".to_string()].into_iter().collect();
        let (valid, errors) = validate_manuscript_blocks(&blocks, Some(&available), RigorLevel::Conservative);
        assert_eq!(valid.len(), 1);
        assert_eq!(errors.len(), 1);
    }
}
