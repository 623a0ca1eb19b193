//! Deterministic contradiction detection (§4.4 Critic step 3).
//!
//! No LLM narration: the explanation is built entirely from page numbers and
//! claim text already on hand.

use std::collections::HashMap;

use crate::claims::Claim;

use super::types::{ConflictItem, ConflictType, Producer, Severity};

const CONTRADICTION_CONFIDENCE: f64 = 0.9;

/// Index claims (existing + current) by normalized `(subject, predicate)`. For
/// any key with >= 2 distinct normalized objects, emit a CONTRADICTION item
/// with severity HIGH and confidence 0.9.
pub fn detect_contradictions(existing: &[Claim], current: &[Claim]) -> Vec<ConflictItem> {
    let mut by_key: HashMap<(String, String), Vec<&Claim>> = HashMap::new();

    for claim in existing.iter().chain(current.iter()) {
        let key = (claim.normalized_subject(), claim.normalized_predicate());
        by_key.entry(key).or_default().push(claim);
    }

    let mut items = Vec::new();
    for ((subject, predicate), claims) in by_key {
        let mut distinct_objects: Vec<String> = claims.iter().map(|c| c.normalized_object()).collect();
        distinct_objects.sort();
        distinct_objects.dedup();

        if distinct_objects.len() < 2 {
            continue;
        }

        let details = claims
            .iter()
            .map(|c| {
                let page = c
                    .source_anchor
                    .page_number
                    .map(|p| format!("page {p}"))
                    .unwrap_or_else(|| "unknown page".to_string());
                format!("[{page}] \"{}\"", c.claim_text)
            })
            .collect::<Vec<_>>()
            .join(" vs. ");

        let mut item = ConflictItem::new(
            ConflictType::Contradiction,
            Severity::High,
            format!("Conflicting objects for ({subject}, {predicate}): {distinct_objects:?}"),
            details,
            Producer::Critic,
        )
        .with_confidence(CONTRADICTION_CONFIDENCE);
        item.contradicting_claim_ids = claims.iter().map(|c| c.id.clone()).collect();
        items.push(item);
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::SourceAnchor;

    fn claim_at(subject: &str, predicate: &str, object: &str, page: u32) -> Claim {
        Claim::new(subject, predicate, object).with_source_anchor(SourceAnchor::new("doc1", page))
    }

    #[test]
    fn no_contradiction_when_objects_agree() {
        let existing = vec![claim_at("X", "relates_to", "Y", 1)];
        let current = vec![claim_at("x", "RELATES_TO", "y", 2)];
        assert!(detect_contradictions(&existing, &current).is_empty());
    }

    #[test]
    fn contradiction_detected_across_existing_and_current() {
        let existing = vec![claim_at("X", "relates_to", "Y", 1)];
        let current = vec![claim_at("X", "relates_to", "Z", 7)];
        let items = detect_contradictions(&existing, &current);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].severity, Severity::High);
        assert_eq!(items[0].kind, ConflictType::Contradiction);
        assert_eq!(items[0].contradicting_claim_ids.len(), 2);
        assert_eq!(items[0].confidence, 0.9);
    }

    #[test]
    fn three_distinct_objects_still_one_item() {
        let existing = vec![claim_at("X", "is_a", "Y", 1), claim_at("X", "is_a", "W", 2)];
        let current = vec![claim_at("X", "is_a", "Z", 3)];
        let items = detect_contradictions(&existing, &current);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].contradicting_claim_ids.len(), 3);
    }
}
