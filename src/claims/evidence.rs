//! Evidence-binding gate: snippet fuzzy-matching and hard-field checks (§4.4 Critic step 2,
//! §4.5 "Evidence binding gate").

use similar::{Algorithm, TextDiff};

use super::types::Claim;

/// Ratcliff/Obershelp-style similarity ratio in [0.0, 1.0], computed via the
/// `similar` crate's diff-based ratio (the same notion as Python's
/// `difflib.SequenceMatcher.quick_ratio`).
pub fn quick_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(a, b)
        .ratio() as f64
}

/// Result of validating one claim's evidence fields, independent of rigor level.
#[derive(Debug, Clone, PartialEq)]
pub enum EvidenceViolation {
    MissingDocHash,
    MissingPage,
    BboxOutOfRange,
    SnippetMismatch { ratio: f64 },
    MissingRqHits,
}

impl EvidenceViolation {
    pub fn message(&self) -> String {
        match self {
            Self::MissingDocHash => "claim is missing a source document id".to_string(),
            Self::MissingPage => "claim is missing a page number".to_string(),
            Self::BboxOutOfRange => "claim bbox coordinates are out of the [0, 1000] range".to_string(),
            Self::SnippetMismatch { ratio } => {
                format!("claim snippet does not fuzzy-match the page text (ratio={ratio:.2})")
            }
            Self::MissingRqHits => "claim has no rq_hits".to_string(),
        }
    }
}

/// Validate one claim's evidence fields against the hard requirements in §3.3 /
/// §4.4 step 2. `page_text` is the cached page text, when available, used to
/// verify the snippet via fuzzy match.
pub fn validate_claim_evidence(claim: &Claim, page_text: Option<&str>) -> Vec<EvidenceViolation> {
    let mut violations = Vec::new();
    let anchor = &claim.source_anchor;

    if anchor.doc_id.is_none() {
        violations.push(EvidenceViolation::MissingDocHash);
    }
    if anchor.page_number.is_none() {
        violations.push(EvidenceViolation::MissingPage);
    }
    if let Some(bbox) = &anchor.bbox {
        if !bbox.in_range() {
            violations.push(EvidenceViolation::BboxOutOfRange);
        }
    }
    if claim.rq_hits.is_empty() {
        violations.push(EvidenceViolation::MissingRqHits);
    }
    if let (Some(snippet), Some(page_text)) = (&anchor.snippet, page_text) {
        let ratio = quick_ratio(snippet, page_text);
        if ratio <= 0.6 {
            violations.push(EvidenceViolation::SnippetMismatch { ratio });
        }
    }

    violations
}
