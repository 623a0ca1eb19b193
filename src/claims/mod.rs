//! Claim (extracted triple) types and the evidence-binding gate (§3.3, §4.5).

mod evidence;
mod types;

pub use evidence::{quick_ratio, validate_claim_evidence, EvidenceViolation};
pub use types::{Bbox, Claim, SourceAnchor, Span};
