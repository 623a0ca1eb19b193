//! The Validation & Conflict Layer's gates: evidence binding (see [`crate::claims`]),
//! citation integrity, vocabulary guard, and tone guard (§4.5, §4.6).

mod citation_integrity;
mod tone_guard;
mod vocab_guard;

pub use citation_integrity::{
    extract_claim_ids_from_text, validate_citation_integrity, validate_manuscript_blocks,
    ManuscriptBlock,
};
pub use tone_guard::{apply_tone_guard, ToneRewrite};
pub use vocab_guard::VocabGuard;
