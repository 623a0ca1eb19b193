//! Conflict detection, reporting, and deterministic reframing proposals (§3.5, §3.6, §4.4).

mod detector;
mod types;

pub use detector::detect_contradictions;
pub use types::{
    conflict_hash, ConflictItem, ConflictReport, ConflictType, PivotType, Producer,
    RecommendedNextStep, ReframingProposal, Severity,
};
