//! Claim (extracted triple) and source-anchor types (§3.3).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Bounding box in the page's normalized [0, 1000] coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Bbox {
    /// Every coordinate MUST be in [0, 1000] (§3.3 invariant).
    pub fn in_range(&self) -> bool {
        [self.x, self.y, self.w, self.h].iter().all(|v| (0.0..=1000.0).contains(v))
    }
}

/// Character-offset span into `snippet`'s source page, when known.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

/// The minimal evidence binding that locates a claim in the source (§3.3, Glossary).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceAnchor {
    pub doc_id: Option<String>,
    pub page_number: Option<u32>,
    pub bbox: Option<Bbox>,
    pub span: Option<Span>,
    pub snippet: Option<String>,
}

impl SourceAnchor {
    pub fn new(doc_id: impl Into<String>, page_number: u32) -> Self {
        Self {
            doc_id: Some(doc_id.into()),
            page_number: Some(page_number),
            bbox: None,
            span: None,
            snippet: None,
        }
    }

    pub fn with_bbox(mut self, bbox: Bbox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// Hard structural requirements for any rigor level: doc id and a >=1 page number present.
    pub fn is_structurally_present(&self) -> bool {
        self.doc_id.is_some() && self.page_number.map(|p| p >= 1).unwrap_or(false)
    }
}

/// A subject-predicate-object assertion with an evidence anchor and confidence (Glossary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    pub claim_text: String,
    #[serde(default)]
    pub relevance_score: f64,
    #[serde(default)]
    pub rq_hits: Vec<String>,
    #[serde(default)]
    pub source_anchor: SourceAnchor,
    #[serde(default)]
    pub is_expert_verified: bool,
    #[serde(default)]
    pub expert_notes: Option<String>,
}

fn default_confidence() -> f64 {
    1.0
}

impl Claim {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: impl Into<String>) -> Self {
        let subject = subject.into();
        let predicate = predicate.into();
        let object = object.into();
        let id = Self::deterministic_id(&subject, &predicate, &object, None, None);
        let claim_text = format!("{subject} {predicate} {object}");
        Self {
            id,
            subject,
            predicate,
            object,
            confidence: 1.0,
            claim_text,
            relevance_score: 0.0,
            rq_hits: Vec::new(),
            source_anchor: SourceAnchor::default(),
            is_expert_verified: false,
            expert_notes: None,
        }
    }

    /// `SHA-256(subject|predicate|object|doc_hash|page)` (§3.3 "Identity").
    pub fn deterministic_id(subject: &str, predicate: &str, object: &str, doc_hash: Option<&str>, page: Option<u32>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(subject.as_bytes());
        hasher.update(b"|");
        hasher.update(predicate.as_bytes());
        hasher.update(b"|");
        hasher.update(object.as_bytes());
        hasher.update(b"|");
        hasher.update(doc_hash.unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(page.map(|p| p.to_string()).unwrap_or_default().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn with_rq_hits(mut self, rq_hits: Vec<String>) -> Self {
        self.rq_hits = rq_hits;
        self
    }

    pub fn with_source_anchor(mut self, anchor: SourceAnchor) -> Self {
        self.source_anchor = anchor;
        self
    }

    /// Normalized (lowercased, whitespace-collapsed) subject for contradiction indexing (§4.4 step 3).
    pub fn normalized_subject(&self) -> String {
        normalize(&self.subject)
    }

    pub fn normalized_predicate(&self) -> String {
        normalize(&self.predicate)
    }

    pub fn normalized_object(&self) -> String {
        normalize(&self.object)
    }

    /// Conservative-rigor evidence-binding gate: anchor doc_id/page present, bbox
    /// (when given) in range, and `rq_hits` non-empty (§3.3 invariants).
    pub fn satisfies_conservative_evidence_gate(&self) -> bool {
        if !self.source_anchor.is_structurally_present() {
            return false;
        }
        if let Some(bbox) = &self.source_anchor.bbox {
            if !bbox.in_range() {
                return false;
            }
        }
        !self.rq_hits.is_empty()
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}
