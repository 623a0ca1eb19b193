//! `GraphStore`: canonical/candidate knowledge and existing-claim lookups (§4.4, §6.5).

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::claims::Claim;
use crate::error::Result;

/// Canonical-knowledge and candidate-knowledge reads used by the Cartographer's
/// layered-context assembly, plus the existing-claims read the Critic's
/// contradiction detector indexes against (§4.4 steps 2 and 3).
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Canonical (already-vetted) claims touching any of `entity_names`, scoped to `project_id`.
    async fn canonical_knowledge(&self, project_id: &str, entity_names: &[String]) -> Result<Vec<Claim>>;

    /// Candidate (not-yet-vetted) claims pulled in from `reference_ids` (§4.4 step 2).
    async fn candidate_knowledge(&self, project_id: &str, reference_ids: &[String]) -> Result<Vec<Claim>>;

    /// All claims already on file for this project+ingestion, used as the "existing"
    /// side of contradiction detection (§4.4 Critic step 3).
    async fn existing_claims(&self, project_id: &str, ingestion_id: &str) -> Result<Vec<Claim>>;

    /// Persist newly-vetted claims against the project+ingestion (called by Saver).
    async fn store_claims(&self, project_id: &str, ingestion_id: &str, claims: &[Claim]) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryGraphStore {
    canonical: RwLock<Vec<(String, Claim)>>,
    candidate: RwLock<Vec<(String, String, Claim)>>,
    existing: RwLock<Vec<(String, String, Claim)>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_canonical(&self, project_id: &str, claim: Claim) {
        self.canonical.write().await.push((project_id.to_string(), claim));
    }

    pub async fn seed_candidate(&self, project_id: &str, reference_id: &str, claim: Claim) {
        self.candidate.write().await.push((project_id.to_string(), reference_id.to_string(), claim));
    }

    pub async fn seed_existing(&self, project_id: &str, ingestion_id: &str, claim: Claim) {
        self.existing.write().await.push((project_id.to_string(), ingestion_id.to_string(), claim));
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn canonical_knowledge(&self, project_id: &str, entity_names: &[String]) -> Result<Vec<Claim>> {
        let canonical = self.canonical.read().await;
        let lowered: Vec<String> = entity_names.iter().map(|e| e.to_lowercase()).collect();
        Ok(canonical
            .iter()
            .filter(|(p, claim)| {
                p == project_id
                    && (lowered.is_empty()
                        || lowered.iter().any(|e| {
                            claim.subject.to_lowercase().contains(e.as_str()) || claim.object.to_lowercase().contains(e.as_str())
                        }))
            })
            .map(|(_, claim)| claim.clone())
            .collect())
    }

    async fn candidate_knowledge(&self, project_id: &str, reference_ids: &[String]) -> Result<Vec<Claim>> {
        let candidate = self.candidate.read().await;
        Ok(candidate
            .iter()
            .filter(|(p, r, _)| p == project_id && reference_ids.iter().any(|id| id == r))
            .map(|(_, _, claim)| claim.clone())
            .collect())
    }

    async fn existing_claims(&self, project_id: &str, ingestion_id: &str) -> Result<Vec<Claim>> {
        let existing = self.existing.read().await;
        Ok(existing
            .iter()
            .filter(|(p, i, _)| p == project_id && i == ingestion_id)
            .map(|(_, _, claim)| claim.clone())
            .collect())
    }

    async fn store_claims(&self, project_id: &str, ingestion_id: &str, claims: &[Claim]) -> Result<()> {
        let mut existing = self.existing.write().await;
        for claim in claims {
            existing.push((project_id.to_string(), ingestion_id.to_string(), claim.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn canonical_knowledge_is_scoped_by_project() {
        let store = InMemoryGraphStore::new();
        store.seed_canonical("p1", Claim::new("Input validation", "MITIGATES", "SQL injection")).await;
        store.seed_canonical("p2", Claim::new("Firewalls", "MITIGATES", "DDoS")).await;

        let result = store.canonical_knowledge("p1", &["Input validation".to_string()]).await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn existing_claims_require_both_project_and_ingestion_match() {
        let store = InMemoryGraphStore::new();
        store.seed_existing("p1", "ing1", Claim::new("X", "relates_to", "Y")).await;
        store.seed_existing("p1", "ing2", Claim::new("X", "relates_to", "Z")).await;

        let result = store.existing_claims("p1", "ing1").await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].object, "Y");
    }

    #[tokio::test]
    async fn store_claims_appends_to_existing() {
        let store = InMemoryGraphStore::new();
        store.store_claims("p1", "ing1", &[Claim::new("A", "B", "C")]).await.unwrap();
        let result = store.existing_claims("p1", "ing1").await.unwrap();
        assert_eq!(result.len(), 1);
    }
}
