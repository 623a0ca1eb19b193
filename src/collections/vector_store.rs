//! `VectorStore`: the document-chunk similarity index (§6.3, §6.5).

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// The hard payload contract chunks carry in the vector store (§6.3).
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkAnchor {
    pub file_hash: String,
    pub ingestion_id: String,
    pub project_id: String,
    pub page_number: u32,
    pub chunk_index: u32,
    pub chunk_text_length: usize,
    pub bbox: Option<[f64; 4]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub chunk_id: String,
    pub text: String,
    pub anchor: ChunkAnchor,
}

impl DocumentChunk {
    /// `SHA-256(file_hash|page|chunk_index)` (§4.4 "Ingestion").
    pub fn deterministic_id(file_hash: &str, page: u32, chunk_index: u32) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(file_hash.as_bytes());
        hasher.update(b"|");
        hasher.update(page.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(chunk_index.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Cosine-similarity top-K retrieval, always scoped by `project_id` (§6.3:
/// "unscoped retrieval is refused").
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, collection: &str, chunk: DocumentChunk) -> Result<()>;

    /// Retrieve up to `limit` chunks for `project_id` (and, when given, `ingestion_id`)
    /// most relevant to `query_text`. Callers MUST pass a non-empty `project_id`.
    async fn top_k(
        &self,
        collection: &str,
        project_id: &str,
        ingestion_id: Option<&str>,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<DocumentChunk>>;
}

/// In-memory vector store; "similarity" is a crude lexical-overlap score since no
/// embedding model is wired in (sufficient for routing and test coverage).
#[derive(Default)]
pub struct InMemoryVectorStore {
    chunks: RwLock<Vec<(String, DocumentChunk)>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn overlap_score(query: &str, text: &str) -> usize {
        let query_words: std::collections::HashSet<&str> = query.split_whitespace().collect();
        text.split_whitespace().filter(|w| query_words.contains(w)).count()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, collection: &str, chunk: DocumentChunk) -> Result<()> {
        let mut chunks = self.chunks.write().await;
        chunks.retain(|(c, existing)| !(c == collection && existing.chunk_id == chunk.chunk_id));
        chunks.push((collection.to_string(), chunk));
        Ok(())
    }

    async fn top_k(
        &self,
        collection: &str,
        project_id: &str,
        ingestion_id: Option<&str>,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<DocumentChunk>> {
        if project_id.is_empty() {
            return Err(Error::invalid_input("vector store retrieval requires a non-empty project_id"));
        }

        let chunks = self.chunks.read().await;
        let mut scored: Vec<(usize, &DocumentChunk)> = chunks
            .iter()
            .filter(|(c, chunk)| {
                c == collection
                    && chunk.anchor.project_id == project_id
                    && ingestion_id.map(|id| chunk.anchor.ingestion_id == id).unwrap_or(true)
            })
            .map(|(_, chunk)| (Self::overlap_score(query_text, &chunk.text), chunk))
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().take(limit).map(|(_, chunk)| chunk.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, project_id: &str, ingestion_id: &str, text: &str) -> DocumentChunk {
        DocumentChunk {
            chunk_id: id.to_string(),
            text: text.to_string(),
            anchor: ChunkAnchor {
                file_hash: "hash1".into(),
                ingestion_id: ingestion_id.into(),
                project_id: project_id.into(),
                page_number: 1,
                chunk_index: 0,
                chunk_text_length: text.len(),
                bbox: None,
            },
        }
    }

    #[tokio::test]
    async fn unscoped_query_is_refused() {
        let store = InMemoryVectorStore::new();
        let result = store.top_k("document_chunks", "", None, "query", 5).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn retrieval_is_scoped_by_project_and_ingestion() {
        let store = InMemoryVectorStore::new();
        store.upsert("document_chunks", chunk("c1", "p1", "i1", "input validation mitigates injection")).await.unwrap();
        store.upsert("document_chunks", chunk("c2", "p2", "i1", "input validation mitigates injection")).await.unwrap();

        let results = store.top_k("document_chunks", "p1", Some("i1"), "input validation", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, "c1");
    }

    #[tokio::test]
    async fn results_are_ranked_by_lexical_overlap() {
        let store = InMemoryVectorStore::new();
        store.upsert("document_chunks", chunk("low", "p1", "i1", "irrelevant text about cooking")).await.unwrap();
        store.upsert("document_chunks", chunk("high", "p1", "i1", "input validation mitigates SQL injection")).await.unwrap();

        let results = store.top_k("document_chunks", "p1", None, "input validation injection", 2).await.unwrap();
        assert_eq!(results[0].chunk_id, "high");
    }

    #[test]
    fn deterministic_chunk_id_is_stable() {
        let a = DocumentChunk::deterministic_id("hash1", 3, 0);
        let b = DocumentChunk::deterministic_id("hash1", 3, 0);
        assert_eq!(a, b);
    }
}
