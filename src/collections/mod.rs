//! Collaborator traits for the document store, vector store, and graph store,
//! plus in-memory implementations used for tests and as the degrade-to-memory
//! fallback path (§4.1, §6.2-6.5).

mod document_store;
mod graph_store;
mod vector_store;

pub use document_store::{DocumentStore, InMemoryDocumentStore};
pub use graph_store::{GraphStore, InMemoryGraphStore};
pub use vector_store::{ChunkAnchor, DocumentChunk, InMemoryVectorStore, VectorStore};
