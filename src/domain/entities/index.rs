use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{Document, DocumentChunk, Embedding};

pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub embedding_model: String,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
    pub document_count: usize,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub chunk: DocumentChunk,
    pub embedding: Embedding,
}

/// Everything needed to restore the vector store without touching the corpus
/// or the embedding service.
#[derive(Debug, Clone)]
pub struct PersistedIndex {
    pub manifest: IndexManifest,
    pub documents: Vec<Document>,
    pub entries: Vec<IndexedChunk>,
}

impl PersistedIndex {
    pub fn new(
        embedding_model: impl Into<String>,
        documents: Vec<Document>,
        entries: Vec<IndexedChunk>,
    ) -> Self {
        let dimension = entries
            .first()
            .map(|e| e.embedding.dimension())
            .unwrap_or_default();

        Self {
            manifest: IndexManifest {
                format_version: INDEX_FORMAT_VERSION,
                embedding_model: embedding_model.into(),
                dimension,
                created_at: Utc::now(),
                document_count: documents.len(),
                chunk_count: entries.len(),
            },
            documents,
            entries,
        }
    }

    /// Checks that the index was produced by `embedding_model` with vectors of
    /// `dimension` in the current format, and that its parts agree.
    pub fn validate(&self, embedding_model: &str, dimension: usize) -> Result<(), String> {
        let manifest = &self.manifest;

        if manifest.format_version != INDEX_FORMAT_VERSION {
            return Err(format!(
                "format version {} is not supported (expected {})",
                manifest.format_version, INDEX_FORMAT_VERSION
            ));
        }
        if manifest.embedding_model != embedding_model {
            return Err(format!(
                "index was built with embedding model '{}' but '{}' is configured",
                manifest.embedding_model, embedding_model
            ));
        }
        if manifest.dimension != dimension {
            return Err(format!(
                "index holds {}-dimensional vectors but the embedding model yields {}",
                manifest.dimension, dimension
            ));
        }
        if manifest.chunk_count != self.entries.len() {
            return Err(format!(
                "manifest lists {} chunks but {} were stored",
                manifest.chunk_count,
                self.entries.len()
            ));
        }
        if self.entries.is_empty() {
            return Err("index holds no chunks".to_string());
        }

        let document_ids: HashSet<_> = self.documents.iter().map(|d| d.id).collect();
        for entry in &self.entries {
            if entry.embedding.dimension() != manifest.dimension || !entry.embedding.is_finite() {
                return Err(format!("chunk {} has a malformed vector", entry.chunk.id));
            }
            if !document_ids.contains(&entry.chunk.document_id) {
                return Err(format!(
                    "chunk {} refers to an unknown document",
                    entry.chunk.id
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOrigin {
    Loaded,
    Built,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSummary {
    pub origin: IndexOrigin,
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub embedding_model: String,
    pub storage: String,
    pub created_at: DateTime<Utc>,
}

impl IndexSummary {
    pub fn from_manifest(origin: IndexOrigin, manifest: &IndexManifest, storage: String) -> Self {
        Self {
            origin,
            documents: manifest.document_count,
            chunks: manifest.chunk_count,
            dimension: manifest.dimension,
            embedding_model: manifest.embedding_model.clone(),
            storage,
            created_at: manifest.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(model: &str) -> PersistedIndex {
        let doc = Document::new("lisbon.md");
        let chunk = DocumentChunk::new(doc.id, "Tram 28 climbs through Alfama.", 0);
        PersistedIndex::new(
            model,
            vec![doc],
            vec![IndexedChunk {
                chunk,
                embedding: Embedding::new(vec![0.1, 0.2, 0.3]),
            }],
        )
    }

    #[test]
    fn test_valid_index() {
        let index = sample("embedding-001");
        assert_eq!(index.manifest.dimension, 3);
        assert!(index.validate("embedding-001", 3).is_ok());
    }

    #[test]
    fn test_model_change_invalidates() {
        let index = sample("embedding-001");
        let err = index.validate("text-embedding-004", 3).unwrap_err();
        assert!(err.contains("embedding-001"));
    }

    #[test]
    fn test_dimension_mismatch_invalidates() {
        let mut index = sample("embedding-001");
        index.entries[0].embedding = Embedding::new(vec![0.1, 0.2]);
        assert!(index.validate("embedding-001", 3).is_err());
    }

    #[test]
    fn test_configured_dimension_change_invalidates() {
        let index = sample("embedding-001");
        let err = index.validate("embedding-001", 768).unwrap_err();
        assert!(err.contains("768"));
    }

    #[test]
    fn test_orphan_chunk_invalidates() {
        let mut index = sample("embedding-001");
        index.documents.clear();
        assert!(index.validate("embedding-001", 3).is_err());
    }
}
