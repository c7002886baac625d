//! In-memory vector index keyed by durable document id.
//!
//! The index holds one entry per document: the chunk texts and their
//! embedding vectors as parallel sequences, plus a little metadata. Entries
//! are only ever replaced wholesale (`put`) or dropped (`remove`); there is
//! no partial update. Storage is scoped to the process lifetime, with no
//! persistence and no eviction.

mod similarity;

pub use similarity::{SimilarityError, cosine_similarity};

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use time::OffsetDateTime;

/// Errors raised by vector index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Chunk and vector sequences must be parallel.
    #[error("chunk/vector count mismatch: {chunks} chunks, {vectors} vectors")]
    LengthMismatch {
        /// Number of chunk texts supplied.
        chunks: usize,
        /// Number of embedding vectors supplied.
        vectors: usize,
    },
    /// Similarity computation failed, typically on a dimension mismatch.
    #[error(transparent)]
    Similarity(#[from] SimilarityError),
}

/// One retrieval hit: a chunk text with its similarity score and original position.
#[derive(Debug, Clone)]
pub struct SimilarityHit {
    /// Stored chunk text.
    pub text: String,
    /// Cosine similarity against the query vector.
    pub score: f32,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
}

struct IndexEntry {
    chunks: Vec<String>,
    vectors: Vec<Vec<f32>>,
    chunk_count: usize,
    processed_at: OffsetDateTime,
}

/// In-memory collection of per-document chunk/vector entries.
///
/// A single lock over the map serializes same-key mutation, so a `search`
/// never observes a half-replaced entry and concurrent overwrites resolve to
/// the last successful `put`. The lock is never held across an await point.
#[derive(Default)]
pub struct VectorIndex {
    entries: RwLock<HashMap<String, IndexEntry>>,
}

impl VectorIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `document_id` wholesale.
    ///
    /// A second call for the same id discards the prior chunk/vector set
    /// entirely; the whole set lands atomically or not at all.
    pub fn put(
        &self,
        document_id: &str,
        chunks: Vec<String>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }
        if let Some(first) = vectors.first() {
            for vector in &vectors[1..] {
                if vector.len() != first.len() {
                    return Err(IndexError::Similarity(SimilarityError::DimensionMismatch {
                        expected: first.len(),
                        actual: vector.len(),
                    }));
                }
            }
        }

        let entry = IndexEntry {
            chunk_count: chunks.len(),
            chunks,
            vectors,
            processed_at: OffsetDateTime::now_utc(),
        };

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let replaced = entries.insert(document_id.to_string(), entry).is_some();
        tracing::debug!(document_id, replaced, "Index entry stored");
        Ok(())
    }

    /// Rank the stored chunks of `document_id` against `query_vector`.
    ///
    /// Returns the `top_k` highest-scoring chunks in descending score order,
    /// breaking ties by original chunk order. An unknown document id yields an
    /// empty result rather than an error: "no evidence" is a valid terminal
    /// state for the caller.
    pub fn search(
        &self,
        document_id: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SimilarityHit>, IndexError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get(document_id) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::with_capacity(entry.chunk_count);
        for (chunk_index, (text, vector)) in entry.chunks.iter().zip(&entry.vectors).enumerate() {
            let score = cosine_similarity(query_vector, vector)?;
            hits.push(SimilarityHit {
                text: text.clone(),
                score,
                chunk_index,
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Drop the entry for `document_id`, if present. Idempotent.
    pub fn remove(&self, document_id: &str) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if entries.remove(document_id).is_some() {
            tracing::debug!(document_id, "Index entry removed");
        }
    }

    /// Whether an entry exists for `document_id`.
    pub fn contains(&self, document_id: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(document_id)
    }

    /// Timestamp of the most recent `put` for `document_id`, if indexed.
    pub fn processed_at(&self, document_id: &str) -> Option<OffsetDateTime> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(document_id)
            .map(|entry| entry.processed_at)
    }

    /// Drop every entry. Intended for tests and explicit resets.
    pub fn reset(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
