//! Core data types and error definitions for the retrieval pipeline.

use crate::index::IndexError;
use crate::inference::InferenceError;
use crate::storage::Role;
use serde::Serialize;
use thiserror::Error;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Chunking was configured with an impossible window size.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for new content in every window.
    #[error("chunk overlap {overlap} must be smaller than chunk size {size}")]
    InvalidOverlap {
        /// Configured overlap in characters.
        overlap: usize,
        /// Configured chunk size in characters.
        size: usize,
    },
}

/// Errors emitted by the document indexing and retrieval pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Chunking step failed to segment the document.
    #[error("failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// The document yielded no indexable text.
    #[error("document contains no indexable text")]
    EmptyDocument,
    /// Embedding provider returned no vector for the query.
    #[error("embedding provider returned no vectors for the query")]
    EmptyEmbedding,
    /// Inference service failed to produce embeddings.
    #[error("failed to generate embeddings: {0}")]
    Embedding(#[from] InferenceError),
    /// Vector index rejected the chunk/vector set.
    #[error("vector index rejected the document: {0}")]
    Index(#[from] IndexError),
}

/// Errors emitted while answering a question against a document.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// Retrieving evidence for the question failed.
    #[error(transparent)]
    Retrieval(#[from] ProcessingError),
    /// The completion capability failed; the caller is responsible for the
    /// user-visible fallback and must not crash the enclosing session flow.
    #[error("failed to synthesize an answer: {0}")]
    SynthesisFailed(#[source] InferenceError),
}

/// Summary of a completed document indexing run.
#[derive(Debug, Clone)]
pub struct IndexOutcome {
    /// Number of chunks produced and indexed for the document.
    pub chunk_count: usize,
    /// Chunk size used during processing.
    pub chunk_size: usize,
    /// Flattened concatenation of all chunk vectors, kept on the document
    /// record for audit and rehydration.
    pub flat_embedding: Vec<f32>,
}

/// One prior turn of the conversation supplied as answering context.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    /// Author of the turn.
    pub role: Role,
    /// Turn content.
    pub content: String,
}

/// A synthesized answer with provenance.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Model-generated response text, or a fixed fallback.
    pub response: String,
    /// Retrieved evidence excerpts in rank order; empty when no evidence
    /// was found.
    pub sources: Vec<SourceAttribution>,
}

/// Provenance entry pointing back at a retrieved chunk.
#[derive(Debug, Clone, Serialize)]
pub struct SourceAttribution {
    /// Leading excerpt of the chunk text.
    pub excerpt: String,
    /// Cosine similarity between the chunk and the question.
    pub similarity: f32,
}
