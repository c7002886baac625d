//! Cosine similarity over embedding vectors.

use thiserror::Error;

/// Errors raised while comparing embedding vectors.
#[derive(Debug, Error)]
pub enum SimilarityError {
    /// Vectors of differing length were compared. Mixing embeddings from
    /// different models is a contract violation, not a user-facing error.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Length of the left-hand vector.
        expected: usize,
        /// Length of the right-hand vector.
        actual: usize,
    },
}

/// Compute the cosine similarity `dot(a,b) / (||a|| * ||b||)` of two vectors.
///
/// A zero vector carries no directional information, so when either norm is
/// zero the similarity is defined as `0.0` rather than propagating NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;

    for (lhs, rhs) in a.iter().zip(b.iter()) {
        dot += lhs * rhs;
        norm_a += lhs * lhs;
        norm_b += rhs * rhs;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
