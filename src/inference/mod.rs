//! Embedding and completion gateway for the OpenAI-style inference service.
//!
//! The core never computes embeddings or completions itself; it owns only the
//! batching contract (one provider call per `embed` batch) and the
//! vector-length invariant imposed on downstream consumers. Credential and
//! transport failures all surface through [`InferenceError`] as a single
//! service-unavailable kind and are never retried here; retry policy, if any,
//! belongs to the caller.

mod client;
mod types;

pub use client::OpenAiClient;
pub use types::{ChatMessage, InferenceError};

use async_trait::async_trait;

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce one embedding vector per supplied text, in order, with a
    /// single provider invocation for the whole batch.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, InferenceError>;
}

/// Interface implemented by chat completion backends.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a completion for the supplied conversation. Output length
    /// ceiling and sampling temperature come from configuration.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, InferenceError>;
}
