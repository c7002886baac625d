//! Document processing pipeline: chunking, retrieval, and answer synthesis.

pub(crate) mod chunking;
mod service;
mod types;

pub use service::{NO_EVIDENCE_RESPONSE, RagService};
pub use types::{
    Answer, AnswerError, ChunkingError, ConversationTurn, IndexOutcome, ProcessingError,
    SourceAttribution,
};
