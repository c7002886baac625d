//! Pipeline service coordinating chunking, embedding, indexing, and answering.

use crate::{
    config::get_config,
    index::{SimilarityHit, VectorIndex},
    inference::{ChatMessage, CompletionClient, EmbeddingClient},
    metrics::{ChatMetrics, MetricsSnapshot},
    processing::{
        chunking::chunk_text,
        types::{Answer, AnswerError, ConversationTurn, IndexOutcome, ProcessingError,
            SourceAttribution},
    },
};
use std::sync::Arc;

/// Fixed response returned when retrieval yields no evidence for a question.
pub const NO_EVIDENCE_RESPONSE: &str = "I couldn't find relevant information in the document to \
    answer your question. Please make sure you've uploaded a document and try rephrasing your \
    question.";

const SYSTEM_PROMPT_PREAMBLE: &str = "You are a helpful assistant that answers questions about \
legal documents related to real estate and renting.

Use the provided document context to answer questions accurately. If the information isn't in \
the document, say so clearly.

Guidelines:
- Be precise and cite specific sections when possible
- Explain legal terms in simple language
- If something is unclear, suggest consulting a legal professional
- Focus on practical implications for renters/tenants
- Be helpful but not provide legal advice";

const EXCERPT_LENGTH: usize = 200;

/// Coordinates the retrieval pipeline: chunking, embedding, index writes,
/// similarity search, and answer synthesis.
///
/// The service owns long-lived handles to the inference clients, the vector
/// index, and the metrics registry so every surface shares the same
/// components. Construct it once near process start and share it through an
/// `Arc`.
pub struct RagService {
    embedding_client: Arc<dyn EmbeddingClient>,
    completion_client: Arc<dyn CompletionClient>,
    index: Arc<VectorIndex>,
    metrics: Arc<ChatMetrics>,
}

impl RagService {
    /// Build a new pipeline service around the supplied collaborators.
    pub fn new(
        embedding_client: Arc<dyn EmbeddingClient>,
        completion_client: Arc<dyn CompletionClient>,
        index: Arc<VectorIndex>,
        metrics: Arc<ChatMetrics>,
    ) -> Self {
        Self {
            embedding_client,
            completion_client,
            index,
            metrics,
        }
    }

    /// Chunk, embed, and index a document's extracted text under its id.
    ///
    /// The index entry lands atomically after embedding succeeds; an
    /// abandoned or failed call commits nothing.
    pub async fn index_document(
        &self,
        document_id: &str,
        text: &str,
    ) -> Result<IndexOutcome, ProcessingError> {
        let config = get_config();
        let chunks = chunk_text(text, config.chunk_size, config.chunk_overlap)?;
        if chunks.is_empty() {
            return Err(ProcessingError::EmptyDocument);
        }

        let vectors = self.embedding_client.embed(chunks.clone()).await?;
        debug_assert_eq!(chunks.len(), vectors.len());

        let flat_embedding: Vec<f32> = vectors.iter().flatten().copied().collect();
        let chunk_count = chunks.len();
        self.index.put(document_id, chunks, vectors)?;

        self.metrics.record_document(chunk_count as u64);
        tracing::info!(
            document_id,
            chunks = chunk_count,
            chunk_size = config.chunk_size,
            "Document indexed"
        );

        Ok(IndexOutcome {
            chunk_count,
            chunk_size: config.chunk_size,
            flat_embedding,
        })
    }

    /// Embed `query_text` and rank the document's chunks against it.
    ///
    /// An unindexed document yields an empty result, not an error.
    pub async fn retrieve(
        &self,
        document_id: &str,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<SimilarityHit>, ProcessingError> {
        let mut vectors = self
            .embedding_client
            .embed(vec![query_text.to_string()])
            .await?;
        let query_vector = vectors.pop().ok_or(ProcessingError::EmptyEmbedding)?;
        Ok(self.index.search(document_id, &query_vector, top_k)?)
    }

    /// Answer a question against a document, grounding the response in
    /// retrieved evidence and the trailing conversation history.
    ///
    /// Empty retrieval is a terminal, non-error outcome carrying the fixed
    /// [`NO_EVIDENCE_RESPONSE`]. A completion failure surfaces as
    /// [`AnswerError::SynthesisFailed`].
    pub async fn answer(
        &self,
        document_id: &str,
        query_text: &str,
        history: &[ConversationTurn],
    ) -> Result<Answer, AnswerError> {
        let config = get_config();
        let hits = self
            .retrieve(document_id, query_text, config.retrieval_top_k)
            .await?;

        if hits.is_empty() {
            tracing::debug!(document_id, "No evidence retrieved for question");
            return Ok(Answer {
                response: NO_EVIDENCE_RESPONSE.to_string(),
                sources: Vec::new(),
            });
        }

        let evidence = hits
            .iter()
            .map(|hit| hit.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let system_prompt = build_system_prompt(&evidence, history, config.history_window);
        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(query_text),
        ];

        let response = self
            .completion_client
            .complete(messages)
            .await
            .map_err(AnswerError::SynthesisFailed)?;
        self.metrics.record_question();

        let sources = hits
            .iter()
            .map(|hit| SourceAttribution {
                excerpt: excerpt(&hit.text),
                similarity: hit.score,
            })
            .collect();

        tracing::info!(document_id, sources = hits.len(), "Question answered");
        Ok(Answer { response, sources })
    }

    /// Drop the document's entry from the vector index, if present.
    pub fn discard_document(&self, document_id: &str) {
        self.index.remove(document_id);
    }

    /// Whether the document currently has an index entry.
    pub fn is_indexed(&self, document_id: &str) -> bool {
        self.index.contains(document_id)
    }

    /// Return the current activity metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Render the system instruction: task framing, evidence context, and the
/// trailing window of conversation history as `role: content` lines.
fn build_system_prompt(evidence: &str, history: &[ConversationTurn], window: usize) -> String {
    let mut prompt = format!("{SYSTEM_PROMPT_PREAMBLE}\n\nDocument Context:\n{evidence}\n");

    let skip = history.len().saturating_sub(window);
    let recent = &history[skip..];
    if !recent.is_empty() {
        prompt.push_str("\nPrevious conversation:\n");
        for turn in recent {
            prompt.push_str(&format!("{}: {}\n", turn.role, turn.content));
        }
    }

    prompt
}

/// Leading excerpt of a chunk, bounded to [`EXCERPT_LENGTH`] characters.
fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_LENGTH) {
        Some((byte_offset, _)) => format!("{}...", &text[..byte_offset]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CONFIG, Config};
    use crate::inference::InferenceError;
    use crate::storage::Role;
    use async_trait::async_trait;

    const LEASE_TEXT: &str = "The tenant must pay rent. The landlord must maintain repairs.";

    fn ensure_test_config() {
        let _ = CONFIG.set(Config {
            openai_api_key: None,
            openai_base_url: "http://127.0.0.1:9".into(),
            embedding_model: "test-embedding".into(),
            chat_model: "test-chat".into(),
            chunk_size: 40,
            chunk_overlap: 5,
            retrieval_top_k: 3,
            completion_max_tokens: 128,
            completion_temperature: 0.0,
            history_window: 6,
            api_token: None,
            server_port: None,
        });
    }

    /// Deterministic embedding stub folding bytes into a fixed-length vector.
    struct HashingEmbedder {
        dimension: usize,
    }

    impl HashingEmbedder {
        fn encode(&self, text: &str) -> Vec<f32> {
            let mut embedding = vec![0.0_f32; self.dimension];
            for (idx, byte) in text.bytes().enumerate() {
                embedding[idx % self.dimension] += f32::from(byte) / 255.0;
            }
            let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                for value in &mut embedding {
                    *value /= norm;
                }
            }
            embedding
        }
    }

    #[async_trait]
    impl EmbeddingClient for HashingEmbedder {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, InferenceError> {
            Ok(texts.iter().map(|text| self.encode(text)).collect())
        }
    }

    struct StubCompletion {
        reply: Result<String, ()>,
    }

    #[async_trait]
    impl CompletionClient for StubCompletion {
        async fn complete(&self, _messages: Vec<ChatMessage>) -> Result<String, InferenceError> {
            self.reply
                .clone()
                .map_err(|()| InferenceError::Unavailable("stubbed outage".into()))
        }
    }

    fn service(reply: Result<String, ()>) -> RagService {
        ensure_test_config();
        RagService::new(
            Arc::new(HashingEmbedder { dimension: 16 }),
            Arc::new(StubCompletion { reply }),
            Arc::new(VectorIndex::new()),
            Arc::new(ChatMetrics::new()),
        )
    }

    #[tokio::test]
    async fn index_document_chunks_and_indexes() {
        let service = service(Ok("unused".into()));
        let outcome = service
            .index_document("doc-1", LEASE_TEXT)
            .await
            .expect("indexing succeeds");

        assert!(outcome.chunk_count >= 2);
        assert_eq!(outcome.chunk_size, 40);
        assert_eq!(outcome.flat_embedding.len(), outcome.chunk_count * 16);
        assert!(service.is_indexed("doc-1"));
    }

    #[tokio::test]
    async fn index_document_rejects_blank_text() {
        let service = service(Ok("unused".into()));
        let error = service.index_document("doc-1", "   \n ").await.unwrap_err();
        assert!(matches!(error, ProcessingError::EmptyDocument));
    }

    #[tokio::test]
    async fn answer_without_evidence_returns_fixed_response() {
        let service = service(Ok("unused".into()));
        let answer = service
            .answer("never-ingested", "When is rent due?", &[])
            .await
            .expect("terminal, non-error outcome");

        assert_eq!(answer.response, NO_EVIDENCE_RESPONSE);
        assert!(answer.sources.is_empty());
    }

    #[tokio::test]
    async fn answer_returns_completion_with_ranked_sources() {
        let service = service(Ok("Rent is due monthly.".into()));
        service
            .index_document("doc-1", LEASE_TEXT)
            .await
            .expect("indexing succeeds");

        let answer = service
            .answer("doc-1", "When must the tenant pay rent?", &[])
            .await
            .expect("answer succeeds");

        assert_eq!(answer.response, "Rent is due monthly.");
        assert!(!answer.sources.is_empty());
        assert!(answer.sources.len() <= 3);
        for pair in answer.sources.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        assert_eq!(service.metrics_snapshot().questions_answered, 1);
    }

    #[tokio::test]
    async fn completion_outage_surfaces_as_synthesis_failure() {
        let service = service(Err(()));
        service
            .index_document("doc-1", LEASE_TEXT)
            .await
            .expect("indexing succeeds");

        let error = service
            .answer("doc-1", "When must the tenant pay rent?", &[])
            .await
            .unwrap_err();
        assert!(matches!(error, AnswerError::SynthesisFailed(_)));
    }

    #[test]
    fn system_prompt_keeps_only_the_trailing_history_window() {
        let history: Vec<ConversationTurn> = (0..8)
            .map(|idx| ConversationTurn {
                role: if idx % 2 == 0 {
                    Role::User
                } else {
                    Role::Assistant
                },
                content: format!("turn-{idx}"),
            })
            .collect();

        let prompt = build_system_prompt("evidence body", &history, 6);
        assert!(prompt.contains("Document Context:\nevidence body"));
        assert!(!prompt.contains("turn-0"));
        assert!(!prompt.contains("turn-1"));
        assert!(prompt.contains("user: turn-2"));
        assert!(prompt.contains("assistant: turn-7"));
    }

    #[test]
    fn system_prompt_omits_history_section_when_empty() {
        let prompt = build_system_prompt("evidence", &[], 6);
        assert!(!prompt.contains("Previous conversation:"));
    }

    #[test]
    fn excerpt_truncates_long_chunks() {
        let long = "x".repeat(250);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), 203);
        assert!(cut.ends_with("..."));

        let short = "short chunk";
        assert_eq!(excerpt(short), short);
    }
}
