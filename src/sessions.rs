//! Session orchestration over the storage collaborator.
//!
//! Sequences ingestion and question answering against the processing
//! pipeline while enforcing per-document isolation and the duplicate /
//! overwrite policy. This module is the only writer of the vector index:
//! ingestion replaces an entry wholesale, removal drops it after the
//! persistent delete has succeeded.

use crate::{
    extract::{ExtractionError, TextExtractor},
    metrics::MetricsSnapshot,
    processing::{ProcessingError, RagService, SourceAttribution},
    storage::{
        DocumentRecord, DocumentStore, MessageRecord, Role, SessionRecord, StorageError,
        generate_id,
    },
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

/// Fixed reply when a session has no document attached.
pub const NO_DOCUMENT_RESPONSE: &str = "I'm sorry, but I need a document to be uploaded to \
    answer your questions. Please upload a legal document first.";

/// Fixed reply substituted when answer synthesis fails.
pub const SYNTHESIS_APOLOGY: &str = "I encountered an error while processing your question. \
    Please try again.";

const DEFAULT_SESSION_TITLE: &str = "New Chat Session";

/// Identity of a stored document, carried in conflict errors and responses.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentHandle {
    /// Durable document identifier.
    pub id: String,
    /// Display name from the original upload.
    pub original_name: String,
}

impl From<&DocumentRecord> for DocumentHandle {
    fn from(record: &DocumentRecord) -> Self {
        Self {
            id: record.id.clone(),
            original_name: record.original_name.clone(),
        }
    }
}

/// Errors raised while ingesting a document.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A document with the same name already exists and overwrite was not
    /// requested. Carries the existing identity so the caller can prompt for
    /// confirmation and re-issue with the overwrite flag.
    #[error("a document named '{}' already exists", existing.original_name)]
    NameConflict {
        /// The conflicting stored document.
        existing: DocumentHandle,
    },
    /// The same content was already uploaded under a different name.
    #[error("this document has already been uploaded as '{}'", existing.original_name)]
    DuplicateContent {
        /// The stored document with identical content.
        existing: DocumentHandle,
    },
    /// Extraction produced no non-whitespace text.
    #[error("no text could be extracted from the document")]
    EmptyDocument,
    /// The extraction collaborator rejected the upload.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// The chunk/embed/index pipeline failed.
    #[error(transparent)]
    Processing(#[from] ProcessingError),
    /// The storage collaborator failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised while answering a question in a session.
#[derive(Debug, Error)]
pub enum AskError {
    /// The question was empty after trimming.
    #[error("question must not be empty")]
    EmptyQuestion,
    /// No session with that id belongs to the caller.
    #[error("chat session not found")]
    SessionNotFound,
    /// The storage collaborator failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result of a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Identity of the stored document.
    pub document: DocumentHandle,
    /// Number of chunks indexed for the document.
    pub chunk_count: usize,
    /// Whether an existing record was replaced.
    pub overwritten: bool,
}

/// Session listing entry with its document identity and latest message.
#[derive(Debug, Clone)]
pub struct SessionOverview {
    /// The session record.
    pub session: SessionRecord,
    /// Identity of the grounding document, when one is attached.
    pub document: Option<DocumentHandle>,
    /// Most recent message in the session, if any.
    pub last_message: Option<MessageRecord>,
}

/// Full session view with its message history.
#[derive(Debug, Clone)]
pub struct SessionDetail {
    /// The session record.
    pub session: SessionRecord,
    /// Identity of the grounding document, when one is attached.
    pub document: Option<DocumentHandle>,
    /// Messages in chronological order.
    pub messages: Vec<MessageRecord>,
}

/// One question/answer exchange as persisted.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// The persisted user turn.
    pub user_message: MessageRecord,
    /// The persisted assistant turn.
    pub assistant_message: MessageRecord,
    /// Evidence behind the assistant turn, in rank order.
    pub sources: Vec<SourceAttribution>,
}

/// Operations exposed to upstream surfaces.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Ingest an uploaded document for a user, honoring the overwrite policy.
    async fn ingest(
        &self,
        user_id: &str,
        original_name: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> Result<IngestOutcome, IngestError>;

    /// Enumerate a user's documents, newest first.
    async fn list_documents(&self, user_id: &str) -> Result<Vec<DocumentRecord>, StorageError>;

    /// Remove a document, its dependent sessions, and its index entry.
    async fn remove_document(&self, user_id: &str, document_id: &str)
    -> Result<(), StorageError>;

    /// Create a chat session, optionally grounded on one of the user's documents.
    async fn create_session(
        &self,
        user_id: &str,
        title: Option<String>,
        document_id: Option<String>,
    ) -> Result<SessionRecord, StorageError>;

    /// Enumerate a user's sessions, most recently active first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionOverview>, StorageError>;

    /// Fetch one session with its full message history.
    async fn session_detail(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<SessionDetail, StorageError>;

    /// Delete one of the user's sessions.
    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<(), StorageError>;

    /// Answer a question inside a session, persisting both turns.
    async fn ask(
        &self,
        user_id: &str,
        session_id: &str,
        question: &str,
    ) -> Result<Exchange, AskError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Orchestrator wiring the extraction, processing, and storage collaborators.
pub struct SessionService {
    store: Arc<dyn DocumentStore>,
    extractor: Arc<dyn TextExtractor>,
    rag: Arc<RagService>,
}

impl SessionService {
    /// Build a new orchestrator around the supplied collaborators.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        extractor: Arc<dyn TextExtractor>,
        rag: Arc<RagService>,
    ) -> Self {
        Self {
            store,
            extractor,
            rag,
        }
    }

    async fn document_handle(
        &self,
        user_id: &str,
        document_id: Option<&str>,
    ) -> Result<Option<DocumentHandle>, StorageError> {
        match document_id {
            Some(id) => Ok(self
                .store
                .get_document(user_id, id)
                .await?
                .as_ref()
                .map(DocumentHandle::from)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ChatApi for SessionService {
    async fn ingest(
        &self,
        user_id: &str,
        original_name: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> Result<IngestOutcome, IngestError> {
        let content_hash = content_hash(bytes);
        tracing::info!(
            user_id,
            original_name,
            size = bytes.len(),
            overwrite,
            "Ingesting document"
        );

        let same_name = self
            .store
            .find_document_by_name(user_id, original_name)
            .await?;

        if let Some(existing) = &same_name
            && !overwrite
        {
            tracing::debug!(user_id, original_name, "Name conflict on upload");
            return Err(IngestError::NameConflict {
                existing: existing.into(),
            });
        }

        if !overwrite
            && let Some(existing) = self
                .store
                .find_document_by_hash(user_id, &content_hash)
                .await?
            && existing.original_name != original_name
        {
            tracing::debug!(user_id, original_name, "Duplicate content on upload");
            return Err(IngestError::DuplicateContent {
                existing: (&existing).into(),
            });
        }

        let text = self.extractor.extract_text(bytes).await?;
        if text.trim().is_empty() {
            return Err(IngestError::EmptyDocument);
        }

        // The index is keyed by the durable id, so an overwrite reuses the
        // existing record's id and the put replaces the entry in place.
        let document_id = same_name
            .as_ref()
            .map(|existing| existing.id.clone())
            .unwrap_or_else(generate_id);
        let outcome = self.rag.index_document(&document_id, &text).await?;

        let now = OffsetDateTime::now_utc();
        let record = DocumentRecord {
            id: document_id,
            user_id: user_id.to_string(),
            original_name: original_name.to_string(),
            content_hash,
            text,
            embedding: outcome.flat_embedding,
            chunk_count: outcome.chunk_count,
            created_at: same_name
                .as_ref()
                .map(|existing| existing.created_at)
                .unwrap_or(now),
            updated_at: now,
        };
        let handle = DocumentHandle::from(&record);
        let overwritten = same_name.is_some();

        if overwritten {
            self.store.update_document(record).await?;
        } else {
            self.store.insert_document(record).await?;
        }

        tracing::info!(
            document_id = %handle.id,
            chunks = outcome.chunk_count,
            overwritten,
            "Document ingested"
        );
        Ok(IngestOutcome {
            document: handle,
            chunk_count: outcome.chunk_count,
            overwritten,
        })
    }

    async fn list_documents(&self, user_id: &str) -> Result<Vec<DocumentRecord>, StorageError> {
        self.store.list_documents(user_id).await
    }

    async fn remove_document(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<(), StorageError> {
        if self.store.get_document(user_id, document_id).await?.is_none() {
            return Err(StorageError::NotFound("document"));
        }

        let cascaded = self.store.delete_sessions_for_document(document_id).await?;
        self.store.delete_document(user_id, document_id).await?;
        // Index removal comes last: a dangling index entry is only a memory
        // leak, a persisted record referencing a purged index is a bug.
        self.rag.discard_document(document_id);

        tracing::info!(user_id, document_id, cascaded, "Document removed");
        Ok(())
    }

    async fn create_session(
        &self,
        user_id: &str,
        title: Option<String>,
        document_id: Option<String>,
    ) -> Result<SessionRecord, StorageError> {
        if let Some(id) = &document_id
            && self.store.get_document(user_id, id).await?.is_none()
        {
            return Err(StorageError::NotFound("document"));
        }

        let now = OffsetDateTime::now_utc();
        let record = SessionRecord {
            id: generate_id(),
            user_id: user_id.to_string(),
            document_id,
            title: title
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_SESSION_TITLE.to_string()),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_session(record.clone()).await?;
        Ok(record)
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionOverview>, StorageError> {
        let sessions = self.store.list_sessions(user_id).await?;
        let mut overviews = Vec::with_capacity(sessions.len());
        for session in sessions {
            let document = self
                .document_handle(user_id, session.document_id.as_deref())
                .await?;
            let last_message = self
                .store
                .list_messages(&session.id)
                .await?
                .into_iter()
                .next_back();
            overviews.push(SessionOverview {
                session,
                document,
                last_message,
            });
        }
        Ok(overviews)
    }

    async fn session_detail(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<SessionDetail, StorageError> {
        let session = self
            .store
            .get_session(user_id, session_id)
            .await?
            .ok_or(StorageError::NotFound("chat session"))?;
        let document = self
            .document_handle(user_id, session.document_id.as_deref())
            .await?;
        let messages = self.store.list_messages(session_id).await?;
        Ok(SessionDetail {
            session,
            document,
            messages,
        })
    }

    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<(), StorageError> {
        self.store.delete_session(user_id, session_id).await
    }

    async fn ask(
        &self,
        user_id: &str,
        session_id: &str,
        question: &str,
    ) -> Result<Exchange, AskError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::EmptyQuestion);
        }

        let session = self
            .store
            .get_session(user_id, session_id)
            .await?
            .ok_or(AskError::SessionNotFound)?;
        let history = self.store.list_messages(session_id).await?;

        let user_message = MessageRecord::new(session_id, Role::User, question);
        self.store.append_message(user_message.clone()).await?;

        let (response, sources) = match &session.document_id {
            None => (NO_DOCUMENT_RESPONSE.to_string(), Vec::new()),
            Some(document_id) => {
                let turns: Vec<_> = history
                    .iter()
                    .map(|message| crate::processing::ConversationTurn {
                        role: message.role,
                        content: message.content.clone(),
                    })
                    .collect();
                match self.rag.answer(document_id, question, &turns).await {
                    Ok(answer) => (answer.response, answer.sources),
                    Err(error) => {
                        // The exchange is still persisted so the user sees
                        // their question was recorded.
                        tracing::error!(
                            session_id,
                            document_id,
                            error = %error,
                            "Answer synthesis failed"
                        );
                        (SYNTHESIS_APOLOGY.to_string(), Vec::new())
                    }
                }
            }
        };

        let assistant_message = MessageRecord::new(session_id, Role::Assistant, response);
        self.store.append_message(assistant_message.clone()).await?;
        self.store.touch_session(session_id).await?;

        Ok(Exchange {
            user_message,
            assistant_message,
            sources,
        })
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.rag.metrics_snapshot()
    }
}

/// SHA-256 hex digest of the uploaded bytes.
fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CONFIG, Config};
    use crate::extract::PlainTextExtractor;
    use crate::index::VectorIndex;
    use crate::inference::{ChatMessage, CompletionClient, EmbeddingClient, InferenceError};
    use crate::metrics::ChatMetrics;
    use crate::storage::InMemoryStore;

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

    struct HashingEmbedder;

    #[async_trait]
    impl EmbeddingClient for HashingEmbedder {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, InferenceError> {
            Ok(texts
                .iter()
                .map(|text| {
                    let mut embedding = vec![0.0_f32; 16];
                    for (idx, byte) in text.bytes().enumerate() {
                        embedding[idx % 16] += f32::from(byte) / 255.0;
                    }
                    embedding
                })
                .collect())
        }
    }

    struct StubCompletion {
        healthy: bool,
    }

    #[async_trait]
    impl CompletionClient for StubCompletion {
        async fn complete(&self, _messages: Vec<ChatMessage>) -> Result<String, InferenceError> {
            if self.healthy {
                Ok("Rent is due monthly.".to_string())
            } else {
                Err(InferenceError::Unavailable("stubbed outage".into()))
            }
        }
    }

    fn build_service(healthy_completion: bool) -> SessionService {
        ensure_test_config();
        let rag = Arc::new(RagService::new(
            Arc::new(HashingEmbedder),
            Arc::new(StubCompletion {
                healthy: healthy_completion,
            }),
            Arc::new(VectorIndex::new()),
            Arc::new(ChatMetrics::new()),
        ));
        SessionService::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(PlainTextExtractor::new()),
            rag,
        )
    }

    #[tokio::test]
    async fn ingest_then_overwrite_replaces_the_document() {
        let service = build_service(true);

        let first = service
            .ingest("alice", "lease.txt", LEASE_TEXT.as_bytes(), false)
            .await
            .expect("first upload succeeds");
        assert!(!first.overwritten);
        assert!(first.chunk_count >= 2);

        let conflict = service
            .ingest("alice", "lease.txt", b"Some different lease text.", false)
            .await
            .unwrap_err();
        let IngestError::NameConflict { existing } = conflict else {
            panic!("expected a name conflict");
        };
        assert_eq!(existing.id, first.document.id);

        let second = service
            .ingest("alice", "lease.txt", b"Some different lease text.", true)
            .await
            .expect("overwrite succeeds");
        assert!(second.overwritten);
        assert_eq!(second.document.id, first.document.id);

        let documents = service.list_documents("alice").await.expect("list");
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].chunk_count, second.chunk_count);
    }

    #[tokio::test]
    async fn duplicate_content_under_a_new_name_is_rejected() {
        let service = build_service(true);
        service
            .ingest("alice", "lease.txt", LEASE_TEXT.as_bytes(), false)
            .await
            .expect("first upload succeeds");

        let error = service
            .ingest("alice", "copy-of-lease.txt", LEASE_TEXT.as_bytes(), false)
            .await
            .unwrap_err();
        assert!(matches!(error, IngestError::DuplicateContent { existing }
            if existing.original_name == "lease.txt"));
    }

    #[tokio::test]
    async fn blank_documents_are_rejected() {
        let service = build_service(true);
        let error = service
            .ingest("alice", "empty.txt", b"   \n \t ", false)
            .await
            .unwrap_err();
        assert!(matches!(error, IngestError::EmptyDocument));
    }

    #[tokio::test]
    async fn ask_without_document_returns_upload_prompt_and_persists_turns() {
        let service = build_service(true);
        let session = service
            .create_session("alice", None, None)
            .await
            .expect("session created");

        let exchange = service
            .ask("alice", &session.id, "When is rent due?")
            .await
            .expect("ask succeeds");

        assert_eq!(exchange.assistant_message.content, NO_DOCUMENT_RESPONSE);
        assert!(exchange.sources.is_empty());

        let detail = service
            .session_detail("alice", &session.id)
            .await
            .expect("detail");
        assert_eq!(detail.messages.len(), 2);
        assert_eq!(detail.messages[0].role, Role::User);
        assert_eq!(detail.messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn ask_answers_from_the_attached_document() {
        let service = build_service(true);
        let upload = service
            .ingest("alice", "lease.txt", LEASE_TEXT.as_bytes(), false)
            .await
            .expect("upload succeeds");
        let session = service
            .create_session("alice", Some("Lease questions".into()), Some(upload.document.id))
            .await
            .expect("session created");

        let exchange = service
            .ask("alice", &session.id, "When must the tenant pay rent?")
            .await
            .expect("ask succeeds");

        assert_eq!(exchange.assistant_message.content, "Rent is due monthly.");
        assert!(!exchange.sources.is_empty());
    }

    #[tokio::test]
    async fn synthesis_failure_persists_the_apology() {
        let service = build_service(false);
        let upload = service
            .ingest("alice", "lease.txt", LEASE_TEXT.as_bytes(), false)
            .await
            .expect("upload succeeds");
        let session = service
            .create_session("alice", None, Some(upload.document.id))
            .await
            .expect("session created");

        let exchange = service
            .ask("alice", &session.id, "When must the tenant pay rent?")
            .await
            .expect("ask still succeeds");

        assert_eq!(exchange.assistant_message.content, SYNTHESIS_APOLOGY);
        let detail = service
            .session_detail("alice", &session.id)
            .await
            .expect("detail");
        assert_eq!(detail.messages.len(), 2);
    }

    #[tokio::test]
    async fn removed_document_stops_yielding_evidence() {
        let service = build_service(true);
        let upload = service
            .ingest("alice", "lease.txt", LEASE_TEXT.as_bytes(), false)
            .await
            .expect("upload succeeds");
        let session = service
            .create_session("alice", None, Some(upload.document.id.clone()))
            .await
            .expect("session created");

        service
            .remove_document("alice", &upload.document.id)
            .await
            .expect("removal succeeds");

        // Dependent sessions were cascaded away with the document.
        let error = service
            .ask("alice", &session.id, "Anything left?")
            .await
            .unwrap_err();
        assert!(matches!(error, AskError::SessionNotFound));

        let documents = service.list_documents("alice").await.expect("list");
        assert!(documents.is_empty());

        // New sessions can no longer attach the purged document.
        let error = service
            .create_session("alice", None, Some(upload.document.id))
            .await
            .unwrap_err();
        assert!(matches!(error, StorageError::NotFound("document")));
    }

    #[tokio::test]
    async fn empty_questions_are_rejected_before_persistence() {
        let service = build_service(true);
        let session = service
            .create_session("alice", None, None)
            .await
            .expect("session created");

        let error = service.ask("alice", &session.id, "   ").await.unwrap_err();
        assert!(matches!(error, AskError::EmptyQuestion));

        let detail = service
            .session_detail("alice", &session.id)
            .await
            .expect("detail");
        assert!(detail.messages.is_empty());
    }

    #[tokio::test]
    async fn sessions_are_scoped_to_their_owner() {
        let service = build_service(true);
        let session = service
            .create_session("alice", None, None)
            .await
            .expect("session created");

        let error = service.ask("mallory", &session.id, "hello?").await.unwrap_err();
        assert!(matches!(error, AskError::SessionNotFound));
    }
}
