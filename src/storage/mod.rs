//! Storage collaborator boundary for documents, chat sessions, and messages.
//!
//! The retrieval core never queries this store for ranking; it only performs
//! identity lookups and persists metadata and conversation turns. Everything
//! behind [`DocumentStore`] is replaceable; the crate ships an in-memory
//! implementation suitable for single-process deployments and tests.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Errors returned by the storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested record does not exist (or belongs to another user).
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The backend failed to execute the operation.
    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message written by the end user.
    User,
    /// Message produced by the assistant.
    Assistant,
}

impl Role {
    /// Stable lowercase name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted metadata and text for one uploaded document.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    /// Durable document identifier; also the vector index key.
    pub id: String,
    /// Owner of the document.
    pub user_id: String,
    /// Display name from the original upload.
    pub original_name: String,
    /// SHA-256 hex digest of the uploaded bytes, for duplicate detection.
    pub content_hash: String,
    /// Raw extracted text.
    pub text: String,
    /// Flattened embedding vectors kept for audit and rehydration.
    pub embedding: Vec<f32>,
    /// Number of chunks produced at the last ingestion.
    pub chunk_count: usize,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
    /// Timestamp of the last successful (re-)ingestion.
    pub updated_at: OffsetDateTime,
}

/// Persisted chat session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Session identifier.
    pub id: String,
    /// Owner of the session.
    pub user_id: String,
    /// Document the session is grounded on, if any.
    pub document_id: Option<String>,
    /// Display title.
    pub title: String,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
    /// Timestamp of the most recent activity.
    pub updated_at: OffsetDateTime,
}

/// Persisted chat message.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    /// Message identifier.
    pub id: String,
    /// Owning session.
    pub session_id: String,
    /// Author of the message.
    pub role: Role,
    /// Message body.
    pub content: String,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
}

impl MessageRecord {
    /// Build a new message for `session_id` stamped with the current time.
    pub fn new(session_id: &str, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            session_id: session_id.to_string(),
            role,
            content: content.into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// CRUD surface over document metadata, chat sessions, and chat messages.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Look up a user's document by its display name.
    async fn find_document_by_name(
        &self,
        user_id: &str,
        original_name: &str,
    ) -> Result<Option<DocumentRecord>, StorageError>;

    /// Look up a user's document by content hash.
    async fn find_document_by_hash(
        &self,
        user_id: &str,
        content_hash: &str,
    ) -> Result<Option<DocumentRecord>, StorageError>;

    /// Fetch a user's document by id.
    async fn get_document(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<Option<DocumentRecord>, StorageError>;

    /// Persist a new document record.
    async fn insert_document(&self, record: DocumentRecord) -> Result<(), StorageError>;

    /// Replace an existing document record, matched by id.
    async fn update_document(&self, record: DocumentRecord) -> Result<(), StorageError>;

    /// Delete a user's document by id.
    async fn delete_document(&self, user_id: &str, document_id: &str)
    -> Result<(), StorageError>;

    /// Enumerate a user's documents, newest first.
    async fn list_documents(&self, user_id: &str) -> Result<Vec<DocumentRecord>, StorageError>;

    /// Persist a new chat session.
    async fn insert_session(&self, record: SessionRecord) -> Result<(), StorageError>;

    /// Fetch a user's session by id.
    async fn get_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<SessionRecord>, StorageError>;

    /// Enumerate a user's sessions, most recently active first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, StorageError>;

    /// Delete a user's session and its messages.
    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<(), StorageError>;

    /// Delete every session (and dependent messages) grounded on a document.
    /// Returns the number of sessions removed.
    async fn delete_sessions_for_document(
        &self,
        document_id: &str,
    ) -> Result<usize, StorageError>;

    /// Append a message to its session.
    async fn append_message(&self, record: MessageRecord) -> Result<(), StorageError>;

    /// Enumerate a session's messages in chronological order.
    async fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRecord>, StorageError>;

    /// Bump a session's activity timestamp.
    async fn touch_session(&self, session_id: &str) -> Result<(), StorageError>;
}

/// Construct an identifier suitable for stored records.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Format a timestamp for API payloads.
pub fn format_rfc3339(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
