//! In-memory implementation of the storage collaborator.

use super::{DocumentRecord, DocumentStore, MessageRecord, SessionRecord, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Default)]
struct StoreState {
    documents: HashMap<String, DocumentRecord>,
    sessions: HashMap<String, SessionRecord>,
    messages: HashMap<String, Vec<MessageRecord>>,
}

/// Process-lifetime store backed by hash maps behind one async lock.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find_document_by_name(
        &self,
        user_id: &str,
        original_name: &str,
    ) -> Result<Option<DocumentRecord>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .values()
            .find(|doc| doc.user_id == user_id && doc.original_name == original_name)
            .cloned())
    }

    async fn find_document_by_hash(
        &self,
        user_id: &str,
        content_hash: &str,
    ) -> Result<Option<DocumentRecord>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .values()
            .find(|doc| doc.user_id == user_id && doc.content_hash == content_hash)
            .cloned())
    }

    async fn get_document(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<Option<DocumentRecord>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .get(document_id)
            .filter(|doc| doc.user_id == user_id)
            .cloned())
    }

    async fn insert_document(&self, record: DocumentRecord) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        state.documents.insert(record.id.clone(), record);
        Ok(())
    }

    async fn update_document(&self, record: DocumentRecord) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if !state.documents.contains_key(&record.id) {
            return Err(StorageError::NotFound("document"));
        }
        state.documents.insert(record.id.clone(), record);
        Ok(())
    }

    async fn delete_document(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let owned = state
            .documents
            .get(document_id)
            .is_some_and(|doc| doc.user_id == user_id);
        if !owned {
            return Err(StorageError::NotFound("document"));
        }
        state.documents.remove(document_id);
        Ok(())
    }

    async fn list_documents(&self, user_id: &str) -> Result<Vec<DocumentRecord>, StorageError> {
        let state = self.state.read().await;
        let mut documents: Vec<DocumentRecord> = state
            .documents
            .values()
            .filter(|doc| doc.user_id == user_id)
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }

    async fn insert_session(&self, record: SessionRecord) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        state.sessions.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<SessionRecord>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .sessions
            .get(session_id)
            .filter(|session| session.user_id == user_id)
            .cloned())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, StorageError> {
        let state = self.state.read().await;
        let mut sessions: Vec<SessionRecord> = state
            .sessions
            .values()
            .filter(|session| session.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let owned = state
            .sessions
            .get(session_id)
            .is_some_and(|session| session.user_id == user_id);
        if !owned {
            return Err(StorageError::NotFound("chat session"));
        }
        state.sessions.remove(session_id);
        state.messages.remove(session_id);
        Ok(())
    }

    async fn delete_sessions_for_document(
        &self,
        document_id: &str,
    ) -> Result<usize, StorageError> {
        let mut state = self.state.write().await;
        let doomed: Vec<String> = state
            .sessions
            .values()
            .filter(|session| session.document_id.as_deref() == Some(document_id))
            .map(|session| session.id.clone())
            .collect();
        for session_id in &doomed {
            state.sessions.remove(session_id);
            state.messages.remove(session_id);
        }
        Ok(doomed.len())
    }

    async fn append_message(&self, record: MessageRecord) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if !state.sessions.contains_key(&record.session_id) {
            return Err(StorageError::NotFound("chat session"));
        }
        state
            .messages
            .entry(record.session_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRecord>, StorageError> {
        let state = self.state.read().await;
        Ok(state.messages.get(session_id).cloned().unwrap_or_default())
    }

    async fn touch_session(&self, session_id: &str) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        match state.sessions.get_mut(session_id) {
            Some(session) => {
                session.updated_at = OffsetDateTime::now_utc();
                Ok(())
            }
            None => Err(StorageError::NotFound("chat session")),
        }
    }
}
