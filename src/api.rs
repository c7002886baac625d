//! HTTP surface for Docchat.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /documents` – Upload a document (multipart `file` field, optional
//!   `overwrite` field). Chunks, embeds, and indexes the extracted text and
//!   persists the document record. Returns `201` for fresh uploads, `200`
//!   when an existing document was overwritten, and `409` with a
//!   machine-readable `code` plus the existing document's identity on
//!   name/content conflicts.
//! - `GET /documents` – List the caller's documents.
//! - `DELETE /documents/:id` – Remove a document, its sessions, and its
//!   index entry.
//! - `POST /sessions` / `GET /sessions` / `GET /sessions/:id` /
//!   `DELETE /sessions/:id` – Chat session CRUD.
//! - `POST /sessions/:id/messages` – Ask a question; both turns are
//!   persisted and the answer carries source attributions.
//! - `GET /metrics` – Activity counters for observability.
//!
//! Every handler resolves the caller through the injected
//! [`IdentityVerifier`] before any core operation runs.

use crate::auth::{AuthError, IdentityVerifier};
use crate::metrics::MetricsSnapshot;
use crate::processing::{ProcessingError, SourceAttribution};
use crate::sessions::{
    AskError, ChatApi, DocumentHandle, IngestError, SessionDetail, SessionOverview,
};
use crate::storage::{DocumentRecord, MessageRecord, SessionRecord, StorageError, format_rfc3339};
use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Shared state handed to every handler.
pub struct AppState<S> {
    /// Orchestrator implementing the chat operations.
    pub service: Arc<S>,
    /// Identity verifier consulted before any core operation.
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            verifier: Arc::clone(&self.verifier),
        }
    }
}

/// Build the HTTP router exposing the document-chat API surface.
pub fn create_router<S>(state: AppState<S>) -> Router
where
    S: ChatApi + 'static,
{
    Router::new()
        .route("/documents", post(upload_document::<S>).get(list_documents::<S>))
        .route("/documents/:id", axum::routing::delete(remove_document::<S>))
        .route("/sessions", post(create_session::<S>).get(list_sessions::<S>))
        .route(
            "/sessions/:id",
            get(session_detail::<S>).delete(delete_session::<S>),
        )
        .route("/sessions/:id/messages", post(send_message::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(state)
}

async fn authorize<S>(state: &AppState<S>, headers: &HeaderMap) -> Result<String, AppError> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);
    let user_hint = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok());
    Ok(state.verifier.verify(bearer, user_hint).await?)
}

/// Success response for `POST /documents`.
#[derive(Serialize)]
struct UploadResponse {
    document: DocumentHandle,
    chunks_indexed: usize,
    overwritten: bool,
}

/// Upload a document: multipart `file` (with filename) plus optional
/// `overwrite` boolean field.
async fn upload_document<S>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, AppError>
where
    S: ChatApi,
{
    let user_id = authorize(&state, &headers).await?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut overwrite = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| AppError::BadRequest(format!("malformed multipart body: {error}")))?
    {
        // Copy the name out: reading the field's body consumes it.
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let original_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|name| !name.trim().is_empty())
                    .ok_or_else(|| AppError::BadRequest("file field needs a filename".into()))?;
                let bytes = field.bytes().await.map_err(|error| {
                    AppError::BadRequest(format!("failed to read upload: {error}"))
                })?;
                upload = Some((original_name, bytes.to_vec()));
            }
            Some("overwrite") => {
                let value = field.text().await.map_err(|error| {
                    AppError::BadRequest(format!("failed to read overwrite flag: {error}"))
                })?;
                overwrite = value.trim().eq_ignore_ascii_case("true");
            }
            _ => {}
        }
    }

    let Some((original_name, bytes)) = upload else {
        return Err(AppError::BadRequest("no file uploaded".into()));
    };

    let outcome = state
        .service
        .ingest(&user_id, &original_name, &bytes, overwrite)
        .await?;
    tracing::info!(
        user_id,
        document_id = %outcome.document.id,
        chunks = outcome.chunk_count,
        overwritten = outcome.overwritten,
        "Upload completed"
    );

    let status = if outcome.overwritten {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let body = Json(UploadResponse {
        chunks_indexed: outcome.chunk_count,
        overwritten: outcome.overwritten,
        document: outcome.document,
    });
    Ok((status, body).into_response())
}

/// One document entry in `GET /documents`.
#[derive(Serialize)]
struct DocumentResponse {
    id: String,
    original_name: String,
    chunk_count: usize,
    created_at: String,
    updated_at: String,
}

impl From<DocumentRecord> for DocumentResponse {
    fn from(record: DocumentRecord) -> Self {
        Self {
            id: record.id,
            original_name: record.original_name,
            chunk_count: record.chunk_count,
            created_at: format_rfc3339(record.created_at),
            updated_at: format_rfc3339(record.updated_at),
        }
    }
}

/// List the caller's documents, newest first.
async fn list_documents<S>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> Result<Json<Vec<DocumentResponse>>, AppError>
where
    S: ChatApi,
{
    let user_id = authorize(&state, &headers).await?;
    let documents = state.service.list_documents(&user_id).await?;
    Ok(Json(documents.into_iter().map(Into::into).collect()))
}

/// Remove a document along with its sessions and index entry.
async fn remove_document<S>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError>
where
    S: ChatApi,
{
    let user_id = authorize(&state, &headers).await?;
    state.service.remove_document(&user_id, &document_id).await?;
    Ok(Json(json!({ "message": "Document deleted successfully" })))
}

/// Request body for `POST /sessions`.
#[derive(Deserialize)]
struct CreateSessionRequest {
    /// Optional display title.
    #[serde(default)]
    title: Option<String>,
    /// Optional document to ground the session on.
    #[serde(default)]
    document_id: Option<String>,
}

/// Response body for `POST /sessions`.
#[derive(Serialize)]
struct SessionResponse {
    id: String,
    title: String,
    document_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<SessionRecord> for SessionResponse {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            document_id: record.document_id,
            created_at: format_rfc3339(record.created_at),
            updated_at: format_rfc3339(record.updated_at),
        }
    }
}

/// Create a chat session.
async fn create_session<S>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError>
where
    S: ChatApi,
{
    let user_id = authorize(&state, &headers).await?;
    let session = state
        .service
        .create_session(&user_id, request.title, request.document_id)
        .await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// One message in session payloads.
#[derive(Serialize)]
struct MessageResponse {
    id: String,
    role: String,
    content: String,
    created_at: String,
}

impl From<MessageRecord> for MessageResponse {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            role: record.role.to_string(),
            content: record.content,
            created_at: format_rfc3339(record.created_at),
        }
    }
}

/// One session entry in `GET /sessions`.
#[derive(Serialize)]
struct SessionOverviewResponse {
    id: String,
    title: String,
    document: Option<DocumentHandle>,
    last_message: Option<MessageResponse>,
    created_at: String,
    updated_at: String,
}

impl From<SessionOverview> for SessionOverviewResponse {
    fn from(overview: SessionOverview) -> Self {
        Self {
            id: overview.session.id,
            title: overview.session.title,
            document: overview.document,
            last_message: overview.last_message.map(Into::into),
            created_at: format_rfc3339(overview.session.created_at),
            updated_at: format_rfc3339(overview.session.updated_at),
        }
    }
}

/// List the caller's sessions, most recently active first.
async fn list_sessions<S>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> Result<Json<Vec<SessionOverviewResponse>>, AppError>
where
    S: ChatApi,
{
    let user_id = authorize(&state, &headers).await?;
    let sessions = state.service.list_sessions(&user_id).await?;
    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

/// Full session payload for `GET /sessions/:id`.
#[derive(Serialize)]
struct SessionDetailResponse {
    id: String,
    title: String,
    document: Option<DocumentHandle>,
    messages: Vec<MessageResponse>,
    created_at: String,
    updated_at: String,
}

impl From<SessionDetail> for SessionDetailResponse {
    fn from(detail: SessionDetail) -> Self {
        Self {
            id: detail.session.id,
            title: detail.session.title,
            document: detail.document,
            messages: detail.messages.into_iter().map(Into::into).collect(),
            created_at: format_rfc3339(detail.session.created_at),
            updated_at: format_rfc3339(detail.session.updated_at),
        }
    }
}

/// Fetch one session with its message history.
async fn session_detail<S>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDetailResponse>, AppError>
where
    S: ChatApi,
{
    let user_id = authorize(&state, &headers).await?;
    let detail = state.service.session_detail(&user_id, &session_id).await?;
    Ok(Json(detail.into()))
}

/// Delete one of the caller's sessions.
async fn delete_session<S>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError>
where
    S: ChatApi,
{
    let user_id = authorize(&state, &headers).await?;
    state.service.delete_session(&user_id, &session_id).await?;
    Ok(Json(json!({ "message": "Chat session deleted successfully" })))
}

/// Request body for `POST /sessions/:id/messages`.
#[derive(Deserialize)]
struct SendMessageRequest {
    message: String,
}

/// Response body for `POST /sessions/:id/messages`.
#[derive(Serialize)]
struct SendMessageResponse {
    user_message: MessageResponse,
    assistant_message: MessageResponse,
    sources: Vec<SourceAttribution>,
}

/// Ask a question inside a session.
async fn send_message<S>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError>
where
    S: ChatApi,
{
    let user_id = authorize(&state, &headers).await?;
    let exchange = state
        .service
        .ask(&user_id, &session_id, &request.message)
        .await?;
    Ok(Json(SendMessageResponse {
        user_message: exchange.user_message.into(),
        assistant_message: exchange.assistant_message.into(),
        sources: exchange.sources,
    }))
}

/// Response body for `GET /metrics`.
#[derive(Serialize)]
struct MetricsResponse {
    documents_ingested: u64,
    chunks_indexed: u64,
    questions_answered: u64,
}

/// Return activity counters for observability dashboards.
async fn get_metrics<S>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> Result<Json<MetricsResponse>, AppError>
where
    S: ChatApi,
{
    authorize(&state, &headers).await?;
    let MetricsSnapshot {
        documents_ingested,
        chunks_indexed,
        questions_answered,
    } = state.service.metrics_snapshot();
    Ok(Json(MetricsResponse {
        documents_ingested,
        chunks_indexed,
        questions_answered,
    }))
}

enum AppError {
    Auth(AuthError),
    Ingest(IngestError),
    Ask(AskError),
    Storage(StorageError),
    BadRequest(String),
}

impl From<AuthError> for AppError {
    fn from(inner: AuthError) -> Self {
        Self::Auth(inner)
    }
}

impl From<IngestError> for AppError {
    fn from(inner: IngestError) -> Self {
        Self::Ingest(inner)
    }
}

impl From<AskError> for AppError {
    fn from(inner: AskError) -> Self {
        Self::Ask(inner)
    }
}

impl From<StorageError> for AppError {
    fn from(inner: StorageError) -> Self {
        Self::Storage(inner)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Auth(error) => (
                StatusCode::UNAUTHORIZED,
                json!({ "message": error.to_string() }),
            ),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "message": message })),
            Self::Ingest(error) => return ingest_error_response(error),
            Self::Ask(AskError::EmptyQuestion) => (
                StatusCode::BAD_REQUEST,
                json!({ "message": AskError::EmptyQuestion.to_string() }),
            ),
            Self::Ask(AskError::SessionNotFound) => (
                StatusCode::NOT_FOUND,
                json!({ "message": AskError::SessionNotFound.to_string() }),
            ),
            Self::Ask(AskError::Storage(error)) => return AppError::Storage(error).into_response(),
            Self::Storage(StorageError::NotFound(entity)) => (
                StatusCode::NOT_FOUND,
                json!({ "message": format!("{entity} not found") }),
            ),
            Self::Storage(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": error.to_string() }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

fn ingest_error_response(error: IngestError) -> Response {
    let (status, body) = match &error {
        IngestError::NameConflict { existing } => (
            StatusCode::CONFLICT,
            json!({
                "code": "NAME_EXISTS",
                "message": error.to_string(),
                "document": existing,
            }),
        ),
        IngestError::DuplicateContent { existing } => (
            StatusCode::CONFLICT,
            json!({
                "code": "DUPLICATE_FILE",
                "message": error.to_string(),
                "document": existing,
            }),
        ),
        IngestError::EmptyDocument | IngestError::Extraction(_) => (
            StatusCode::BAD_REQUEST,
            json!({ "message": error.to_string() }),
        ),
        IngestError::Processing(ProcessingError::Embedding(_)) => (
            StatusCode::BAD_GATEWAY,
            json!({ "message": error.to_string() }),
        ),
        IngestError::Processing(_) | IngestError::Storage(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "message": error.to_string() }),
        ),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenVerifier;
    use crate::sessions::{Exchange, IngestOutcome};
    use crate::storage::Role;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request},
    };
    use time::OffsetDateTime;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-DOCCHAT-TEST-BOUNDARY";

    #[derive(Clone, Debug)]
    struct IngestCall {
        user_id: String,
        original_name: String,
        bytes: Vec<u8>,
        overwrite: bool,
    }

    struct StubChatService {
        ingest_calls: Mutex<Vec<IngestCall>>,
        conflict: bool,
    }

    impl StubChatService {
        fn new(conflict: bool) -> Self {
            Self {
                ingest_calls: Mutex::new(Vec::new()),
                conflict,
            }
        }
    }

    #[async_trait]
    impl ChatApi for StubChatService {
        async fn ingest(
            &self,
            user_id: &str,
            original_name: &str,
            bytes: &[u8],
            overwrite: bool,
        ) -> Result<IngestOutcome, IngestError> {
            self.ingest_calls.lock().await.push(IngestCall {
                user_id: user_id.to_string(),
                original_name: original_name.to_string(),
                bytes: bytes.to_vec(),
                overwrite,
            });
            if self.conflict && !overwrite {
                return Err(IngestError::NameConflict {
                    existing: DocumentHandle {
                        id: "doc-existing".into(),
                        original_name: original_name.to_string(),
                    },
                });
            }
            Ok(IngestOutcome {
                document: DocumentHandle {
                    id: "doc-1".into(),
                    original_name: original_name.to_string(),
                },
                chunk_count: 3,
                overwritten: overwrite,
            })
        }

        async fn list_documents(
            &self,
            _user_id: &str,
        ) -> Result<Vec<DocumentRecord>, StorageError> {
            Ok(Vec::new())
        }

        async fn remove_document(
            &self,
            _user_id: &str,
            _document_id: &str,
        ) -> Result<(), StorageError> {
            Err(StorageError::NotFound("document"))
        }

        async fn create_session(
            &self,
            user_id: &str,
            title: Option<String>,
            document_id: Option<String>,
        ) -> Result<SessionRecord, StorageError> {
            let now = OffsetDateTime::now_utc();
            Ok(SessionRecord {
                id: "session-1".into(),
                user_id: user_id.to_string(),
                document_id,
                title: title.unwrap_or_else(|| "New Chat Session".into()),
                created_at: now,
                updated_at: now,
            })
        }

        async fn list_sessions(
            &self,
            _user_id: &str,
        ) -> Result<Vec<SessionOverview>, StorageError> {
            Ok(Vec::new())
        }

        async fn session_detail(
            &self,
            _user_id: &str,
            _session_id: &str,
        ) -> Result<SessionDetail, StorageError> {
            Err(StorageError::NotFound("chat session"))
        }

        async fn delete_session(
            &self,
            _user_id: &str,
            _session_id: &str,
        ) -> Result<(), StorageError> {
            Ok(())
        }

        async fn ask(
            &self,
            _user_id: &str,
            session_id: &str,
            question: &str,
        ) -> Result<Exchange, AskError> {
            if question.trim().is_empty() {
                return Err(AskError::EmptyQuestion);
            }
            Ok(Exchange {
                user_message: MessageRecord::new(session_id, Role::User, question),
                assistant_message: MessageRecord::new(
                    session_id,
                    Role::Assistant,
                    "Rent is due monthly.",
                ),
                sources: vec![SourceAttribution {
                    excerpt: "The tenant must pay rent.".into(),
                    // Exactly representable in both f32 and f64, so the JSON
                    // round-trip compares equal.
                    similarity: 0.875,
                }],
            })
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_ingested: 1,
                chunks_indexed: 3,
                questions_answered: 2,
            }
        }
    }

    fn router_with(service: Arc<StubChatService>, token: Option<String>) -> Router {
        create_router(AppState {
            service,
            verifier: Arc::new(StaticTokenVerifier::new(token)),
        })
    }

    fn multipart_body(filename: &str, content: &str, overwrite: Option<&str>) -> String {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{filename}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
        );
        if let Some(flag) = overwrite {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"overwrite\"\r\n\r\n{flag}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn upload_request(body: String) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/documents")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header("x-user-id", "alice")
            .body(Body::from(body))
            .expect("request")
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn upload_accepts_multipart_and_reports_chunks() {
        let service = Arc::new(StubChatService::new(false));
        let app = router_with(service.clone(), None);

        let response = app
            .oneshot(upload_request(multipart_body(
                "lease.txt",
                "The tenant must pay rent.",
                Some("false"),
            )))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["chunks_indexed"], 3);
        assert_eq!(body["overwritten"], false);
        assert_eq!(body["document"]["id"], "doc-1");

        let calls = service.ingest_calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].user_id, "alice");
        assert_eq!(calls[0].original_name, "lease.txt");
        assert_eq!(calls[0].bytes, b"The tenant must pay rent.");
        assert!(!calls[0].overwrite);
    }

    #[tokio::test]
    async fn upload_without_file_is_rejected() {
        let app = router_with(Arc::new(StubChatService::new(false)), None);
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"overwrite\"\r\n\r\ntrue\r\n--{BOUNDARY}--\r\n"
        );

        let response = app
            .oneshot(upload_request(body))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn name_conflict_returns_409_with_existing_identity() {
        let app = router_with(Arc::new(StubChatService::new(true)), None);

        let response = app
            .oneshot(upload_request(multipart_body(
                "lease.txt",
                "contents",
                None,
            )))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = json_body(response).await;
        assert_eq!(body["code"], "NAME_EXISTS");
        assert_eq!(body["document"]["id"], "doc-existing");
    }

    #[tokio::test]
    async fn overwrite_upload_returns_200() {
        let app = router_with(Arc::new(StubChatService::new(true)), None);

        let response = app
            .oneshot(upload_request(multipart_body(
                "lease.txt",
                "contents",
                Some("true"),
            )))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["overwritten"], true);
    }

    #[tokio::test]
    async fn ask_returns_both_turns_and_sources() {
        let app = router_with(Arc::new(StubChatService::new(false)), None);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/sessions/session-1/messages")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "message": "When is rent due?" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["user_message"]["role"], "user");
        assert_eq!(body["assistant_message"]["content"], "Rent is due monthly.");
        assert_eq!(body["sources"][0]["similarity"], 0.875);
        assert_eq!(body["sources"][0]["excerpt"], "The tenant must pay rent.");
    }

    #[tokio::test]
    async fn missing_session_maps_to_404() {
        let app = router_with(Arc::new(StubChatService::new(false)), None);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/sessions/absent")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn requests_without_token_are_unauthorized_in_token_mode() {
        let app = router_with(Arc::new(StubChatService::new(false)), Some("secret".into()));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/documents")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn metrics_reports_counters() {
        let app = router_with(Arc::new(StubChatService::new(false)), None);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["documents_ingested"], 1);
        assert_eq!(body["questions_answered"], 2);
    }
}
