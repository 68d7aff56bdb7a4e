//! HTTP surface for the document intake service.
//!
//! This module exposes a compact Axum router over one shared session:
//!
//! - `POST /documents/:name` – Upload raw file bytes; ZIP archives are expanded into their
//!   supported members. Returns `{ "added": [...], "skipped": [...] }`.
//! - `GET /documents` / `DELETE /documents` – List the session's documents or reset the session.
//! - `POST /classifications` – Classify every document that has no type yet.
//! - `PUT /classifications/:name` – Override (and confirm) a document's type.
//! - `POST /classifications/:name/confirm` – Confirm one classification.
//! - `POST /confirmations` – Confirm every pending classification.
//! - `GET /groups` – Confirmed documents grouped by type.
//! - `POST /summaries` / `POST /deadlines` – Summaries or deadlines for one confirmed type.
//! - `POST /chat` / `GET /chat` / `DELETE /chat` – Ask, read or clear a conversation; the
//!   optional `document` field or query parameter narrows the scope to one document.
//! - `GET /metrics` – Intake counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.

use crate::classification::DocumentType;
use crate::retrieval::ChatTurn;
use crate::service::{
    ChatAnswer, DocumentDeadlines, DocumentSummary, ErrorKind, IntakeApi, IntakeError,
    UploadOutcome,
};
use crate::session::{ChatScope, Classification};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build the HTTP router exposing the intake API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: IntakeApi + 'static,
{
    Router::new()
        .route("/documents/:name", post(upload_document::<S>))
        .route(
            "/documents",
            get(list_documents::<S>).delete(clear_session::<S>),
        )
        .route("/classifications", post(classify_documents::<S>))
        .route("/classifications/:name", put(override_type::<S>))
        .route("/classifications/:name/confirm", post(confirm_document::<S>))
        .route("/confirmations", post(confirm_all::<S>))
        .route("/groups", get(list_groups::<S>))
        .route("/summaries", post(summarize_type::<S>))
        .route("/deadlines", post(extract_deadlines::<S>))
        .route(
            "/chat",
            post(ask_question::<S>)
                .get(chat_history::<S>)
                .delete(clear_chat::<S>),
        )
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

/// Store an uploaded file (or every supported member of an uploaded ZIP).
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<UploadOutcome>, AppError>
where
    S: IntakeApi,
{
    let outcome = service.upload(&name, body.to_vec()).await?;
    Ok(Json(outcome))
}

/// Response body for `GET /documents`.
#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<String>,
}

async fn list_documents<S>(State(service): State<Arc<S>>) -> Json<DocumentsResponse>
where
    S: IntakeApi,
{
    Json(DocumentsResponse {
        documents: service.list_documents().await,
    })
}

async fn clear_session<S>(State(service): State<Arc<S>>) -> StatusCode
where
    S: IntakeApi,
{
    service.clear().await;
    StatusCode::NO_CONTENT
}

/// Response body listing classifications in upload order.
#[derive(Serialize)]
struct ClassificationsResponse {
    classifications: Vec<Classification>,
}

async fn classify_documents<S>(
    State(service): State<Arc<S>>,
) -> Result<Json<ClassificationsResponse>, AppError>
where
    S: IntakeApi,
{
    let classifications = service.classify_all().await?;
    Ok(Json(ClassificationsResponse { classifications }))
}

/// Request body naming a document type; free text is normalized to the canonical label.
#[derive(Deserialize)]
struct TypeRequest {
    #[serde(rename = "type")]
    document_type: DocumentType,
}

async fn override_type<S>(
    State(service): State<Arc<S>>,
    Path(name): Path<String>,
    Json(request): Json<TypeRequest>,
) -> Result<Json<Classification>, AppError>
where
    S: IntakeApi,
{
    let classification = service.override_type(&name, request.document_type).await?;
    Ok(Json(classification))
}

async fn confirm_document<S>(
    State(service): State<Arc<S>>,
    Path(name): Path<String>,
) -> Result<Json<Classification>, AppError>
where
    S: IntakeApi,
{
    Ok(Json(service.confirm(&name).await?))
}

async fn confirm_all<S>(State(service): State<Arc<S>>) -> Json<ClassificationsResponse>
where
    S: IntakeApi,
{
    Json(ClassificationsResponse {
        classifications: service.confirm_all().await,
    })
}

/// One entry of `GET /groups`.
#[derive(Serialize)]
struct GroupView {
    #[serde(rename = "type")]
    document_type: DocumentType,
    documents: Vec<String>,
}

/// Response body for `GET /groups`.
#[derive(Serialize)]
struct GroupsResponse {
    groups: Vec<GroupView>,
}

async fn list_groups<S>(State(service): State<Arc<S>>) -> Json<GroupsResponse>
where
    S: IntakeApi,
{
    let groups = service
        .groups()
        .await
        .into_iter()
        .map(|(document_type, documents)| GroupView {
            document_type,
            documents,
        })
        .collect();
    Json(GroupsResponse { groups })
}

/// Response body for `POST /summaries`.
#[derive(Serialize)]
struct SummariesResponse {
    #[serde(rename = "type")]
    document_type: DocumentType,
    summaries: Vec<DocumentSummary>,
}

async fn summarize_type<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<TypeRequest>,
) -> Result<Json<SummariesResponse>, AppError>
where
    S: IntakeApi,
{
    let summaries = service.summarize_type(&request.document_type).await?;
    Ok(Json(SummariesResponse {
        document_type: request.document_type,
        summaries,
    }))
}

/// Response body for `POST /deadlines`.
#[derive(Serialize)]
struct DeadlinesResponse {
    #[serde(rename = "type")]
    document_type: DocumentType,
    deadlines: Vec<DocumentDeadlines>,
}

async fn extract_deadlines<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<TypeRequest>,
) -> Result<Json<DeadlinesResponse>, AppError>
where
    S: IntakeApi,
{
    let deadlines = service.deadlines_for_type(&request.document_type).await?;
    Ok(Json(DeadlinesResponse {
        document_type: request.document_type,
        deadlines,
    }))
}

/// Request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    question: String,
    /// Restrict the conversation to one document; omitted means every document.
    #[serde(default)]
    document: Option<String>,
}

/// Query string accepted by `GET /chat` and `DELETE /chat`.
#[derive(Deserialize)]
struct ScopeQuery {
    #[serde(default)]
    document: Option<String>,
}

async fn ask_question<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatAnswer>, AppError>
where
    S: IntakeApi,
{
    let answer = service
        .ask(ChatScope::from(request.document), &request.question)
        .await?;
    Ok(Json(answer))
}

/// Response body for `GET /chat`.
#[derive(Serialize)]
struct HistoryResponse {
    history: Vec<ChatTurn>,
}

async fn chat_history<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<HistoryResponse>, AppError>
where
    S: IntakeApi,
{
    let history = service.chat_history(ChatScope::from(query.document)).await?;
    Ok(Json(HistoryResponse { history }))
}

async fn clear_chat<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<ScopeQuery>,
) -> Result<StatusCode, AppError>
where
    S: IntakeApi,
{
    service.clear_chat(ChatScope::from(query.document)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Return the intake counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: IntakeApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/documents/:name",
                description: "Upload raw file bytes (PDF, DOCX, PPTX, XLSX, TXT or a ZIP of these). Response returns { \"added\": [names], \"skipped\": [names] }.",
                request_example: None,
            },
            CommandDescriptor {
                name: "list_documents",
                method: "GET",
                path: "/documents",
                description: "Return the names of the uploaded documents in upload order.",
                request_example: None,
            },
            CommandDescriptor {
                name: "clear_session",
                method: "DELETE",
                path: "/documents",
                description: "Drop every document, classification, cached result and conversation.",
                request_example: None,
            },
            CommandDescriptor {
                name: "classify",
                method: "POST",
                path: "/classifications",
                description: "Classify every document that has no type yet and return all classifications.",
                request_example: None,
            },
            CommandDescriptor {
                name: "override_type",
                method: "PUT",
                path: "/classifications/:name",
                description: "Assign a type manually; the classification is confirmed and can no longer change.",
                request_example: Some(json!({ "type": "Contrato" })),
            },
            CommandDescriptor {
                name: "confirm",
                method: "POST",
                path: "/classifications/:name/confirm",
                description: "Confirm the suggested type of one document.",
                request_example: None,
            },
            CommandDescriptor {
                name: "confirm_all",
                method: "POST",
                path: "/confirmations",
                description: "Confirm every pending classification.",
                request_example: None,
            },
            CommandDescriptor {
                name: "groups",
                method: "GET",
                path: "/groups",
                description: "Return confirmed documents grouped by type.",
                request_example: None,
            },
            CommandDescriptor {
                name: "summaries",
                method: "POST",
                path: "/summaries",
                description: "Summarize every confirmed document of a type with the type's template.",
                request_example: Some(json!({ "type": "Relatório" })),
            },
            CommandDescriptor {
                name: "deadlines",
                method: "POST",
                path: "/deadlines",
                description: "Extract up to ten `event: date` lines from every confirmed document of a type.",
                request_example: Some(json!({ "type": "Contrato" })),
            },
            CommandDescriptor {
                name: "chat",
                method: "POST",
                path: "/chat",
                description: "Ask a question about all documents, or one document when `document` is set.",
                request_example: Some(json!({
                    "question": "Qual é o prazo de vigência?",
                    "document": "contrato.pdf"
                })),
            },
            CommandDescriptor {
                name: "chat_history",
                method: "GET",
                path: "/chat?document=",
                description: "Return the conversation of a scope as ordered question/answer turns.",
                request_example: None,
            },
            CommandDescriptor {
                name: "clear_chat",
                method: "DELETE",
                path: "/chat?document=",
                description: "Forget the conversation of a scope.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return intake counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

struct AppError(IntakeError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::Configuration => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,
        };
        if status.is_server_error() {
            tracing::warn!(error = %self.0, status = status.as_u16(), "Request failed");
        }
        (status, self.0.to_string()).into_response()
    }
}

impl From<IntakeError> for AppError {
    fn from(inner: IntakeError) -> Self {
        Self(inner)
    }
}
