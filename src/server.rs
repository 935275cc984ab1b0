//! HTTP transport shim.
//!
//! Exposes the relay's operations as a JSON API for the onboarding
//! dashboard and the source-side producers (Telegram bot, GitHub webhook
//! forwarder). The handlers are thin: parameter parsing, error mapping,
//! and delegation to the sync core.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/tenants` | Onboard a tenant: create assistant, store credential |
//! | `POST` | `/documents/register` | Register a Drive document for monitoring |
//! | `POST` | `/documents/sync` | Trigger one immediate sync |
//! | `GET`  | `/documents` | List a tenant's registered documents |
//! | `POST` | `/polling/start` | Start the background poll loop for a tenant |
//! | `POST` | `/github/push` | Ingest a push event's changed files |
//! | `POST` | `/chats` | Relay a group-chat message to the assistant |
//! | `GET`  | `/events` | Server-sent ingestion events |
//! | `GET`  | `/status` | Connection summary for a tenant |
//!
//! # Error Contract
//!
//! Every error response is `{ "error": { "code": ..., "message": ... } }`.
//! Sync aborts map to distinct codes (`not_registered`,
//! `source_inaccessible`, `indexing_timeout`, ...) so callers can react
//! without parsing messages.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support the
//! browser-based dashboard.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::drive::extract_file_id;
use crate::encryption;
use crate::events::{EventBus, EventSource};
use crate::github::{GithubIngestor, PushEvent};
use crate::memory::MemoryBackend;
use crate::models::{ChatMessage, PollSession, RegisterOutcome};
use crate::poller;
use crate::registry;
use crate::sync::{resolve_tenant, SyncEngine, SyncError};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pool: SqlitePool,
    engine: Arc<SyncEngine>,
    backend: Arc<dyn MemoryBackend>,
    github: Arc<GithubIngestor>,
    events: EventBus,
    default_poll_interval: Duration,
}

/// Starts the relay HTTP server. Runs until the process is terminated.
pub async fn run_server(
    config: &Config,
    pool: SqlitePool,
    engine: Arc<SyncEngine>,
    backend: Arc<dyn MemoryBackend>,
    github: Arc<GithubIngestor>,
    events: EventBus,
) -> anyhow::Result<()> {
    let state = AppState {
        pool,
        engine,
        backend,
        github,
        events,
        default_poll_interval: config.poller.interval(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/tenants", post(handle_create_tenant))
        .route("/documents/register", post(handle_register))
        .route("/documents/sync", post(handle_sync))
        .route("/documents", get(handle_list_documents))
        .route("/polling/start", post(handle_start_polling))
        .route("/github/push", post(handle_push))
        .route("/chats", post(handle_chat))
        .route("/events", get(handle_events))
        .route("/status", get(handle_status))
        .layer(cors)
        .with_state(state);

    info!(bind = %config.server.bind, "relay server listening");

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

/// Every sync-core abort gets its own code so the dashboard can explain
/// what went wrong without string matching.
impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        let (status, code) = match &err {
            SyncError::Inaccessible { .. } => (StatusCode::BAD_GATEWAY, "source_inaccessible"),
            SyncError::Unreadable { .. } => (StatusCode::BAD_GATEWAY, "source_unreadable"),
            SyncError::NotRegistered(_) => (StatusCode::NOT_FOUND, "not_registered"),
            SyncError::TenantNotFound(_) => (StatusCode::NOT_FOUND, "tenant_not_found"),
            SyncError::MissingCredential { .. } => (StatusCode::CONFLICT, "missing_credential"),
            SyncError::MissingAssistant(_) => (StatusCode::CONFLICT, "missing_assistant"),
            SyncError::UploadRejected(_) => (StatusCode::BAD_GATEWAY, "upload_rejected"),
            SyncError::IndexingFailed(_) => (StatusCode::BAD_GATEWAY, "indexing_failed"),
            SyncError::IndexingTimedOut(_) => (StatusCode::REQUEST_TIMEOUT, "indexing_timeout"),
            SyncError::InFlight(_) => (StatusCode::CONFLICT, "sync_in_flight"),
            SyncError::Registry(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError::new(status, code, err.to_string())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /tenants ============

#[derive(Deserialize)]
struct CreateTenantRequest {
    tenant_id: String,
    api_key: String,
}

#[derive(Serialize)]
struct CreateTenantResponse {
    status: String,
    tenant_id: String,
    assistant_id: String,
}

async fn handle_create_tenant(
    State(state): State<AppState>,
    Json(request): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<CreateTenantResponse>), AppError> {
    if registry::lookup_tenant(&state.pool, &request.tenant_id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .is_some()
    {
        return Err(AppError::new(
            StatusCode::CONFLICT,
            "tenant_exists",
            "Tenant already exists",
        ));
    }

    let assistant_id = state
        .backend
        .create_assistant(
            &request.api_key,
            "Onboarding Assistant",
            "An assistant designed to understand your team's onboarding context",
        )
        .await
        .map_err(|e| AppError::new(StatusCode::BAD_GATEWAY, "backend_unavailable", e.to_string()))?;

    let encrypted = encryption::encrypt_credential(&request.api_key)
        .map_err(|e| internal(e.to_string()))?;
    registry::insert_tenant(&state.pool, &request.tenant_id, &encrypted, &assistant_id)
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(CreateTenantResponse {
            status: "created".to_string(),
            tenant_id: request.tenant_id,
            assistant_id,
        }),
    ))
}

// ============ POST /documents/register ============

#[derive(Deserialize)]
struct RegisterRequest {
    tenant_id: String,
    /// A bare Drive file id or a full Drive URL.
    document: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    status: String,
    document_id: String,
}

async fn handle_register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    let document_id = if request.document.contains("http") {
        extract_file_id(&request.document)
            .ok_or_else(|| bad_request("Invalid Drive URL or file id"))?
    } else {
        request.document.clone()
    };

    let outcome = state
        .engine
        .register_document(&document_id, &request.tenant_id)
        .await?;

    let status = match outcome {
        RegisterOutcome::Registered { .. } => "registered",
        RegisterOutcome::AlreadyRegistered => "already_registered",
    };
    Ok(Json(RegisterResponse {
        status: status.to_string(),
        document_id,
    }))
}

// ============ POST /documents/sync ============

#[derive(Deserialize)]
struct SyncRequest {
    tenant_id: String,
    document_id: String,
}

#[derive(Serialize)]
struct SyncResponse {
    status: String,
    document_id: String,
    outcome: crate::models::SyncOutcome,
}

async fn handle_sync(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, AppError> {
    let outcome = state
        .engine
        .sync_document(&request.document_id, &request.tenant_id)
        .await?;

    Ok(Json(SyncResponse {
        status: "processed".to_string(),
        document_id: request.document_id,
        outcome,
    }))
}

// ============ GET /documents ============

#[derive(Deserialize)]
struct TenantQuery {
    tenant_id: String,
}

#[derive(Serialize)]
struct DocumentView {
    document_id: String,
    display_name: String,
    synced: bool,
    last_modified: String,
    updated_at: i64,
}

#[derive(Serialize)]
struct DocumentListResponse {
    tenant_id: String,
    document_count: usize,
    documents: Vec<DocumentView>,
}

async fn handle_list_documents(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<DocumentListResponse>, AppError> {
    if registry::lookup_tenant(&state.pool, &query.tenant_id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .is_none()
    {
        return Err(SyncError::TenantNotFound(query.tenant_id).into());
    }

    let documents = registry::list_documents(&state.pool, &query.tenant_id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .into_iter()
        .map(|record| DocumentView {
            synced: !record.fingerprint.is_empty(),
            document_id: record.document_id,
            display_name: record.display_name,
            last_modified: record.last_modified,
            updated_at: record.updated_at,
        })
        .collect::<Vec<_>>();

    Ok(Json(DocumentListResponse {
        tenant_id: query.tenant_id,
        document_count: documents.len(),
        documents,
    }))
}

// ============ POST /polling/start ============

#[derive(Deserialize)]
struct StartPollingRequest {
    tenant_id: String,
    interval_secs: Option<u64>,
}

#[derive(Serialize)]
struct StartPollingResponse {
    status: String,
    tenant_id: String,
    document_count: usize,
    interval_secs: u64,
}

async fn handle_start_polling(
    State(state): State<AppState>,
    Json(request): Json<StartPollingRequest>,
) -> Result<Json<StartPollingResponse>, AppError> {
    if registry::lookup_tenant(&state.pool, &request.tenant_id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .is_none()
    {
        return Err(SyncError::TenantNotFound(request.tenant_id).into());
    }

    let documents = registry::list_documents(&state.pool, &request.tenant_id)
        .await
        .map_err(|e| internal(e.to_string()))?;
    if documents.is_empty() {
        return Err(AppError::new(
            StatusCode::NOT_FOUND,
            "no_documents",
            "No documents registered for this tenant. Register documents first.",
        ));
    }

    let interval = request
        .interval_secs
        .map(Duration::from_secs)
        .unwrap_or(state.default_poll_interval);
    let session = PollSession {
        tenant_id: request.tenant_id.clone(),
        document_ids: documents.iter().map(|d| d.document_id.clone()).collect(),
        interval,
    };
    let document_count = session.document_ids.len();

    // Detached: the loop outlives this request and stops only with the
    // process.
    poller::start_polling(state.engine.clone(), session);

    Ok(Json(StartPollingResponse {
        status: "polling_started".to_string(),
        tenant_id: request.tenant_id,
        document_count,
        interval_secs: interval.as_secs(),
    }))
}

// ============ POST /github/push ============

#[derive(Serialize)]
struct PushResponse {
    status: String,
    ingested: Vec<String>,
    skipped: Vec<String>,
    failed: Vec<String>,
}

async fn handle_push(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
    Json(event): Json<PushEvent>,
) -> Result<Json<PushResponse>, AppError> {
    if event.owner_name().is_none() {
        return Err(bad_request("Push payload has no repository owner"));
    }

    let result = state
        .github
        .ingest_push(&state.pool, state.backend.as_ref(), &query.tenant_id, &event)
        .await?;

    let status = if result.is_ignored() {
        "ignored"
    } else {
        state.events.emit(EventSource::Repo, Some(&query.tenant_id));
        "ingested"
    };
    Ok(Json(PushResponse {
        status: status.to_string(),
        ingested: result.ingested,
        skipped: result.skipped,
        failed: result.failed,
    }))
}

// ============ POST /chats ============

#[derive(Deserialize)]
struct ChatRequest {
    tenant_id: String,
    #[serde(flatten)]
    message: ChatMessage,
}

#[derive(Serialize)]
struct ChatResponse {
    status: String,
    reply: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let (api_key, assistant_id) = resolve_tenant(&state.pool, &request.tenant_id).await?;

    registry::insert_chat(&state.pool, &request.tenant_id, &request.message)
        .await
        .map_err(|e| internal(e.to_string()))?;

    let content = format!("{}: {}", request.message.sender, request.message.body);
    let reply = state
        .backend
        .send_message(&api_key, &assistant_id, &content)
        .await
        .map_err(|e| AppError::new(StatusCode::BAD_GATEWAY, "backend_unavailable", e.to_string()))?;

    state
        .events
        .emit(EventSource::Telegram, Some(&request.tenant_id));

    Ok(Json(ChatResponse {
        status: "relayed".to_string(),
        reply,
    }))
}

// ============ GET /events ============

async fn handle_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = state.events.subscribe();
    let stream = BroadcastStream::new(receiver)
        .filter_map(|event| event.ok())
        .map(|event| {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Ok::<SseEvent, Infallible>(SseEvent::default().data(data))
        });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ============ GET /status ============

#[derive(Serialize)]
struct StatusResponse {
    tenant: TenantStatus,
    drive: DriveStatus,
    telegram: TelegramStatus,
}

#[derive(Serialize)]
struct TenantStatus {
    id: String,
    exists: bool,
    has_assistant: bool,
}

#[derive(Serialize)]
struct DriveStatus {
    connected: bool,
    document_count: usize,
    last_updated: Option<i64>,
}

#[derive(Serialize)]
struct TelegramStatus {
    connected: bool,
    message_count: i64,
}

async fn handle_status(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<StatusResponse>, AppError> {
    let tenant = registry::lookup_tenant(&state.pool, &query.tenant_id)
        .await
        .map_err(|e| internal(e.to_string()))?;
    let documents = registry::list_documents(&state.pool, &query.tenant_id)
        .await
        .map_err(|e| internal(e.to_string()))?;
    let chat_count = registry::count_chats(&state.pool, &query.tenant_id)
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(StatusResponse {
        tenant: TenantStatus {
            id: query.tenant_id,
            has_assistant: tenant
                .as_ref()
                .map(|t| !t.assistant_id.is_empty())
                .unwrap_or(false),
            exists: tenant.is_some(),
        },
        drive: DriveStatus {
            connected: !documents.is_empty(),
            document_count: documents.len(),
            last_updated: documents.iter().map(|d| d.updated_at).max(),
        },
        telegram: TelegramStatus {
            connected: chat_count > 0,
            message_count: chat_count,
        },
    }))
}
