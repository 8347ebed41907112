use agent_flow::{GraphError, InMemorySessionStorage, Session, TurnInput, TurnResult, TurnRunner};
use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    extraction::PdfTextExtractor,
    llm::OpenAiCompatibleModel,
    models::{ChatTurnRequest, ChatTurnResponse, SessionView},
    workflow::{
        MedicalAgents, awaiting_report_upload, build_medical_workflow, create_turn_runner,
        report_path, report_turn_input,
    },
};

const MAX_REPORT_BYTES: usize = 20 * 1024 * 1024;

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn conflict_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn graph_error(session_id: &str, e: GraphError) -> ApiError {
    match e {
        GraphError::SessionNotFound(_) => not_found_error("Session not found", session_id),
        other => {
            error!(session_id = %session_id, error = %other, "Failed to process turn");
            internal_error("Failed to process turn", &other.to_string())
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub runner: TurnRunner,
    pub upload_dir: PathBuf,
}

pub fn create_app(config: &AppConfig) -> anyhow::Result<Router> {
    let model = Arc::new(OpenAiCompatibleModel::from_config(config)?);
    let agents = MedicalAgents::from_model(model, Arc::new(PdfTextExtractor));
    let runner = create_turn_runner(
        build_medical_workflow(agents),
        Arc::new(InMemorySessionStorage::new()),
    );

    Ok(build_router(AppState {
        runner,
        upload_dir: config.upload_dir.clone(),
    }))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/chat/{session_id}", get(get_session).delete(delete_session))
        .route("/chat/{session_id}/report", post(upload_report))
        .route("/chat/{session_id}/reset", post(reset_session))
        .layer(DefaultBodyLimit::max(MAX_REPORT_BYTES))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Tags every request with an `x-correlation-id` and runs it inside a span carrying that id
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Medical Diagnosis Chatbot",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Routes medical questions to a blood report parser or a diagnoser agent",
        "endpoints": {
            "POST /chat": "Send a message, optionally continuing a session",
            "POST /chat/{session_id}/report": "Upload the requested blood report (multipart field 'file')",
            "GET /chat/{session_id}": "Get the conversation history",
            "POST /chat/{session_id}/reset": "Restart the conversation",
            "DELETE /chat/{session_id}": "End the conversation and remove its uploaded report",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatTurnRequest>,
) -> ApiResult<ChatTurnResponse> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(bad_request_error("Message content is required"));
    }

    let session_id = match request.session_id {
        Some(id) => id,
        None => {
            state
                .runner
                .create_session()
                .await
                .map_err(|e| internal_error("Failed to create session", &e.to_string()))?
                .id
        }
    };

    info!(session_id = %session_id, content_length = content.len(), "Processing chat turn");

    let result = state
        .runner
        .run(&session_id, TurnInput::new(content))
        .await
        .map_err(|e| graph_error(&session_id, e))?;

    respond(&state, &session_id, &result).await
}

async fn upload_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<ChatTurnResponse> {
    // held from the gate check until the turn is recorded, so concurrent
    // uploads to one session cannot both pass the check
    let guard = state.runner.begin_turn(&session_id).await;
    let session = state
        .runner
        .session(&guard)
        .await
        .map_err(|e| graph_error(&session_id, e))?;
    if !awaiting_report_upload(&session) {
        return Err(conflict_error(
            "No blood report has been requested in this session",
            &session_id,
        ));
    }

    let bytes = read_report_field(&mut multipart).await?;
    let path = save_report(&state.upload_dir, &session.id, &bytes)
        .await
        .map_err(|e| {
            error!(session_id = %session_id, error = %e, "Failed to store uploaded report");
            internal_error("Failed to store uploaded report", &e.to_string())
        })?;

    info!(session_id = %session_id, path = %path.display(), bytes = bytes.len(), "Blood report uploaded");

    let result = state
        .runner
        .run_with(&guard, report_turn_input(&path))
        .await
        .map_err(|e| graph_error(&session_id, e))?;
    drop(guard);

    respond(&state, &session_id, &result).await
}

async fn read_report_field(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request_error(&format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            return field
                .bytes()
                .await
                .map_err(|e| bad_request_error(&format!("Failed to read uploaded file: {}", e)));
        }
    }
    Err(bad_request_error("Multipart field 'file' is required"))
}

/// Write the uploaded report to the session's report path, replacing any previous one.
/// `session_id` must be the id of a stored session, never raw request input.
pub async fn save_report(
    upload_dir: &FsPath,
    session_id: &str,
    bytes: &[u8],
) -> std::io::Result<PathBuf> {
    let path = report_path(upload_dir, session_id);
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionView> {
    let session = load_session(&state, &session_id).await?;
    Ok(Json(session.into()))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionView> {
    let session = state
        .runner
        .reset(&session_id)
        .await
        .map_err(|e| graph_error(&session_id, e))?;
    Ok(Json(session.into()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    state
        .runner
        .remove_session(&session_id)
        .await
        .map_err(|e| graph_error(&session_id, e))?;

    let session_dir = state.upload_dir.join(&session_id);
    match tokio::fs::remove_dir_all(&session_dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to remove uploaded report");
        }
    }

    Ok(Json(json!({
        "session_id": session_id,
        "status": "deleted"
    })))
}

async fn load_session(state: &AppState, session_id: &str) -> Result<Session, ApiError> {
    match state.runner.storage().get(session_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found_error("Session not found", session_id)),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to load session");
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}

async fn respond(
    state: &AppState,
    session_id: &str,
    result: &TurnResult,
) -> ApiResult<ChatTurnResponse> {
    let session = load_session(state, session_id).await?;
    Ok(Json(ChatTurnResponse::new(&session, result)))
}
