use std::sync::Arc;
use std::time::Duration;

use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::AppState;
use crate::assistant::{Assistant, AssistantError};
use crate::backend::{BackendClient, RagBackend, UploadFile};
use crate::config::AppConfig;
use crate::session::{Workspace, WorkspaceSnapshot, WorkspaceStore};
use crate::speech::{self, SpeechError, SpeechStatus};
use crate::ui::conversation::render_speech_status;
use crate::ui::{PageView, render_page, render_workspace};

type ApiError = (StatusCode, String);

/// Build the shared state with the HTTP backend client described by `config`.
pub fn build_state(config: Arc<AppConfig>) -> anyhow::Result<AppState> {
    let backend: Arc<dyn RagBackend> = Arc::new(BackendClient::with_timeout(
        &config.backend.base_url,
        config.backend.timeout(),
    )?);
    Ok(AppState {
        assistant: Arc::new(Assistant::new(backend, config.assistant.clone())),
        workspaces: WorkspaceStore::new(),
        speech: speech::player_from_config(&config.speech),
        config,
    })
}

/// All routes served by the application.
pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.upload.max_bytes;
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/upload", post(api_upload))
        .route("/api/ask", post(api_ask))
        .route("/api/summary", post(api_summary))
        .route("/api/reset", post(api_reset))
        .route("/api/clear", post(api_clear))
        .route("/api/documents/select", post(api_select_document))
        .route("/api/speak", post(api_speak))
        .route("/api/speak/stop", post(api_speak_stop))
        .route("/api/speech/status", get(api_speech_status))
        .route("/api/workspace/{id}", get(api_get_workspace))
        .nest_service("/static", ServeDir::new("static"))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    info!(
        name: "backend.config.loaded",
        base_url = %config.backend.base_url,
        summary_mode = ?config.assistant.summary_mode,
        speech = config.speech.enabled,
        "Backend configuration loaded"
    );

    let state = build_state(Arc::clone(&config))?;

    // Drop idle workspaces
    let workspaces = state.workspaces.clone();
    let ttl = Duration::from_secs(config.server.workspace_ttl_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let removed = workspaces.cleanup_expired_with_timeout(ttl);
            if removed > 0 {
                debug!(name: "workspace.expired", removed, "Expired idle workspaces");
            }
        }
    });

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

fn page_location(id: &str) -> String {
    format!("/?session={id}")
}

fn lookup(state: &AppState, id: &str) -> Result<Workspace, ApiError> {
    state
        .workspaces
        .get(id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown workspace: {id}")))
}

fn view_html(state: &AppState, snapshot: &WorkspaceSnapshot, full_page: bool) -> Html<String> {
    let view = PageView {
        workspace: snapshot,
        speech: state.speech.status(),
        speech_enabled: state.speech.is_enabled(),
    };
    if full_page {
        Html(render_page(&view))
    } else {
        Html(render_workspace(&view))
    }
}

/// HTMX gets the re-rendered workspace; plain form posts go back to the page.
fn respond(state: &AppState, headers: &HeaderMap, workspace: &Workspace) -> Response {
    if is_htmx(headers) {
        view_html(state, &workspace.snapshot(), false).into_response()
    } else {
        Redirect::to(&page_location(workspace.id())).into_response()
    }
}

fn respond_speech(state: &AppState, headers: &HeaderMap, workspace: &Workspace) -> Response {
    if is_htmx(headers) {
        Html(render_speech_status(
            workspace.id(),
            state.speech.status(),
            state.speech.is_enabled(),
        ))
        .into_response()
    } else {
        Redirect::to(&page_location(workspace.id())).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Page Handlers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    session: Option<String>,
}

/// GET / - Render the workspace, creating one if needed.
async fn index_handler(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Response {
    let Some(workspace) = query.session.as_deref().and_then(|id| state.workspaces.get(id)) else {
        let workspace = state.workspaces.create();
        info!(name: "workspace.created", workspace = %workspace.id(), "Workspace created");
        return Redirect::to(&page_location(workspace.id())).into_response();
    };

    state.assistant.load(&workspace).await;
    view_html(&state, &workspace.snapshot(), true).into_response()
}

/// GET /health
async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SessionForm {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct AskForm {
    session_id: String,
    #[serde(default)]
    question: String,
}

#[derive(Debug, Deserialize)]
struct SelectForm {
    session_id: String,
    filename: String,
}

#[derive(Debug, Deserialize)]
struct SpeakForm {
    session_id: String,
    index: usize,
}

/// POST /api/upload - Multipart `session_id` + `file`.
async fn api_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut session_id = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart field: {e}"),
        )
    })? {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("session_id") => {
                let text = field.text().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Invalid session_id: {e}"))
                })?;
                session_id = Some(text);
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(ToString::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Failed to read file: {e}"))
                })?;
                file = Some(UploadFile::new(filename, content_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let session_id =
        session_id.ok_or_else(|| (StatusCode::BAD_REQUEST, "Missing session_id".to_string()))?;
    let workspace = lookup(&state, &session_id)?;
    let file = file
        .filter(|f| !f.filename.trim().is_empty() && !f.bytes.is_empty())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "No file selected".to_string()))?;

    state.assistant.upload(&workspace, file).await;
    Ok(respond(&state, &headers, &workspace))
}

/// POST /api/ask
async fn api_ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<AskForm>,
) -> Result<Response, ApiError> {
    let workspace = lookup(&state, &form.session_id)?;
    state.assistant.ask(&workspace, &form.question).await;
    Ok(respond(&state, &headers, &workspace))
}

/// POST /api/summary
async fn api_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SessionForm>,
) -> Result<Response, ApiError> {
    let workspace = lookup(&state, &form.session_id)?;
    state.assistant.summarize(&workspace).await;
    Ok(respond(&state, &headers, &workspace))
}

/// POST /api/reset
async fn api_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SessionForm>,
) -> Result<Response, ApiError> {
    let workspace = lookup(&state, &form.session_id)?;
    state.assistant.reset(&workspace);
    Ok(respond(&state, &headers, &workspace))
}

/// POST /api/clear
async fn api_clear(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SessionForm>,
) -> Result<Response, ApiError> {
    let workspace = lookup(&state, &form.session_id)?;
    state.assistant.clear(&workspace).await;
    Ok(respond(&state, &headers, &workspace))
}

/// POST /api/documents/select
async fn api_select_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SelectForm>,
) -> Result<Response, ApiError> {
    let workspace = lookup(&state, &form.session_id)?;
    match state.assistant.select_document(&workspace, &form.filename) {
        Ok(_) => Ok(respond(&state, &headers, &workspace)),
        Err(e @ AssistantError::UnknownDocument(_)) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(e @ AssistantError::Backend(_)) => Err((StatusCode::BAD_GATEWAY, e.to_string())),
    }
}

/// POST /api/speak - Read message `index` aloud.
async fn api_speak(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SpeakForm>,
) -> Result<Response, ApiError> {
    let workspace = lookup(&state, &form.session_id)?;
    let message = workspace
        .message(form.index)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("No message at {}", form.index)))?;

    match state.speech.speak(message.text) {
        Ok(utterance) => {
            debug!(name: "speech.started", ?utterance, "Speech started");
            Ok(respond_speech(&state, &headers, &workspace))
        }
        Err(e @ SpeechError::Disabled) => Err((StatusCode::SERVICE_UNAVAILABLE, e.to_string())),
        Err(e) => Err((StatusCode::BAD_REQUEST, e.to_string())),
    }
}

/// POST /api/speak/stop
async fn api_speak_stop(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SessionForm>,
) -> Result<Response, ApiError> {
    let workspace = lookup(&state, &form.session_id)?;
    state.speech.stop();
    Ok(respond_speech(&state, &headers, &workspace))
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session_id: String,
}

/// GET /api/speech/status - Speech indicator fragment.
async fn api_speech_status(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Html<String>, ApiError> {
    let workspace = lookup(&state, &query.session_id)?;
    Ok(Html(render_speech_status(
        workspace.id(),
        state.speech.status(),
        state.speech.is_enabled(),
    )))
}

/// Workspace DTO for API responses.
#[derive(Debug, Serialize)]
struct WorkspaceDto {
    #[serde(flatten)]
    workspace: WorkspaceSnapshot,
    speech: SpeechStatus,
}

/// GET /api/workspace/{id} - JSON snapshot.
async fn api_get_workspace(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkspaceDto>, ApiError> {
    let workspace = lookup(&state, &id)?;
    Ok(Json(WorkspaceDto {
        workspace: workspace.snapshot(),
        speech: state.speech.status(),
    }))
}
