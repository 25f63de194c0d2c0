//! In-process stand-in for the RAG backend.
//!
//! Serves the same REST surface on an ephemeral port and records what it
//! receives so tests can assert on the traffic.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Default)]
pub struct Recorded {
    pub uploads: Vec<(String, usize)>,
    pub questions: Vec<String>,
    pub summaries: usize,
    pub clears: usize,
    pub history: Vec<Value>,
    pub documents: Vec<Value>,
    pub fail: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    inner: Arc<Mutex<Recorded>>,
}

impl FakeBackend {
    /// Bind on `127.0.0.1:0` and return the base URL.
    pub async fn spawn(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr: SocketAddr = listener.local_addr().expect("local addr");
        let app = self.router();
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake backend");
        });
        format!("http://{addr}")
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
        f(&mut self.inner.lock().unwrap())
    }

    pub fn set_failing(&self, fail: bool) {
        self.with(|r| r.fail = fail);
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/upload", post(upload))
            .route("/query", post(query))
            .route("/summarize", post(summarize))
            .route("/history", get(history))
            .route("/documents", get(documents))
            .route("/clear", delete(clear))
            .route("/static/{filename}", get(static_file))
            .with_state(self.clone())
    }

    fn failing(&self) -> bool {
        self.with(|r| r.fail)
    }
}

type Failure = (StatusCode, String);

fn fail() -> Failure {
    (StatusCode::INTERNAL_SERVER_ERROR, "backend down".to_string())
}

async fn upload(
    State(backend): State<FakeBackend>,
    mut multipart: Multipart,
) -> Result<Json<Value>, Failure> {
    if backend.failing() {
        return Err(fail());
    }
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.expect("file bytes");
            backend.with(|r| {
                r.uploads.push((filename.clone(), bytes.len()));
                r.documents.push(json!({
                    "filename": filename,
                    "uploadedAt": "2026-10-14T12:00:00Z",
                }));
            });
            return Ok(Json(json!({ "filename": filename, "status": "Indexed" })));
        }
    }
    Err((StatusCode::UNPROCESSABLE_ENTITY, "missing file".to_string()))
}

#[derive(Deserialize)]
struct QueryBody {
    question: String,
}

async fn query(
    State(backend): State<FakeBackend>,
    Json(body): Json<QueryBody>,
) -> Result<Json<Value>, Failure> {
    if backend.failing() {
        return Err(fail());
    }
    backend.with(|r| r.questions.push(body.question.clone()));
    Ok(Json(json!({ "answer": format!("Answer: {}", body.question) })))
}

async fn summarize(State(backend): State<FakeBackend>) -> Result<Json<Value>, Failure> {
    if backend.failing() {
        return Err(fail());
    }
    backend.with(|r| r.summaries += 1);
    Ok(Json(json!({ "summary": "This document is about testing." })))
}

async fn history(State(backend): State<FakeBackend>) -> Result<Json<Value>, Failure> {
    if backend.failing() {
        return Err(fail());
    }
    Ok(Json(json!({ "history": backend.with(|r| r.history.clone()) })))
}

async fn documents(State(backend): State<FakeBackend>) -> Result<Json<Value>, Failure> {
    if backend.failing() {
        return Err(fail());
    }
    Ok(Json(json!({ "documents": backend.with(|r| r.documents.clone()) })))
}

async fn clear(State(backend): State<FakeBackend>) -> Result<Json<Value>, Failure> {
    if backend.failing() {
        return Err(fail());
    }
    backend.with(|r| {
        r.clears += 1;
        r.history.clear();
        r.documents.clear();
        r.uploads.clear();
    });
    Ok(Json(json!({ "status": "cleared" })))
}

async fn static_file(Path(filename): Path<String>) -> Vec<u8> {
    format!("%PDF-1.7 {filename}").into_bytes()
}
