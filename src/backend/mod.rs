//! RAG backend client.
//!
//! All document parsing, retrieval and answer generation happens in an
//! external service. This module exposes the [`RagBackend`] seam the
//! assistant flows are written against, plus the HTTP implementation.
//!
//! # Architecture
//!
//! - [`RagBackend`]: The operations the UI needs from the backend
//! - [`BackendClient`]: `reqwest` implementation of the REST API
//! - [`types`]: Wire types (`ChatMessage`, `DocumentRecord`, ...)

mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

pub use client::BackendClient;
pub use error::BackendError;
pub use types::{ChatMessage, DocumentRecord, Role, UploadFile};

/// Operations consumed from the RAG backend.
#[async_trait]
pub trait RagBackend: Send + Sync {
    /// `POST /upload` with the file as a multipart body.
    async fn upload(&self, file: UploadFile) -> error::Result<()>;

    /// `POST /query` and return the answer text.
    async fn query(&self, question: &str) -> error::Result<String>;

    /// `POST /summarize` and return the summary text.
    async fn summarize(&self) -> error::Result<String>;

    /// `GET /history`.
    async fn history(&self) -> error::Result<Vec<ChatMessage>>;

    /// `GET /documents`.
    async fn documents(&self) -> error::Result<Vec<DocumentRecord>>;

    /// `DELETE /clear`: drops all server-side history and files.
    async fn clear(&self) -> error::Result<()>;

    /// URL under which the backend serves an uploaded file.
    fn viewer_url(&self, filename: &str) -> error::Result<String>;
}
