//! HTTP client for the RAG backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::debug;
use url::Url;

use super::RagBackend;
use super::error::{BackendError, Result};
use super::types::{
    ChatMessage, DocumentRecord, DocumentsResponse, HistoryResponse, QueryRequest, QueryResponse,
    SummaryResponse, UploadFile,
};

/// HTTP client for the backend API.
///
/// # Example
///
/// ```rust,no_run
/// use pdf_chat_assistant::backend::{BackendClient, RagBackend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = BackendClient::new("http://localhost:8000")?;
/// let answer = client.query("What is this document about?").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: Url,
    http: reqwest::Client,
}

impl BackendClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the backend (e.g., "http://localhost:8000")
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(base_url, http)
    }

    /// Create a new client with a custom reqwest client.
    pub fn with_client(base_url: impl AsRef<str>, http: reqwest::Client) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::CannotBeABase(base_url.to_string()));
        }
        Ok(Self { base_url, http })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Append path segments to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::CannotBeABase(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            Err(BackendError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        Ok(Self::check(response).await?.json().await?)
    }
}

#[async_trait]
impl RagBackend for BackendClient {
    async fn upload(&self, file: UploadFile) -> Result<()> {
        debug!(filename = %file.filename, bytes = file.bytes.len(), "Uploading document");
        let part = Part::bytes(file.bytes)
            .file_name(file.filename)
            .mime_str(&file.content_type)?;
        let form = Form::new().part("file", part);
        let response = self
            .http
            .post(self.url(&["upload"])?)
            .multipart(form)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn query(&self, question: &str) -> Result<String> {
        debug!(chars = question.len(), "Sending query");
        let response = self
            .http
            .post(self.url(&["query"])?)
            .json(&QueryRequest { question })
            .send()
            .await?;
        let body: QueryResponse = Self::handle_response(response).await?;
        Ok(body.answer)
    }

    async fn summarize(&self) -> Result<String> {
        let response = self.http.post(self.url(&["summarize"])?).send().await?;
        let body: SummaryResponse = Self::handle_response(response).await?;
        Ok(body.summary)
    }

    async fn history(&self) -> Result<Vec<ChatMessage>> {
        let response = self.http.get(self.url(&["history"])?).send().await?;
        let body: HistoryResponse = Self::handle_response(response).await?;
        Ok(body.history)
    }

    async fn documents(&self) -> Result<Vec<DocumentRecord>> {
        let response = self.http.get(self.url(&["documents"])?).send().await?;
        let body: DocumentsResponse = Self::handle_response(response).await?;
        Ok(body.documents)
    }

    async fn clear(&self) -> Result<()> {
        let response = self.http.delete(self.url(&["clear"])?).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    fn viewer_url(&self, filename: &str) -> Result<String> {
        Ok(self.url(&["static", filename])?.to_string())
    }
}
