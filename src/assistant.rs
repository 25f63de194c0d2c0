//! Upload, question, summary and history flows.
//!
//! Every flow degrades backend failures to an assistant-authored chat
//! message; none of them fail the request that triggered it.
//!
//! Network-bound flows take the workspace action lock, so overlapping
//! requests from one browser resolve in the order they were issued. A
//! local reset moves the workspace to a new epoch and any result from an
//! earlier epoch is dropped.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{BackendError, ChatMessage, RagBackend, UploadFile};
use crate::config::{AssistantConfig, SummaryMode};
use crate::session::{Activity, Workspace};

/// Prompt sent through `/query` for the summary action.
pub const SUMMARY_PROMPT: &str =
    "Generate a structured summary of this document in 5 key bullet points. Keep it concise.";

/// What the conversation shows in place of [`SUMMARY_PROMPT`].
pub const SUMMARY_LABEL: &str = "✨ Generating Document Summary...";

pub const UPLOAD_FAILED: &str = "Error uploading file. Check Backend connection.";
pub const QUERY_FAILED: &str = "Error: Could not get answer.";
pub const CLEAR_FAILED: &str = "Error: Could not clear history.";

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Unknown document: {0}")]
    UnknownDocument(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result of a question or summary request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskOutcome {
    /// Blank input; nothing was sent.
    Ignored,
    Answered,
    /// The backend failed and an error message was appended.
    Failed,
    /// A reset happened while the request was pending.
    Discarded,
}

/// Result of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { viewer_url: String },
    Failed,
    Discarded,
}

enum Request<'a> {
    Question(&'a str),
    Summary,
}

/// Drives the backend on behalf of a workspace.
#[derive(Clone)]
pub struct Assistant {
    backend: Arc<dyn RagBackend>,
    settings: AssistantConfig,
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Assistant {
    pub fn new(backend: Arc<dyn RagBackend>, settings: AssistantConfig) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &AssistantConfig {
        &self.settings
    }

    /// Fetch history and documents for a workspace that has not been loaded.
    ///
    /// Empty or unavailable history falls back to the greeting.
    pub async fn load(&self, workspace: &Workspace) {
        if workspace.is_loaded() {
            return;
        }
        let _turn = workspace.begin_action().await;
        if workspace.is_loaded() {
            return;
        }
        let epoch = workspace.epoch();

        let history = self.backend.history().await.unwrap_or_else(|e| {
            warn!(name: "backend.history.failed", error = %e, "Could not fetch history");
            Vec::new()
        });
        let documents = self.backend.documents().await.unwrap_or_else(|e| {
            warn!(name: "backend.documents.failed", error = %e, "Could not fetch documents");
            Vec::new()
        });

        let greeting = &self.settings.greeting;
        workspace.update(|state| {
            state.loaded = true;
            if state.epoch() == epoch {
                state.messages = if history.is_empty() {
                    vec![ChatMessage::assistant(greeting.as_str())]
                } else {
                    history
                };
                state.documents = documents;
            }
        });
    }

    /// Send a file to the backend and open it in the viewer.
    pub async fn upload(&self, workspace: &Workspace, file: UploadFile) -> UploadOutcome {
        let epoch = workspace.epoch();
        let _busy = workspace.track(Activity::Upload);
        let _turn = workspace.begin_action().await;

        let filename = file.filename.clone();
        let result = match self.backend.upload(file).await {
            Ok(()) => self.backend.viewer_url(&filename),
            Err(e) => Err(e),
        };

        match result {
            Ok(viewer_url) => {
                info!(name: "document.uploaded", filename = %filename, "Document uploaded");
                let applied = workspace.update_if_current(epoch, |state| {
                    state.open_document(filename.as_str(), viewer_url.as_str());
                    state.push(ChatMessage::assistant(format!(
                        "I've read {filename}. Ask me anything!"
                    )));
                });
                // The backend stored the file even if a reset hid it.
                self.refresh_documents(workspace).await;
                match applied {
                    Some(()) => UploadOutcome::Uploaded { viewer_url },
                    None => UploadOutcome::Discarded,
                }
            }
            Err(e) => {
                warn!(name: "backend.upload.failed", filename = %filename, error = %e, "Upload failed");
                match workspace.update_if_current(epoch, |state| {
                    state.push(ChatMessage::assistant(UPLOAD_FAILED));
                }) {
                    Some(()) => UploadOutcome::Failed,
                    None => UploadOutcome::Discarded,
                }
            }
        }
    }

    /// Ask a free-text question.
    ///
    /// The text is shown and sent as typed; whitespace-only input is ignored.
    pub async fn ask(&self, workspace: &Workspace, question: &str) -> AskOutcome {
        if question.trim().is_empty() {
            return AskOutcome::Ignored;
        }
        self.converse(workspace, ChatMessage::user(question), Request::Question(question))
            .await
    }

    /// Ask for a summary of the active document.
    pub async fn summarize(&self, workspace: &Workspace) -> AskOutcome {
        let request = match self.settings.summary_mode {
            SummaryMode::Query => Request::Question(SUMMARY_PROMPT),
            SummaryMode::Endpoint => Request::Summary,
        };
        self.converse(workspace, ChatMessage::user(SUMMARY_LABEL), request)
            .await
    }

    async fn converse(
        &self,
        workspace: &Workspace,
        shown: ChatMessage,
        request: Request<'_>,
    ) -> AskOutcome {
        let epoch = workspace.epoch();
        let _busy = workspace.track(Activity::Query);
        let _turn = workspace.begin_action().await;

        if workspace
            .update_if_current(epoch, |state| state.push(shown))
            .is_none()
        {
            return AskOutcome::Discarded;
        }

        let result = match request {
            Request::Question(question) => self.backend.query(question).await,
            Request::Summary => self.backend.summarize().await,
        };
        let (reply, outcome) = match result {
            Ok(answer) => (answer, AskOutcome::Answered),
            Err(e) => {
                warn!(name: "backend.query.failed", error = %e, "Query failed");
                (QUERY_FAILED.to_string(), AskOutcome::Failed)
            }
        };

        workspace
            .update_if_current(epoch, |state| state.push(ChatMessage::assistant(reply)))
            .map_or(AskOutcome::Discarded, |()| outcome)
    }

    /// Forget the current document and conversation locally.
    pub fn reset(&self, workspace: &Workspace) {
        workspace.update(|state| state.reset(&self.settings.reset_greeting));
    }

    /// Delete all server-side history and files.
    ///
    /// Returns whether the backend accepted the request.
    pub async fn clear(&self, workspace: &Workspace) -> bool {
        let epoch = workspace.epoch();
        let _turn = workspace.begin_action().await;

        match self.backend.clear().await {
            Ok(()) => {
                info!(name: "history.cleared", workspace = %workspace.id(), "History cleared");
                workspace.update(|state| {
                    state.reset(&self.settings.greeting);
                    state.documents.clear();
                });
                true
            }
            Err(e) => {
                warn!(name: "backend.clear.failed", error = %e, "Clear failed");
                workspace.update_if_current(epoch, |state| {
                    state.push(ChatMessage::assistant(CLEAR_FAILED));
                });
                false
            }
        }
    }

    /// Open a previously uploaded document in the viewer.
    pub fn select_document(
        &self,
        workspace: &Workspace,
        filename: &str,
    ) -> Result<String, AssistantError> {
        if !workspace.documents().iter().any(|d| d.filename == filename) {
            return Err(AssistantError::UnknownDocument(filename.to_string()));
        }
        let viewer_url = self.backend.viewer_url(filename)?;
        workspace.update(|state| state.open_document(filename, viewer_url.as_str()));
        Ok(viewer_url)
    }

    async fn refresh_documents(&self, workspace: &Workspace) {
        match self.backend.documents().await {
            Ok(documents) => workspace.update(|state| state.documents = documents),
            Err(e) => {
                warn!(name: "backend.documents.failed", error = %e, "Could not refresh documents");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::backend::error::Result;
    use crate::backend::{DocumentRecord, Role};
    use crate::session::WorkspaceStore;

    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<String>>,
        history: Vec<ChatMessage>,
        documents: Mutex<Vec<DocumentRecord>>,
        fail: bool,
        delays: HashMap<String, Duration>,
    }

    impl FakeBackend {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn record(&self, call: impl Into<String>) -> Result<()> {
            self.calls.lock().unwrap().push(call.into());
            if self.fail {
                Err(BackendError::Api {
                    status: 500,
                    message: "boom".into(),
                })
            } else {
                Ok(())
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RagBackend for FakeBackend {
        async fn upload(&self, file: UploadFile) -> Result<()> {
            if let Some(delay) = self.delays.get(&file.filename) {
                tokio::time::sleep(*delay).await;
            }
            self.record(format!("upload {}", file.filename))?;
            self.documents.lock().unwrap().push(DocumentRecord {
                filename: file.filename,
                uploaded_at: Utc::now(),
            });
            Ok(())
        }

        async fn query(&self, question: &str) -> Result<String> {
            if let Some(delay) = self.delays.get(question) {
                tokio::time::sleep(*delay).await;
            }
            self.record(format!("query {question}"))?;
            Ok(format!("answer to {question}"))
        }

        async fn summarize(&self) -> Result<String> {
            self.record("summarize")?;
            Ok("This document is about testing.".into())
        }

        async fn history(&self) -> Result<Vec<ChatMessage>> {
            self.record("history")?;
            Ok(self.history.clone())
        }

        async fn documents(&self) -> Result<Vec<DocumentRecord>> {
            self.record("documents")?;
            Ok(self.documents.lock().unwrap().clone())
        }

        async fn clear(&self) -> Result<()> {
            self.record("clear")?;
            self.documents.lock().unwrap().clear();
            Ok(())
        }

        fn viewer_url(&self, filename: &str) -> Result<String> {
            Ok(format!("http://backend.test/static/{filename}"))
        }
    }

    fn assistant_with(backend: &Arc<FakeBackend>) -> Assistant {
        let backend: Arc<dyn RagBackend> = backend.clone();
        Assistant::new(backend, AssistantConfig::default())
    }

    fn pdf(name: &str) -> UploadFile {
        UploadFile::new(name, None, b"%PDF-1.7".to_vec())
    }

    #[tokio::test]
    async fn test_upload_opens_viewer_and_confirms() {
        let backend = Arc::new(FakeBackend::default());
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();

        let outcome = assistant.upload(&workspace, pdf("x.pdf")).await;

        let UploadOutcome::Uploaded { viewer_url } = outcome else {
            panic!("expected upload to succeed, got {outcome:?}");
        };
        assert!(viewer_url.ends_with("/static/x.pdf"));

        let snapshot = workspace.snapshot();
        assert_eq!(snapshot.viewer_url.as_deref(), Some(viewer_url.as_str()));
        assert_eq!(snapshot.current_file.as_deref(), Some("x.pdf"));
        assert_eq!(
            snapshot.messages,
            vec![ChatMessage::assistant("I've read x.pdf. Ask me anything!")]
        );
        assert_eq!(snapshot.documents.len(), 1);
        assert!(!snapshot.uploading);
    }

    #[tokio::test]
    async fn test_failed_upload_appends_one_error() {
        let backend = Arc::new(FakeBackend::failing());
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();
        let before = DocumentRecord {
            filename: "old.pdf".into(),
            uploaded_at: Utc::now(),
        };
        workspace.update(|state| state.documents = vec![before.clone()]);

        let outcome = assistant.upload(&workspace, pdf("x.pdf")).await;

        assert_eq!(outcome, UploadOutcome::Failed);
        let snapshot = workspace.snapshot();
        assert_eq!(snapshot.messages, vec![ChatMessage::assistant(UPLOAD_FAILED)]);
        assert_eq!(snapshot.documents, vec![before]);
        assert!(snapshot.viewer_url.is_none());
        assert!(!snapshot.uploading);
    }

    #[tokio::test]
    async fn test_blank_question_is_ignored() {
        let backend = Arc::new(FakeBackend::default());
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();

        assert_eq!(assistant.ask(&workspace, "").await, AskOutcome::Ignored);
        assert_eq!(assistant.ask(&workspace, "  \n\t ").await, AskOutcome::Ignored);

        assert!(backend.calls().is_empty());
        assert_eq!(workspace.message_count(), 0);
    }

    #[tokio::test]
    async fn test_query_appends_user_then_assistant() {
        let backend = Arc::new(FakeBackend::default());
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();

        let outcome = assistant.ask(&workspace, "What is it?").await;

        assert_eq!(outcome, AskOutcome::Answered);
        let messages = workspace.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::user("What is it?"));
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].text, "answer to What is it?");
        assert!(!workspace.is_thinking());
    }

    #[tokio::test]
    async fn test_question_is_sent_as_typed() {
        let backend = Arc::new(FakeBackend::default());
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();

        assistant.ask(&workspace, "  What is it?\n").await;

        assert_eq!(backend.calls(), vec!["query   What is it?\n"]);
        assert_eq!(workspace.messages()[0], ChatMessage::user("  What is it?\n"));
    }

    #[tokio::test]
    async fn test_failed_query_appends_error() {
        let backend = Arc::new(FakeBackend::failing());
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();

        assert_eq!(assistant.ask(&workspace, "Why?").await, AskOutcome::Failed);
        assert_eq!(
            workspace.messages(),
            vec![ChatMessage::user("Why?"), ChatMessage::assistant(QUERY_FAILED)]
        );
    }

    #[tokio::test]
    async fn test_summary_sends_prompt_under_generic_label() {
        let backend = Arc::new(FakeBackend::default());
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();

        assert_eq!(assistant.summarize(&workspace).await, AskOutcome::Answered);

        assert_eq!(backend.calls(), vec![format!("query {SUMMARY_PROMPT}")]);
        let messages = workspace.messages();
        assert_eq!(messages[0], ChatMessage::user(SUMMARY_LABEL));
        assert_eq!(messages[1].text, format!("answer to {SUMMARY_PROMPT}"));
    }

    #[tokio::test]
    async fn test_summary_endpoint_mode() {
        let backend = Arc::new(FakeBackend::default());
        let dyn_backend: Arc<dyn RagBackend> = backend.clone();
        let settings = AssistantConfig {
            summary_mode: SummaryMode::Endpoint,
            ..AssistantConfig::default()
        };
        let assistant = Assistant::new(dyn_backend, settings);
        let workspace = WorkspaceStore::new().create();

        assistant.summarize(&workspace).await;

        assert_eq!(backend.calls(), vec!["summarize".to_string()]);
        assert_eq!(
            workspace.messages()[1],
            ChatMessage::assistant("This document is about testing.")
        );
    }

    #[tokio::test]
    async fn test_load_falls_back_to_greeting() {
        let backend = Arc::new(FakeBackend::default());
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();

        assistant.load(&workspace).await;
        assistant.load(&workspace).await;

        assert_eq!(
            workspace.messages(),
            vec![ChatMessage::assistant(crate::config::DEFAULT_GREETING)]
        );
        // Second load is a no-op.
        assert_eq!(backend.calls(), vec!["history", "documents"]);
    }

    #[tokio::test]
    async fn test_load_restores_history_and_documents() {
        let backend = Arc::new(FakeBackend {
            history: vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")],
            documents: Mutex::new(vec![DocumentRecord {
                filename: "a.pdf".into(),
                uploaded_at: Utc::now(),
            }]),
            ..FakeBackend::default()
        });
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();

        assistant.load(&workspace).await;

        assert_eq!(workspace.message_count(), 2);
        assert_eq!(workspace.documents()[0].filename, "a.pdf");
    }

    #[tokio::test]
    async fn test_load_failure_still_greets() {
        let backend = Arc::new(FakeBackend::failing());
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();

        assistant.load(&workspace).await;

        assert_eq!(
            workspace.messages(),
            vec![ChatMessage::assistant(crate::config::DEFAULT_GREETING)]
        );
        assert!(workspace.documents().is_empty());
    }

    #[tokio::test]
    async fn test_clear_resets_to_greeting() {
        let backend = Arc::new(FakeBackend::default());
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();
        assistant.upload(&workspace, pdf("x.pdf")).await;
        assistant.ask(&workspace, "What?").await;

        assert!(assistant.clear(&workspace).await);

        let snapshot = workspace.snapshot();
        assert_eq!(
            snapshot.messages,
            vec![ChatMessage::assistant(crate::config::DEFAULT_GREETING)]
        );
        assert!(snapshot.viewer_url.is_none());
        assert!(snapshot.documents.is_empty());
    }

    #[tokio::test]
    async fn test_failed_clear_keeps_state() {
        let backend = Arc::new(FakeBackend::failing());
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();
        workspace.update(|state| state.open_document("a.pdf", "http://backend.test/static/a.pdf"));

        assert!(!assistant.clear(&workspace).await);

        assert_eq!(workspace.messages(), vec![ChatMessage::assistant(CLEAR_FAILED)]);
        assert!(workspace.viewer_url().is_some());
    }

    #[tokio::test]
    async fn test_reset_uses_reset_greeting() {
        let backend = Arc::new(FakeBackend::default());
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();
        assistant.upload(&workspace, pdf("x.pdf")).await;

        assistant.reset(&workspace);

        let snapshot = workspace.snapshot();
        assert_eq!(
            snapshot.messages,
            vec![ChatMessage::assistant(crate::config::DEFAULT_RESET_GREETING)]
        );
        assert!(snapshot.viewer_url.is_none());
    }

    #[tokio::test]
    async fn test_select_document() {
        let backend = Arc::new(FakeBackend::default());
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();
        workspace.update(|state| {
            state.documents = vec![DocumentRecord {
                filename: "a.pdf".into(),
                uploaded_at: Utc::now(),
            }];
        });

        let url = assistant.select_document(&workspace, "a.pdf").unwrap();
        assert!(url.ends_with("/static/a.pdf"));
        assert_eq!(workspace.viewer_url(), Some(url));

        assert!(matches!(
            assistant.select_document(&workspace, "missing.pdf"),
            Err(AssistantError::UnknownDocument(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_questions_resolve_in_order() {
        let backend = Arc::new(FakeBackend {
            delays: HashMap::from([("slow".to_string(), Duration::from_secs(5))]),
            ..FakeBackend::default()
        });
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();

        let slow = {
            let assistant = assistant.clone();
            let workspace = workspace.clone();
            tokio::spawn(async move { assistant.ask(&workspace, "slow").await })
        };
        tokio::task::yield_now().await;
        let fast = assistant.ask(&workspace, "fast").await;

        assert_eq!(slow.await.unwrap(), AskOutcome::Answered);
        assert_eq!(fast, AskOutcome::Answered);
        let texts: Vec<String> = workspace.messages().into_iter().map(|m| m.text).collect();
        assert_eq!(
            texts,
            vec!["slow", "answer to slow", "fast", "answer to fast"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_discards_pending_answer() {
        let backend = Arc::new(FakeBackend {
            delays: HashMap::from([("slow".to_string(), Duration::from_secs(5))]),
            ..FakeBackend::default()
        });
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();

        let pending = {
            let assistant = assistant.clone();
            let workspace = workspace.clone();
            tokio::spawn(async move { assistant.ask(&workspace, "slow").await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(workspace.is_thinking());
        assistant.reset(&workspace);

        assert_eq!(pending.await.unwrap(), AskOutcome::Discarded);
        assert_eq!(
            workspace.messages(),
            vec![ChatMessage::assistant(crate::config::DEFAULT_RESET_GREETING)]
        );
        assert!(!workspace.is_thinking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_does_not_wait_for_pending_question() {
        let backend = Arc::new(FakeBackend {
            delays: HashMap::from([("slow".to_string(), Duration::from_secs(60))]),
            ..FakeBackend::default()
        });
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();
        assistant.load(&workspace).await;

        let pending = {
            let assistant = assistant.clone();
            let workspace = workspace.clone();
            tokio::spawn(async move { assistant.ask(&workspace, "slow").await })
        };
        tokio::task::yield_now().await;
        assert!(workspace.is_thinking());

        let reload = tokio::time::timeout(Duration::from_secs(1), assistant.load(&workspace)).await;
        assert!(reload.is_ok());
        assert!(workspace.is_thinking());

        assert_eq!(pending.await.unwrap(), AskOutcome::Answered);
        assert_eq!(backend.calls(), vec!["history", "documents", "query slow"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_upload_still_lists_document() {
        let backend = Arc::new(FakeBackend {
            delays: HashMap::from([("slow.pdf".to_string(), Duration::from_secs(5))]),
            ..FakeBackend::default()
        });
        let assistant = assistant_with(&backend);
        let workspace = WorkspaceStore::new().create();

        let pending = {
            let assistant = assistant.clone();
            let workspace = workspace.clone();
            tokio::spawn(async move { assistant.upload(&workspace, pdf("slow.pdf")).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(workspace.is_uploading());
        assistant.reset(&workspace);

        assert_eq!(pending.await.unwrap(), UploadOutcome::Discarded);
        let snapshot = workspace.snapshot();
        assert!(snapshot.viewer_url.is_none());
        assert_eq!(
            snapshot.messages,
            vec![ChatMessage::assistant(crate::config::DEFAULT_RESET_GREETING)]
        );
        let names: Vec<&str> = snapshot.documents.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["slow.pdf"]);
    }
}
