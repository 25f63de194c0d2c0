//! Per-browser view state and workspace storage.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::backend::{ChatMessage, DocumentRecord};

/// Default workspace timeout (30 minutes).
pub const DEFAULT_WORKSPACE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Mutable view state of one workspace.
#[derive(Debug, Default)]
pub struct WorkspaceState {
    /// Name of the file last uploaded or selected.
    pub current_file: Option<String>,
    /// Backend URL of the document shown in the viewer.
    pub viewer_url: Option<String>,
    /// Conversation, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Documents known to the backend.
    pub documents: Vec<DocumentRecord>,
    /// Whether history has been fetched for this workspace.
    pub loaded: bool,
    epoch: u64,
    pending_uploads: usize,
    pending_queries: usize,
}

impl WorkspaceState {
    /// Drop the conversation and the active document, starting a new epoch.
    ///
    /// Actions started before the reset can no longer apply their results.
    pub fn reset(&mut self, greeting: &str) {
        self.epoch += 1;
        self.current_file = None;
        self.viewer_url = None;
        self.messages = vec![ChatMessage::assistant(greeting)];
    }

    /// Show `filename` in the viewer.
    pub fn open_document(&mut self, filename: impl Into<String>, viewer_url: impl Into<String>) {
        self.current_file = Some(filename.into());
        self.viewer_url = Some(viewer_url.into());
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Read-only copy of a workspace for rendering and JSON responses.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceSnapshot {
    pub id: String,
    pub current_file: Option<String>,
    pub viewer_url: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub documents: Vec<DocumentRecord>,
    pub uploading: bool,
    pub thinking: bool,
}

/// Kind of in-flight network action shown in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Upload,
    Query,
}

/// Keeps an [`Activity`] flag raised until dropped.
#[derive(Debug)]
pub struct ActivityGuard {
    workspace: Workspace,
    activity: Activity,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        let mut state = self.workspace.write();
        match self.activity {
            Activity::Upload => state.pending_uploads = state.pending_uploads.saturating_sub(1),
            Activity::Query => state.pending_queries = state.pending_queries.saturating_sub(1),
        }
    }
}

/// A single browser workspace.
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct Workspace {
    inner: Arc<WorkspaceInner>,
}

#[derive(Debug)]
struct WorkspaceInner {
    id: String,
    state: RwLock<WorkspaceState>,
    /// Serializes network-bound actions so results apply in issue order.
    actions: tokio::sync::Mutex<()>,
    last_activity: RwLock<DateTime<Utc>>,
}

impl Workspace {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            inner: Arc::new(WorkspaceInner {
                id,
                state: RwLock::new(WorkspaceState::default()),
                actions: tokio::sync::Mutex::new(()),
                last_activity: RwLock::new(now),
            }),
        }
    }

    /// Get the workspace ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    fn read(&self) -> RwLockReadGuard<'_, WorkspaceState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, WorkspaceState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for earlier actions on this workspace to finish.
    pub async fn begin_action(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.inner.actions.lock().await
    }

    /// Raise the flag for `activity` until the guard is dropped.
    pub fn track(&self, activity: Activity) -> ActivityGuard {
        {
            let mut state = self.write();
            match activity {
                Activity::Upload => state.pending_uploads += 1,
                Activity::Query => state.pending_queries += 1,
            }
        }
        ActivityGuard {
            workspace: self.clone(),
            activity,
        }
    }

    /// Mutate the state unconditionally.
    pub fn update<R>(&self, f: impl FnOnce(&mut WorkspaceState) -> R) -> R {
        let result = f(&mut self.write());
        self.touch();
        result
    }

    /// Mutate the state only if no reset happened since `epoch`.
    ///
    /// Returns `None` when the result was discarded.
    pub fn update_if_current<R>(
        &self,
        epoch: u64,
        f: impl FnOnce(&mut WorkspaceState) -> R,
    ) -> Option<R> {
        let mut state = self.write();
        if state.epoch != epoch {
            return None;
        }
        let result = f(&mut state);
        drop(state);
        self.touch();
        Some(result)
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        self.read().epoch
    }

    /// Whether history has been fetched.
    pub fn is_loaded(&self) -> bool {
        self.read().loaded
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.read().messages.clone()
    }

    pub fn message(&self, index: usize) -> Option<ChatMessage> {
        self.read().messages.get(index).cloned()
    }

    pub fn message_count(&self) -> usize {
        self.read().messages.len()
    }

    pub fn documents(&self) -> Vec<DocumentRecord> {
        self.read().documents.clone()
    }

    pub fn viewer_url(&self) -> Option<String> {
        self.read().viewer_url.clone()
    }

    pub fn is_uploading(&self) -> bool {
        self.read().pending_uploads > 0
    }

    pub fn is_thinking(&self) -> bool {
        self.read().pending_queries > 0
    }

    #[must_use]
    pub fn snapshot(&self) -> WorkspaceSnapshot {
        let state = self.read();
        WorkspaceSnapshot {
            id: self.inner.id.clone(),
            current_file: state.current_file.clone(),
            viewer_url: state.viewer_url.clone(),
            messages: state.messages.clone(),
            documents: state.documents.clone(),
            uploading: state.pending_uploads > 0,
            thinking: state.pending_queries > 0,
        }
    }

    fn touch(&self) {
        let mut guard = self
            .inner
            .last_activity
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Utc::now();
    }

    /// Check if the workspace has been idle longer than `timeout`.
    #[must_use]
    pub fn is_expired_with_timeout(&self, timeout: Duration) -> bool {
        let last = *self
            .inner
            .last_activity
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        // Negative durations (clock skew) never expire.
        (Utc::now() - last)
            .to_std()
            .is_ok_and(|idle| idle > timeout)
    }
}

/// Thread-safe store for workspaces.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    inner: Arc<RwLock<HashMap<String, Workspace>>>,
}

impl Default for WorkspaceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a new workspace and return it.
    #[must_use]
    pub fn create(&self) -> Workspace {
        let id = Uuid::new_v4().to_string();
        let workspace = Workspace::new(id.clone());
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, workspace.clone());
        workspace
    }

    /// Get a workspace by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Workspace> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Workspace> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove workspaces that have been inactive longer than the timeout.
    ///
    /// Returns the number of workspaces removed.
    pub fn cleanup_expired_with_timeout(&self, timeout: Duration) -> usize {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|_, workspace| !workspace.is_expired_with_timeout(timeout));
        before - guard.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_store() {
        let store = WorkspaceStore::new();
        assert!(store.is_empty());

        let workspace = store.create();
        assert_eq!(store.len(), 1);

        let retrieved = store.get(workspace.id()).unwrap();
        assert_eq!(retrieved.id(), workspace.id());

        store.remove(workspace.id());
        assert!(store.is_empty());
    }

    #[test]
    fn test_reset_replaces_messages_and_closes_document() {
        let store = WorkspaceStore::new();
        let workspace = store.create();
        workspace.update(|state| {
            state.push(ChatMessage::user("Hello"));
            state.open_document("a.pdf", "http://backend/static/a.pdf");
        });

        workspace.update(|state| state.reset("Ready"));

        let snapshot = workspace.snapshot();
        assert_eq!(snapshot.messages, vec![ChatMessage::assistant("Ready")]);
        assert!(snapshot.viewer_url.is_none());
        assert!(snapshot.current_file.is_none());
    }

    #[test]
    fn test_stale_epoch_updates_are_discarded() {
        let workspace = WorkspaceStore::new().create();
        let epoch = workspace.epoch();

        workspace.update(|state| state.reset("Ready"));
        let applied =
            workspace.update_if_current(epoch, |state| state.push(ChatMessage::assistant("late")));

        assert!(applied.is_none());
        assert_eq!(workspace.message_count(), 1);

        let epoch = workspace.epoch();
        let applied =
            workspace.update_if_current(epoch, |state| state.push(ChatMessage::assistant("now")));
        assert!(applied.is_some());
        assert_eq!(workspace.message_count(), 2);
    }

    #[test]
    fn test_activity_flags_follow_guards() {
        let workspace = WorkspaceStore::new().create();
        assert!(!workspace.is_thinking());

        let first = workspace.track(Activity::Query);
        let second = workspace.track(Activity::Query);
        assert!(workspace.is_thinking());
        assert!(!workspace.is_uploading());

        drop(first);
        assert!(workspace.is_thinking());
        drop(second);
        assert!(!workspace.is_thinking());

        let upload = workspace.track(Activity::Upload);
        assert!(workspace.snapshot().uploading);
        drop(upload);
        assert!(!workspace.snapshot().uploading);
    }

    #[test]
    fn test_cleanup_expired() {
        let store = WorkspaceStore::new();
        let _workspace = store.create();

        assert_eq!(store.cleanup_expired_with_timeout(DEFAULT_WORKSPACE_TIMEOUT), 0);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.cleanup_expired_with_timeout(Duration::from_millis(1)), 1);
        assert!(store.is_empty());
    }
}
