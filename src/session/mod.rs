//! Workspace state management.
//!
//! This module provides in-memory storage for the view state of each
//! browser tab. Workspaces are identified by UUID and hold the current
//! document, the conversation and the in-flight activity flags.
//!
//! # Architecture
//!
//! - [`Workspace`]: View state of a single browser session
//! - [`WorkspaceStore`]: Thread-safe store for all active workspaces
//!
//! # Example
//!
//! ```rust
//! use pdf_chat_assistant::backend::ChatMessage;
//! use pdf_chat_assistant::session::WorkspaceStore;
//!
//! let store = WorkspaceStore::new();
//! let workspace = store.create();
//! workspace.update(|state| state.push(ChatMessage::user("Hello!")));
//!
//! assert_eq!(workspace.message_count(), 1);
//! ```

mod workspace;

pub use workspace::{
    Activity, ActivityGuard, DEFAULT_WORKSPACE_TIMEOUT, Workspace, WorkspaceSnapshot,
    WorkspaceState, WorkspaceStore,
};
