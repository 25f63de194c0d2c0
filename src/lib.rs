//! AI PDF Assistant
//!
//! A web front end for a PDF question-answering service: upload a PDF,
//! read it in an embedded viewer, and chat with a retrieval-augmented
//! backend about it.
//!
//! # Architecture
//!
//! - **Server**: Axum routes rendering HTML fragments for HTMX
//! - **Backend**: Typed `reqwest` client for the RAG service
//! - **Workspaces**: In-memory view state per browser session
//! - **Speech**: Host text-to-speech playback, one utterance at a time
//!
//! # Modules
//!
//! - [`assistant`]: Upload, question, summary and history flows
//! - [`backend`]: RAG backend trait and HTTP client
//! - [`session`]: Workspace state and storage
//! - [`speech`]: Text-to-speech engines and player
//! - [`ui`]: Server-rendered HTML

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod assistant;
pub mod backend;
pub mod config;
pub mod server;
pub mod session;
pub mod speech;
pub mod ui;

use std::sync::Arc;

use crate::assistant::Assistant;
use crate::config::AppConfig;
use crate::session::WorkspaceStore;
use crate::speech::SpeechPlayer;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Backend flows.
    pub assistant: Arc<Assistant>,
    /// Per-browser view state.
    pub workspaces: WorkspaceStore,
    /// Process-wide speech playback.
    pub speech: SpeechPlayer,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}
