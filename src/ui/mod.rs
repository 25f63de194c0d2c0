//! Server-rendered HTML.
//!
//! The page is plain HTML enhanced with HTMX: every form also carries a
//! regular `action`, so the UI keeps working without JavaScript, while HTMX
//! swaps the `#workspace` fragment in place.
//!
//! # Structure
//!
//! - [`page`]: Document shell and the `#workspace` fragment
//! - [`viewer`]: PDF viewer, upload drop zone and document history
//! - [`conversation`]: Message list, question input and speech controls
//! - [`icons`]: Inline SVG icons

pub mod conversation;
pub mod icons;
pub mod page;
pub mod viewer;

use crate::session::WorkspaceSnapshot;
use crate::speech::SpeechStatus;

pub use page::{render_page, render_workspace};

/// Everything needed to render a workspace.
#[derive(Debug, Clone, Copy)]
pub struct PageView<'a> {
    pub workspace: &'a WorkspaceSnapshot,
    pub speech: SpeechStatus,
    pub speech_enabled: bool,
}

/// Button visual variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ButtonVariant {
    #[default]
    Primary,
    Success,
    Destructive,
    Ghost,
}

impl ButtonVariant {
    /// Get CSS classes for this variant.
    #[must_use]
    pub fn classes(self) -> &'static str {
        match self {
            Self::Primary => "btn btn-primary",
            Self::Success => "btn btn-success",
            Self::Destructive => "btn btn-danger",
            Self::Ghost => "btn btn-ghost",
        }
    }
}

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// A form bound to `action` that swaps `target` on HTMX requests.
///
/// `session_id` is sent as a hidden field; `attrs` are appended verbatim.
pub(crate) fn action_form(
    action: &str,
    session_id: &str,
    target: &str,
    attrs: &str,
    body: &str,
) -> String {
    format!(
        r#"<form method="post" action="{action}" hx-post="{action}" hx-target="{target}" hx-swap="outerHTML" {attrs}><input type="hidden" name="session_id" value="{}">{body}</form>"#,
        html_escape(session_id)
    )
}
