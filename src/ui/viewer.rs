//! Document viewer panel.

use crate::backend::DocumentRecord;

use super::icons::Icon;
use super::{ButtonVariant, PageView, action_form, html_escape};

/// Asked before the clear action deletes anything.
pub const CLEAR_CONFIRM: &str =
    "Delete all chat history and uploaded files? This cannot be undone.";

/// Left-hand panel: header actions, the PDF frame or upload zone, and the
/// list of previously uploaded documents.
pub fn render_viewer_panel(view: &PageView<'_>) -> String {
    let workspace = view.workspace;
    let session_id = workspace.id.as_str();

    let content = match &workspace.viewer_url {
        Some(url) => format!(
            r#"<iframe src="{}" class="viewer-frame" title="PDF Viewer"></iframe>"#,
            html_escape(url)
        ),
        None => render_upload_zone(session_id, workspace.uploading),
    };

    format!(
        r#"<section class="viewer-panel">
    <header class="panel-header">
        <h1 class="panel-title">{icon} Document Viewer</h1>
        {actions}
    </header>
    <div class="viewer-content">{content}</div>
    {documents}
</section>"#,
        icon = Icon::FileText.svg("icon"),
        actions = render_actions(view),
        documents = render_document_list(
            session_id,
            &workspace.documents,
            workspace.current_file.as_deref()
        ),
    )
}

fn render_actions(view: &PageView<'_>) -> String {
    let workspace = view.workspace;
    let session_id = workspace.id.as_str();
    let mut html = String::from(r#"<div class="panel-actions">"#);

    if workspace.viewer_url.is_some() {
        html.push_str(&action_form(
            "/api/summary",
            session_id,
            "#workspace",
            r##"hx-indicator="#thinking""##,
            &format!(
                r#"<button type="submit" class="{}">{} Summary</button>"#,
                ButtonVariant::Success.classes(),
                Icon::FileOutput.svg("icon-sm")
            ),
        ));
        html.push_str(&action_form(
            "/api/reset",
            session_id,
            "#workspace",
            "",
            &format!(
                r#"<button type="submit" class="{}">{} Reset</button>"#,
                ButtonVariant::Destructive.classes(),
                Icon::Rotate.svg("icon-sm")
            ),
        ));
    }

    html.push_str(&action_form(
        "/api/clear",
        session_id,
        "#workspace",
        &format!(
            r#"hx-confirm="{CLEAR_CONFIRM}" onsubmit="return !!window.htmx || confirm(this.dataset.confirm)" data-confirm="{CLEAR_CONFIRM}""#
        ),
        &format!(
            r#"<button type="submit" class="{}" title="Clear history">{} Clear</button>"#,
            ButtonVariant::Ghost.classes(),
            Icon::Trash.svg("icon-sm")
        ),
    ));

    html.push_str("</div>");
    html
}

fn render_upload_zone(session_id: &str, uploading: bool) -> String {
    let icon = if uploading {
        Icon::Loader.svg("icon-lg spin")
    } else {
        Icon::Upload.svg("icon-lg")
    };
    format!(
        r##"<form class="upload-zone" method="post" action="/api/upload" enctype="multipart/form-data"
      hx-post="/api/upload" hx-encoding="multipart/form-data" hx-target="#workspace" hx-swap="outerHTML">
    <input type="hidden" name="session_id" value="{session_id}">
    <label class="drop-target">
        <input type="file" name="file" accept=".pdf,application/pdf" class="hidden"
               onchange="this.form.requestSubmit()">
        <div class="drop-icon">{icon}</div>
        <h3>Upload PDF Document</h3>
        <p class="muted">Supports Multilingual Q&amp;A + Summarization</p>
    </label>
    <noscript><button type="submit" class="btn btn-primary">Upload</button></noscript>
</form>"##,
        session_id = html_escape(session_id),
    )
}

/// Previously uploaded documents; selecting one opens it in the viewer.
pub fn render_document_list(
    session_id: &str,
    documents: &[DocumentRecord],
    active: Option<&str>,
) -> String {
    if documents.is_empty() {
        return r#"<div class="documents documents-empty"><p class="muted">No documents yet</p></div>"#
            .to_string();
    }

    let mut html = String::from(r#"<div class="documents"><h2 class="section-title">History</h2><ul>"#);
    for doc in documents {
        let name = html_escape(&doc.filename);
        let class = if active == Some(doc.filename.as_str()) {
            "document document-active"
        } else {
            "document"
        };
        let body = format!(
            r#"<input type="hidden" name="filename" value="{name}"><button type="submit" class="document-button">{icon}<span class="document-name">{name}</span><time datetime="{iso}">{shown}</time></button>"#,
            icon = Icon::FileText.svg("icon-sm"),
            iso = doc.uploaded_at.to_rfc3339(),
            shown = doc.uploaded_at.format("%Y-%m-%d %H:%M"),
        );
        html.push_str(&format!(
            r#"<li class="{class}">{}</li>"#,
            action_form("/api/documents/select", session_id, "#workspace", "", &body)
        ));
    }
    html.push_str("</ul></div>");
    html
}
