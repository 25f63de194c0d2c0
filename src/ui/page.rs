//! Document shell and workspace fragment.

use super::PageView;
use super::conversation::render_conversation;
use super::viewer::render_viewer_panel;

/// Generate the full HTML document.
pub fn render_page(view: &PageView<'_>) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en" class="dark">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="description" content="Chat with your PDF documents">
    <title>AI PDF Assistant</title>

    <!-- HTMX (local) -->
    <script src="/static/vendor/htmx-2.0.8.min.js"></script>

    <link rel="stylesheet" href="/static/app.css">
</head>
<body>
{workspace}
</body>
</html>"#,
        workspace = render_workspace(view)
    )
}

/// The `#workspace` element swapped by every HTMX action.
pub fn render_workspace(view: &PageView<'_>) -> String {
    format!(
        r#"<div id="workspace" class="workspace">
{viewer}
{conversation}
</div>"#,
        viewer = render_viewer_panel(view),
        conversation = render_conversation(view),
    )
}
