//! Chat panel.

use crate::backend::{ChatMessage, Role};
use crate::speech::SpeechStatus;

use super::icons::Icon;
use super::{PageView, action_form, html_escape};

/// Right-hand panel: messages, thinking indicator, speech controls and the
/// question input.
pub fn render_conversation(view: &PageView<'_>) -> String {
    let workspace = view.workspace;
    let session_id = workspace.id.as_str();

    let mut messages = String::new();
    for (index, message) in workspace.messages.iter().enumerate() {
        messages.push_str(&render_message(session_id, index, message, view.speech_enabled));
    }

    // Shown by HTMX while a request is pending, and server-side while another
    // request from this workspace is still in flight.
    let thinking_class = if workspace.thinking {
        "thinking htmx-indicator active"
    } else {
        "thinking htmx-indicator"
    };

    format!(
        r#"<section class="chat-panel">
    <div class="messages" id="messages" aria-live="polite" aria-label="Chat messages">
        {messages}
        <div id="thinking" class="{thinking_class}">{loader} AI is thinking...</div>
    </div>
    {speech}
    {input}
</section>"#,
        loader = Icon::Loader.svg("icon-xs spin"),
        speech = render_speech_status(session_id, view.speech, view.speech_enabled),
        input = render_input(session_id, workspace.thinking),
    )
}

fn render_message(session_id: &str, index: usize, message: &ChatMessage, speech: bool) -> String {
    let text = html_escape(&message.text);
    match message.role {
        Role::User => format!(
            r#"<div class="message message-user"><div class="bubble bubble-user"><p>{text}</p></div><div class="avatar avatar-user">{}</div></div>"#,
            Icon::User.svg("icon-sm")
        ),
        Role::Assistant => {
            let speak = if speech {
                action_form(
                    "/api/speak",
                    session_id,
                    "#speech-status",
                    "",
                    &format!(
                        r#"<input type="hidden" name="index" value="{index}"><button type="submit" class="speak-button" title="Read aloud">{}</button>"#,
                        Icon::Volume.svg("icon-xs")
                    ),
                )
            } else {
                String::new()
            };
            format!(
                r#"<div class="message message-assistant"><div class="avatar avatar-assistant">{}</div><div class="bubble bubble-assistant"><p>{text}</p>{speak}</div></div>"#,
                Icon::Bot.svg("icon-sm")
            )
        }
    }
}

/// Speech indicator. While speaking it polls itself so the stop button
/// disappears once playback ends.
pub fn render_speech_status(session_id: &str, status: SpeechStatus, enabled: bool) -> String {
    if !enabled || !status.speaking {
        return r#"<div id="speech-status" class="speech-status"></div>"#.to_string();
    }

    let session = html_escape(session_id);
    let stop = action_form(
        "/api/speak/stop",
        session_id,
        "#speech-status",
        "",
        &format!(
            r#"<button type="submit" class="btn btn-ghost">{} Stop speaking</button>"#,
            Icon::Stop.svg("icon-xs")
        ),
    );
    format!(
        r#"<div id="speech-status" class="speech-status speaking" hx-get="/api/speech/status?session_id={session}" hx-trigger="every 1s" hx-swap="outerHTML">{} Speaking... {stop}</div>"#,
        Icon::Volume.svg("icon-xs")
    )
}

fn render_input(session_id: &str, thinking: bool) -> String {
    let disabled = if thinking { " disabled" } else { "" };
    action_form(
        "/api/ask",
        session_id,
        "#workspace",
        r##"class="chat-input" hx-indicator="#thinking" hx-disabled-elt="find button""##,
        &format!(
            r#"{globe}<input type="text" name="question" placeholder="Ask anything..." autocomplete="off" required><button type="submit" class="send-button" title="Send"{disabled}>{send}</button>"#,
            globe = Icon::Globe.svg("icon muted"),
            send = Icon::Send.svg("icon-sm"),
        ),
    )
}
