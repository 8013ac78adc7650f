//! Notification payloads and their Telegram HTML rendering.

use crate::domain::FeedEntry;

/// Maximum number of characters of an entry summary carried into a notification.
pub const DESCRIPTION_LIMIT: usize = 400;

/// Appended to a description that was cut at [`DESCRIPTION_LIMIT`].
pub const TRUNCATION_MARKER: &str = "...";

/// Messenger-agnostic notification: title, clickable link, body and footer attribution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationPayload {
    pub title: String,
    pub link: String,
    pub description: String,
    pub source_label: String,
}

impl NotificationPayload {
    pub fn from_entry(entry: &FeedEntry, source_label: &str) -> Self {
        Self {
            title: entry.title.clone(),
            link: entry.link.clone(),
            description: truncate_summary(&entry.summary),
            source_label: source_label.to_string(),
        }
    }
}

/// Cut `summary` to [`DESCRIPTION_LIMIT`] characters, marking the cut.
///
/// Counts chars, not bytes, so multi-byte text is never split mid-codepoint.
pub fn truncate_summary(summary: &str) -> String {
    match summary.char_indices().nth(DESCRIPTION_LIMIT) {
        None => summary.to_string(),
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &summary[..cut]),
    }
}

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render a payload as Telegram HTML.
///
/// Layout: bold linked title, blank line, description, blank line, italic footer.
/// An empty description drops its paragraph.
pub fn render_html(payload: &NotificationPayload) -> String {
    let mut out = format!(
        "<b><a href=\"{}\">{}</a></b>",
        escape_html(&payload.link),
        escape_html(&payload.title)
    );
    if !payload.description.trim().is_empty() {
        out.push_str("\n\n");
        out.push_str(&escape_html(&payload.description));
    }
    out.push_str("\n\n<i>Source: ");
    out.push_str(&escape_html(&payload.source_label));
    out.push_str("</i>");
    out
}
