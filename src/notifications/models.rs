use crate::monitoring::policy::NotificationDecision;

/// Which alert a site transition produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// First detection of an outage.
    Down,
    /// Outage still ongoing after the cool-down window.
    StillDown,
    Recovered,
}

/// An alert addressed to one site owner, rendered as Telegram HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub kind: AlertKind,
    pub url: String,
    pub detail: String,
}

impl AlertMessage {
    /// Maps a policy decision to a message; `None` for `NoOp`.
    pub fn for_decision(
        decision: NotificationDecision,
        previously_available: bool,
        url: &str,
        detail: &str,
    ) -> Option<Self> {
        let kind = match decision {
            NotificationDecision::NoOp => return None,
            NotificationDecision::AlertDown if previously_available => AlertKind::Down,
            NotificationDecision::AlertDown => AlertKind::StillDown,
            NotificationDecision::AlertRecovered => AlertKind::Recovered,
        };
        Some(Self {
            kind,
            url: url.to_string(),
            detail: detail.to_string(),
        })
    }

    pub fn render(&self) -> String {
        let url = escape_html(&self.url);
        let detail = escape_html(&self.detail);
        match self.kind {
            AlertKind::Down => {
                format!("❌ Site <b>{url}</b> is unavailable.\nReason: {detail}")
            }
            AlertKind::StillDown => {
                format!("⚠️ Site <b>{url}</b> is still unavailable.\nReason: {detail}")
            }
            AlertKind::Recovered => format!("✅ Site <b>{url}</b> is available again."),
        }
    }
}

/// Escapes the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
