//! Panel protocol - messages exchanged with the presentation layer.
//!
//! One JSON object per line in each direction. Commands are tagged by
//! `command`, outbound messages by `event`.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Card, CoreEvent};

/// Request from the presentation or hotkey layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum PanelCommand {
    /// Capture the current clipboard now.
    Capture,
    /// Send the full card history.
    List,
    /// Send the current clipboard text without capturing it.
    Peek,
    /// Stage a card's content back onto the clipboard.
    Paste { id: u64 },
    Pin { id: u64, pinned: bool },
    Tag { id: u64, tag: String },
    Untag { id: u64, tag: String },
    Show,
    Hide,
    Quit,
}

impl PanelCommand {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Message sent to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PanelMessage {
    CardCreated { card: Card },
    /// Reply to `capture`; `null` when nothing was admitted.
    Captured { card: Option<Card> },
    Cards { cards: Vec<Card> },
    Clipboard { text: Option<String> },
    CardUpdated { card: Card },
    Pasted { id: u64 },
    ShowPanel,
    HidePanel,
    Error { message: String },
}

impl From<CoreEvent> for PanelMessage {
    fn from(event: CoreEvent) -> Self {
        match event {
            CoreEvent::CardCreated(card) => PanelMessage::CardCreated { card },
            CoreEvent::ShowPanel => PanelMessage::ShowPanel,
            CoreEvent::HidePanel => PanelMessage::HidePanel,
        }
    }
}

/// How outbound messages are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// JSON lines, for a UI process
    #[default]
    Json,
    /// Human-readable lines, for a terminal
    Text,
}

impl OutputFormat {
    /// Render a message as one or more newline-terminated lines.
    pub fn render(&self, message: &PanelMessage, date_format: &str) -> String {
        match self {
            OutputFormat::Json => match serde_json::to_string(message) {
                Ok(json) => format!("{}\n", json),
                Err(e) => format!("{{\"event\":\"error\",\"message\":\"{}\"}}\n", e),
            },
            OutputFormat::Text => render_text(message, date_format, Utc::now()),
        }
    }
}

fn render_text(message: &PanelMessage, date_format: &str, now: DateTime<Utc>) -> String {
    match message {
        PanelMessage::CardCreated { card } => format!("+ {}\n", card_line(card, date_format)),
        PanelMessage::Captured { card: Some(card) } => format!("captured card {}\n", card.id),
        PanelMessage::Captured { card: None } => "nothing captured\n".to_string(),
        PanelMessage::CardUpdated { card } => format!("* {}\n", card_line(card, date_format)),
        PanelMessage::Cards { cards } if cards.is_empty() => "(no cards)\n".to_string(),
        PanelMessage::Cards { cards } => cards
            .iter()
            .map(|card| format!("  {} ({})\n", card_line(card, date_format), card.age_str(now)))
            .collect(),
        PanelMessage::Clipboard { text: Some(text) } => format!("clipboard: {}\n", text),
        PanelMessage::Clipboard { text: None } => "clipboard: (empty)\n".to_string(),
        PanelMessage::Pasted { id } => format!("pasted card {}\n", id),
        PanelMessage::ShowPanel => "panel shown\n".to_string(),
        PanelMessage::HidePanel => "panel hidden\n".to_string(),
        PanelMessage::Error { message } => format!("error: {}\n", message),
    }
}

fn card_line(card: &Card, date_format: &str) -> String {
    let created = card.created_at.with_timezone(&Local).format(date_format);
    let pin = if card.is_pinned { "^" } else { " " };
    let tags = if card.tags.is_empty() {
        String::new()
    } else {
        format!(" #{}", card.tags.join(" #"))
    };
    format!(
        "[{:>3}]{} {} {:<4} {}{}",
        card.id, pin, created, card.content_type, card.title, tags
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaptureSource, CardId, ContentType};
    use crate::services::fingerprint;

    fn card() -> Card {
        Card {
            id: CardId(3),
            content: "const x = 1".to_string(),
            content_type: ContentType::Code,
            title: "const x = 1".to_string(),
            created_at: Utc::now(),
            is_pinned: true,
            tags: vec!["snippet".to_string()],
            content_hash: fingerprint("const x = 1"),
            source: CaptureSource::Manual,
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            PanelCommand::parse(r#"{"command":"capture"}"#).unwrap(),
            PanelCommand::Capture
        );
        assert_eq!(
            PanelCommand::parse(r#"{"command":"paste","id":4}"#).unwrap(),
            PanelCommand::Paste { id: 4 }
        );
        assert_eq!(
            PanelCommand::parse(r#"{"command":"pin","id":1,"pinned":true}"#).unwrap(),
            PanelCommand::Pin { id: 1, pinned: true }
        );
        assert_eq!(
            PanelCommand::parse(r#"{"command":"untag","id":1,"tag":"x"}"#).unwrap(),
            PanelCommand::Untag { id: 1, tag: "x".to_string() }
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(PanelCommand::parse("capture").is_err());
        assert!(PanelCommand::parse(r#"{"command":"explode"}"#).is_err());
        assert!(PanelCommand::parse(r#"{"command":"paste"}"#).is_err());
        assert!(PanelCommand::parse(r#"{"command":"paste","id":"x"}"#).is_err());
    }

    #[test]
    fn test_message_json_shape() {
        let json = serde_json::to_value(PanelMessage::CardCreated { card: card() }).unwrap();
        assert_eq!(json["event"], "cardCreated");
        assert_eq!(json["card"]["contentType"], "code");
        assert_eq!(json["card"]["source"], "manual");

        let json = serde_json::to_value(PanelMessage::ShowPanel).unwrap();
        assert_eq!(json, serde_json::json!({"event": "showPanel"}));

        let json = serde_json::to_value(PanelMessage::Clipboard { text: None }).unwrap();
        assert_eq!(json, serde_json::json!({"event": "clipboard", "text": null}));

        let json = serde_json::to_value(PanelMessage::Captured { card: None }).unwrap();
        assert_eq!(json, serde_json::json!({"event": "captured", "card": null}));
    }

    #[test]
    fn test_from_core_event() {
        assert_eq!(
            PanelMessage::from(CoreEvent::HidePanel),
            PanelMessage::HidePanel
        );
        let card = card();
        assert_eq!(
            PanelMessage::from(CoreEvent::CardCreated(card.clone())),
            PanelMessage::CardCreated { card }
        );
    }

    #[test]
    fn test_render_json_is_one_line() {
        let line = OutputFormat::Json.render(&PanelMessage::Cards { cards: vec![card()] }, "%H:%M");
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_render_text() {
        let now = Utc::now();
        let text = render_text(&PanelMessage::CardCreated { card: card() }, "%H:%M", now);
        assert!(text.starts_with("+ [  3]^ "));
        assert!(text.contains("code const x = 1 #snippet"));

        let list = render_text(&PanelMessage::Cards { cards: vec![card(), card()] }, "%H:%M", now);
        assert_eq!(list.lines().count(), 2);
        assert!(list.contains("(just now)"));

        assert_eq!(
            render_text(&PanelMessage::Cards { cards: vec![] }, "%H:%M", now),
            "(no cards)\n"
        );
        assert_eq!(
            render_text(&PanelMessage::Error { message: "bad".into() }, "%H:%M", now),
            "error: bad\n"
        );
        assert_eq!(
            render_text(&PanelMessage::Captured { card: Some(card()) }, "%H:%M", now),
            "captured card 3\n"
        );
        assert_eq!(
            render_text(&PanelMessage::Captured { card: None }, "%H:%M", now),
            "nothing captured\n"
        );
    }
}
