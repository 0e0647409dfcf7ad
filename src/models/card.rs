//! Card data captured from the clipboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::services::fingerprint::Fingerprint;

/// Store-assigned card identifier. Strictly increasing within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub u64);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Semantic category of captured text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Url,
    Html,
    Code,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Url => "url",
            ContentType::Html => "html",
            ContentType::Code => "code",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Which path admitted a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    /// Watcher poll tick
    Poll,
    /// User-triggered capture (hotkey)
    Manual,
}

/// One captured clipboard entry.
///
/// Everything except `is_pinned` and `tags` is fixed at admission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    /// Trimmed clipboard text
    pub content: String,
    pub content_type: ContentType,
    /// Single-line summary for list display
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub is_pinned: bool,
    pub tags: Vec<String>,
    pub content_hash: Fingerprint,
    pub source: CaptureSource,
}

impl Card {
    /// Relative age for list display, e.g. "3m ago".
    pub fn age_str(&self, now: DateTime<Utc>) -> String {
        let age = now.signed_duration_since(self.created_at);
        let hours = age.num_hours();
        let minutes = age.num_minutes() % 60;

        if hours > 0 {
            format!("{}h {}m ago", hours, minutes)
        } else if minutes > 0 {
            format!("{}m ago", minutes)
        } else {
            "just now".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fingerprint::fingerprint;

    fn sample(created_at: DateTime<Utc>) -> Card {
        Card {
            id: CardId(7),
            content: "hello".to_string(),
            content_type: ContentType::Text,
            title: "hello".to_string(),
            created_at,
            is_pinned: false,
            tags: vec!["greeting".to_string()],
            content_hash: fingerprint("hello"),
            source: CaptureSource::Poll,
        }
    }

    #[test]
    fn test_card_serializes_camel_case() {
        let card = sample(Utc::now());
        let json = serde_json::to_value(&card).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["contentType"], "text");
        assert_eq!(json["isPinned"], false);
        assert_eq!(json["tags"][0], "greeting");
        assert_eq!(json["source"], "poll");
        assert_eq!(json["contentHash"].as_str().unwrap().len(), 64);
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_age_str() {
        let now = Utc::now();
        assert_eq!(sample(now).age_str(now), "just now");
        assert_eq!(
            sample(now - chrono::Duration::minutes(5)).age_str(now),
            "5m ago"
        );
        assert_eq!(
            sample(now - chrono::Duration::minutes(125)).age_str(now),
            "2h 5m ago"
        );
    }
}
