//! Content type detection for captured text.
//!
//! Substring heuristics, evaluated in precedence order: url, html, code, text.

use crate::models::ContentType;

const URL_MARKERS: &[&str] = &["http://", "https://"];

const CODE_MARKERS: &[&str] = &["function", "const", "class"];

/// Classify clipboard text. Total over all strings.
pub fn classify(text: &str) -> ContentType {
    if URL_MARKERS.iter().any(|m| text.contains(m)) {
        return ContentType::Url;
    }

    if text.contains('<') && text.contains('>') {
        return ContentType::Html;
    }

    if CODE_MARKERS.iter().any(|m| text.contains(m)) {
        return ContentType::Code;
    }

    ContentType::Text
}
