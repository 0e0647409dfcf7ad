//! Title generation for card list display.

/// Maximum visible characters kept before the ellipsis marker.
pub const TITLE_MAX_CHARS: usize = 30;

const ELLIPSIS: &str = "...";

/// Derive a single-line title: newlines become spaces, then trim and truncate.
pub fn summarize(text: &str) -> String {
    let flattened = text.replace("\r\n", " ").replace(['\n', '\r'], " ");
    let title = flattened.trim();

    if title.chars().count() > TITLE_MAX_CHARS {
        let mut truncated: String = title.chars().take(TITLE_MAX_CHARS).collect();
        truncated.push_str(ELLIPSIS);
        truncated
    } else {
        title.to_string()
    }
}
