//! Error types for the clipboard core.

use std::time::Duration;
use thiserror::Error;

use crate::models::CardId;

/// Platform clipboard failure. Always transient from the core's point of view.
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("Clipboard access timed out after {0:?}")]
    Timeout(Duration),

    /// An earlier call of the same kind has not returned from the backend yet.
    #[error("Clipboard busy: previous access still in progress")]
    Busy,

    #[error("Clipboard backend error: {0}")]
    Backend(String),
}

impl From<arboard::Error> for ClipboardError {
    fn from(e: arboard::Error) -> Self {
        match e {
            arboard::Error::ClipboardNotSupported => ClipboardError::Unavailable(e.to_string()),
            other => ClipboardError::Backend(other.to_string()),
        }
    }
}

/// Rejected card mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Card not found: {0}")]
    CardNotFound(CardId),

    #[error("Tag must not be empty")]
    EmptyTag,

    #[error("Cannot pin more than {} of {capacity} cards", .capacity - 1)]
    PinLimit { capacity: usize },
}

/// Failure to stage a stored card back onto the clipboard.
#[derive(Debug, Error)]
pub enum PasteError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
}
