//! Data models for captured clipboard cards.

pub mod card;
pub mod event;

pub use card::{CaptureSource, Card, CardId, ContentType};
pub use event::CoreEvent;
