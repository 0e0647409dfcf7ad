//! paster - clipboard history core
//!
//! Watches the system clipboard, turns new text into cards, suppresses
//! repeats of the most recent card and keeps a bounded history that a
//! hotkey-driven panel can browse and paste from.

pub mod app;
pub mod config;
pub mod error;
pub mod models;
pub mod panel;
pub mod services;

pub use app::App;
pub use config::Config;
pub use error::{ClipboardError, PasteError, StoreError};
pub use models::{CaptureSource, Card, CardId, ContentType, CoreEvent};
