//! Clipboard core services.

pub mod card_store;
pub mod classifier;
pub mod clipboard;
pub mod fingerprint;
pub mod summarizer;
pub mod watcher;

pub use card_store::CardStore;
pub use classifier::classify;
pub use clipboard::{ClipboardAccess, ClipboardBackend, MemoryClipboard, SystemClipboard};
pub use fingerprint::{fingerprint, Fingerprint};
pub use summarizer::summarize;
pub use watcher::{ClipboardWatcher, PollSettings, WatcherStatus};
