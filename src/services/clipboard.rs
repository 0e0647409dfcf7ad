//! Clipboard operations.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use crate::error::ClipboardError;

/// Text access to a clipboard.
///
/// Calls may block; the watcher runs them on the blocking pool under a
/// timeout.
pub trait ClipboardBackend: Send + Sync {
    /// Current clipboard text, or `None` when the clipboard holds no text.
    fn read_text(&self) -> Result<Option<String>, ClipboardError>;

    /// Replace the clipboard contents with `text`.
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// The system clipboard, through arboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl ClipboardBackend for SystemClipboard {
    fn read_text(&self) -> Result<Option<String>, ClipboardError> {
        let mut clipboard = arboard::Clipboard::new()?;
        match clipboard.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard = arboard::Clipboard::new()?;
        clipboard.set_text(text)?;
        Ok(())
    }
}

/// Async access to a backend. Each call runs on the blocking pool and fails
/// with [`ClipboardError::Timeout`] if it does not finish in time.
///
/// At most one read and one write are outstanding on the backend at once.
/// A timed-out call keeps its slot until the backend returns; calls made in
/// the meantime fail with [`ClipboardError::Busy`] without spawning.
/// Clones share the slots.
#[derive(Clone)]
pub struct ClipboardAccess {
    backend: Arc<dyn ClipboardBackend>,
    timeout: Duration,
    reading: InFlight,
    writing: InFlight,
}

impl ClipboardAccess {
    pub fn new(backend: Arc<dyn ClipboardBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            reading: InFlight::default(),
            writing: InFlight::default(),
        }
    }

    pub async fn read_text(&self) -> Result<Option<String>, ClipboardError> {
        let backend = Arc::clone(&self.backend);
        self.bounded(&self.reading, move || backend.read_text()).await
    }

    pub async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let backend = Arc::clone(&self.backend);
        let text = text.to_string();
        self.bounded(&self.writing, move || backend.write_text(&text))
            .await
    }

    async fn bounded<T, F>(&self, slot: &InFlight, call: F) -> Result<T, ClipboardError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, ClipboardError> + Send + 'static,
    {
        let guard = slot.try_acquire().ok_or(ClipboardError::Busy)?;
        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            call()
        });

        match time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ClipboardError::Backend(join_error.to_string())),
            Err(_) => Err(ClipboardError::Timeout(self.timeout)),
        }
    }
}

/// Shared flag marking a backend call as outstanding.
#[derive(Debug, Default, Clone)]
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn try_acquire(&self) -> Option<InFlightGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(Arc::clone(&self.0)))
    }
}

/// Releases the slot when the backend call returns, or panics.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// In-process clipboard. Clones share the same contents.
///
/// Used by tests and headless runs; supports injecting read failures.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    text: Arc<Mutex<Option<String>>>,
    failing_reads: Arc<AtomicUsize>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: &str) -> Self {
        let clipboard = Self::new();
        clipboard.set(text);
        clipboard
    }

    /// Simulate another application copying `text`.
    pub fn set(&self, text: &str) {
        *self.text.lock() = Some(text.to_string());
    }

    pub fn get(&self) -> Option<String> {
        self.text.lock().clone()
    }

    /// Make the next `count` reads fail.
    pub fn fail_next_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }
}

impl ClipboardBackend for MemoryClipboard {
    fn read_text(&self) -> Result<Option<String>, ClipboardError> {
        let pending = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(ClipboardError::Backend("injected read failure".to_string()));
        }
        Ok(self.get())
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.set(text);
        Ok(())
    }
}
