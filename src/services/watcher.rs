//! Clipboard watcher - polls the clipboard and admits new content as cards.
//!
//! The watcher is a cancellable repeating task. Poll ticks and manual
//! captures share one async lock around the read, compare and admit
//! sequence, so two admissions never interleave.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::ClipboardError;
use crate::models::{CaptureSource, Card, CoreEvent};
use crate::services::card_store::CardStore;
use crate::services::clipboard::ClipboardAccess;
use crate::services::fingerprint::{fingerprint, Fingerprint};

/// Timing for the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Fixed delay between clipboard reads
    pub poll_interval: Duration,
    /// Upper bound for a single clipboard read
    pub read_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            read_timeout: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherStatus {
    Stopped,
    Running,
}

/// Last clipboard value the watcher has accounted for.
#[derive(Debug, Default)]
struct LastSeen {
    /// False until one read has succeeded since start
    primed: bool,
    fingerprint: Option<Fingerprint>,
}

struct Shared {
    clipboard: ClipboardAccess,
    store: Arc<Mutex<CardStore>>,
    events: broadcast::Sender<CoreEvent>,
    last_seen: TokioMutex<LastSeen>,
}

struct PollTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Watches the clipboard and feeds new text to the card store.
pub struct ClipboardWatcher {
    shared: Arc<Shared>,
    settings: PollSettings,
    task: TokioMutex<Option<PollTask>>,
}

impl ClipboardWatcher {
    pub fn new(
        clipboard: ClipboardAccess,
        store: Arc<Mutex<CardStore>>,
        events: broadcast::Sender<CoreEvent>,
        settings: PollSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                clipboard,
                store,
                events,
                last_seen: TokioMutex::new(LastSeen::default()),
            }),
            settings,
            task: TokioMutex::new(None),
        }
    }

    pub async fn status(&self) -> WatcherStatus {
        if self.task.lock().await.is_some() {
            WatcherStatus::Running
        } else {
            WatcherStatus::Stopped
        }
    }

    /// Prime last-seen from the current clipboard and begin polling.
    ///
    /// Whatever is on the clipboard at start is not turned into a card.
    /// Calling `start` while running does nothing.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            debug!("Watcher already running");
            return;
        }

        self.shared.prime().await;

        let token = CancellationToken::new();
        let handle = spawn_poll_loop(
            Arc::clone(&self.shared),
            token.clone(),
            self.settings.poll_interval,
        );
        *task = Some(PollTask { token, handle });

        info!(
            interval_ms = self.settings.poll_interval.as_millis() as u64,
            "Clipboard watcher started"
        );
    }

    /// Cancel polling and wait for the loop to exit.
    ///
    /// No admission happens after this returns. Calling `stop` while stopped
    /// does nothing.
    pub async fn stop(&self) {
        let Some(PollTask { token, handle }) = self.task.lock().await.take() else {
            return;
        };

        token.cancel();
        if let Err(e) = handle.await {
            warn!("Poll loop ended abnormally: {}", e);
        }
        info!("Clipboard watcher stopped");
    }

    /// Run one poll tick immediately, without the running loop.
    #[cfg(test)]
    pub(crate) async fn tick(&self) -> Option<Card> {
        self.shared.poll_once(None).await
    }

    /// Read the clipboard and admit it now, outside the poll cadence.
    ///
    /// Unlike a tick this does not skip content the watcher has already
    /// seen, so content present at start can still be captured. Head
    /// duplicates are still rejected by the store.
    pub async fn capture_now(&self) -> Option<Card> {
        self.shared.capture().await
    }
}

impl Drop for ClipboardWatcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.token.cancel();
        }
    }
}

fn spawn_poll_loop(
    shared: Arc<Shared>,
    token: CancellationToken,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick is immediate; priming already read this instant.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    shared.poll_once(Some(&token)).await;
                }
            }
        }

        debug!("Poll loop exited");
    })
}

impl Shared {
    async fn read_text(&self) -> Option<String> {
        match self.clipboard.read_text().await {
            Ok(text) => Some(text.unwrap_or_default()),
            Err(ClipboardError::Busy) => {
                debug!("Clipboard read still pending; skipped");
                None
            }
            Err(e) => {
                warn!("Clipboard read failed: {}", e);
                None
            }
        }
    }

    async fn prime(&self) {
        let mut last_seen = self.last_seen.lock().await;
        *last_seen = LastSeen::default();

        if let Some(text) = self.read_text().await {
            last_seen.primed = true;
            last_seen.fingerprint = non_empty_fingerprint(&text);
            debug!(fingerprint = ?last_seen.fingerprint, "Primed clipboard watcher");
        }
    }

    async fn poll_once(&self, token: Option<&CancellationToken>) -> Option<Card> {
        let mut last_seen = self.last_seen.lock().await;
        let text = self.read_text().await?;

        let Some(hash) = non_empty_fingerprint(&text) else {
            trace!("Clipboard empty");
            last_seen.primed = true;
            return None;
        };

        if !last_seen.primed {
            debug!(%hash, "Primed clipboard watcher on first successful read");
            last_seen.primed = true;
            last_seen.fingerprint = Some(hash);
            return None;
        }

        if last_seen.fingerprint == Some(hash) {
            trace!("Clipboard unchanged");
            return None;
        }

        // Record the change before admitting so it is never processed twice.
        last_seen.fingerprint = Some(hash);

        if token.is_some_and(|t| t.is_cancelled()) {
            debug!("Watcher stopping; skipped admission");
            return None;
        }

        self.admit(&text, CaptureSource::Poll)
    }

    async fn capture(&self) -> Option<Card> {
        let mut last_seen = self.last_seen.lock().await;
        let text = self.read_text().await?;

        let Some(hash) = non_empty_fingerprint(&text) else {
            debug!("Nothing to capture; clipboard empty");
            return None;
        };

        last_seen.primed = true;
        last_seen.fingerprint = Some(hash);

        self.admit(&text, CaptureSource::Manual)
    }

    fn admit(&self, text: &str, source: CaptureSource) -> Option<Card> {
        let card = self.store.lock().admit(text, source)?;

        info!(
            id = %card.id,
            content_type = %card.content_type,
            title = %card.title,
            "Card created"
        );
        if self.events.send(CoreEvent::CardCreated(card.clone())).is_err() {
            trace!("No subscribers for card event");
        }

        Some(card)
    }
}

fn non_empty_fingerprint(text: &str) -> Option<Fingerprint> {
    (!text.trim().is_empty()).then(|| fingerprint(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentType;
    use crate::services::clipboard::MemoryClipboard;
    use tokio::sync::broadcast::error::TryRecvError;

    struct Harness {
        clipboard: MemoryClipboard,
        store: Arc<Mutex<CardStore>>,
        events: broadcast::Receiver<CoreEvent>,
        watcher: ClipboardWatcher,
    }

    fn harness(initial: Option<&str>, poll_interval: Duration) -> Harness {
        let clipboard = match initial {
            Some(text) => MemoryClipboard::with_text(text),
            None => MemoryClipboard::new(),
        };
        harness_on(clipboard, poll_interval)
    }

    fn harness_on(clipboard: MemoryClipboard, poll_interval: Duration) -> Harness {
        let store = Arc::new(Mutex::new(CardStore::default()));
        let (tx, events) = broadcast::channel(16);
        let settings = PollSettings {
            poll_interval,
            read_timeout: Duration::from_secs(1),
        };
        let watcher = ClipboardWatcher::new(
            ClipboardAccess::new(Arc::new(clipboard.clone()), settings.read_timeout),
            Arc::clone(&store),
            tx,
            settings,
        );
        Harness {
            clipboard,
            store,
            events,
            watcher,
        }
    }

    /// Interval long enough that only manual ticks run.
    const MANUAL: Duration = Duration::from_secs(3600);

    fn created(event: CoreEvent) -> Card {
        match event {
            CoreEvent::CardCreated(card) => card,
            other => panic!("Expected CardCreated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_priming_suppresses_existing_content() {
        let mut h = harness(Some("X"), MANUAL);
        h.watcher.start().await;

        assert!(h.watcher.tick().await.is_none());
        assert_eq!(h.events.try_recv().unwrap_err(), TryRecvError::Empty);

        h.clipboard.set("Y");
        let card = h.watcher.tick().await.unwrap();
        assert_eq!(card.content, "Y");
        assert_eq!(card.source, CaptureSource::Poll);
        assert_eq!(created(h.events.try_recv().unwrap()), card);

        h.watcher.stop().await;
    }

    #[tokio::test]
    async fn test_unchanged_clipboard_is_noop() {
        let mut h = harness(None, MANUAL);
        h.watcher.start().await;

        h.clipboard.set("hello");
        assert!(h.watcher.tick().await.is_some());
        assert!(h.watcher.tick().await.is_none());
        h.clipboard.set("  hello\n");
        assert!(h.watcher.tick().await.is_none());

        assert_eq!(h.store.lock().len(), 1);
        h.events.try_recv().unwrap();
        assert_eq!(h.events.try_recv().unwrap_err(), TryRecvError::Empty);
        h.watcher.stop().await;
    }

    #[tokio::test]
    async fn test_whitespace_clipboard_is_noop() {
        let h = harness(None, MANUAL);
        h.watcher.start().await;

        h.clipboard.set("   \n");
        assert!(h.watcher.tick().await.is_none());
        assert!(h.store.lock().is_empty());
        h.watcher.stop().await;
    }

    #[tokio::test]
    async fn test_read_failure_is_retried_next_tick() {
        let h = harness(None, MANUAL);
        h.watcher.start().await;

        h.clipboard.set("Z");
        h.clipboard.fail_next_reads(1);
        assert!(h.watcher.tick().await.is_none());

        let card = h.watcher.tick().await.unwrap();
        assert_eq!(card.content, "Z");
        h.watcher.stop().await;
    }

    #[tokio::test]
    async fn test_failed_priming_primes_on_next_read() {
        let clipboard = MemoryClipboard::with_text("already there");
        clipboard.fail_next_reads(1);
        let h = harness_on(clipboard, MANUAL);

        h.watcher.start().await;
        assert!(h.watcher.tick().await.is_none());
        assert!(h.store.lock().is_empty());

        h.clipboard.set("new");
        assert_eq!(h.watcher.tick().await.unwrap().content, "new");
        h.watcher.stop().await;
    }

    #[tokio::test]
    async fn test_capture_now_admits_primed_content_once() {
        let mut h = harness(Some("X"), MANUAL);
        h.watcher.start().await;

        let card = h.watcher.capture_now().await.unwrap();
        assert_eq!(card.content, "X");
        assert_eq!(card.source, CaptureSource::Manual);

        // last-seen was updated, so the next tick does not re-admit
        assert!(h.watcher.tick().await.is_none());
        // head duplicate
        assert!(h.watcher.capture_now().await.is_none());

        assert_eq!(created(h.events.try_recv().unwrap()).id, card.id);
        assert_eq!(h.events.try_recv().unwrap_err(), TryRecvError::Empty);
        h.watcher.stop().await;
    }

    #[tokio::test]
    async fn test_capture_now_with_empty_clipboard() {
        let h = harness(None, MANUAL);
        assert!(h.watcher.capture_now().await.is_none());
        assert!(h.store.lock().is_empty());
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let h = harness(Some("X"), MANUAL);
        assert_eq!(h.watcher.status().await, WatcherStatus::Stopped);
        h.watcher.stop().await;

        h.watcher.start().await;
        h.watcher.start().await;
        assert_eq!(h.watcher.status().await, WatcherStatus::Running);

        h.watcher.stop().await;
        h.watcher.stop().await;
        assert_eq!(h.watcher.status().await, WatcherStatus::Stopped);
    }

    #[tokio::test]
    async fn test_poll_loop_admits_and_stop_halts_it() {
        let mut h = harness(None, Duration::from_millis(10));
        h.watcher.start().await;

        h.clipboard.set("https://a.com");
        let event = time::timeout(Duration::from_secs(2), h.events.recv())
            .await
            .expect("timed out waiting for card")
            .unwrap();
        let card = created(event);
        assert_eq!(card.content_type, ContentType::Url);

        h.watcher.stop().await;
        h.clipboard.set("after stop");
        time::sleep(Duration::from_millis(60)).await;

        assert_eq!(h.events.try_recv().unwrap_err(), TryRecvError::Empty);
        assert_eq!(h.store.lock().len(), 1);
    }
}
