//! Main application state and event loop.
//!
//! `App` owns the card store, the clipboard watcher and the panel state, and
//! is the boundary the presentation and hotkey layers talk to.

use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ClipboardError, PasteError, StoreError};
use crate::models::{Card, CardId, CoreEvent};
use crate::panel::{OutputFormat, PanelCommand, PanelMessage};
use crate::services::{CardStore, ClipboardAccess, ClipboardBackend, ClipboardWatcher, WatcherStatus};

/// Events buffered per subscriber before it starts lagging.
const EVENT_BUFFER: usize = 64;

/// Outcome of handling one input line.
#[derive(Debug)]
enum Flow {
    Continue,
    Reply(PanelMessage),
    Quit,
}

/// Application state.
pub struct App {
    config: Arc<Config>,
    store: Arc<Mutex<CardStore>>,
    clipboard: ClipboardAccess,
    watcher: ClipboardWatcher,
    events: broadcast::Sender<CoreEvent>,
    panel_visible: bool,
}

impl App {
    /// Create a new application instance on top of a clipboard backend.
    pub fn new(config: Config, backend: Arc<dyn ClipboardBackend>) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let settings = config.poll_settings();

        let store = Arc::new(Mutex::new(CardStore::new(config.store.capacity)));
        let clipboard = ClipboardAccess::new(backend, settings.read_timeout);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let watcher = ClipboardWatcher::new(
            clipboard.clone(),
            Arc::clone(&store),
            events.clone(),
            settings,
        );

        Ok(Self {
            config,
            store,
            clipboard,
            watcher,
            events,
            panel_visible: false,
        })
    }

    /// Receive card and panel events.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub async fn start(&self) {
        self.watcher.start().await;
    }

    pub async fn stop(&self) {
        self.watcher.stop().await;
    }

    pub async fn watcher_status(&self) -> WatcherStatus {
        self.watcher.status().await
    }

    /// Full history snapshot, most recent first.
    pub fn all_cards(&self) -> Vec<Card> {
        self.store.lock().all()
    }

    /// Capture the clipboard immediately (copy hotkey).
    pub async fn capture_now(&self) -> Option<Card> {
        self.watcher.capture_now().await
    }

    /// Stage text on the clipboard. Injecting it into the foreground
    /// application is left to the caller.
    pub async fn paste_card_content(&self, text: &str) -> Result<(), ClipboardError> {
        self.clipboard.write_text(text).await
    }

    /// Stage a stored card's content on the clipboard.
    pub async fn paste_card(&self, id: CardId) -> Result<Card, PasteError> {
        let card = self
            .store
            .lock()
            .get(id)
            .cloned()
            .ok_or(StoreError::CardNotFound(id))?;

        self.paste_card_content(&card.content).await?;
        info!(id = %card.id, "Staged card on clipboard");
        Ok(card)
    }

    /// Current clipboard text, without capturing it.
    pub async fn clipboard_text(&self) -> Option<String> {
        match self.clipboard.read_text().await {
            Ok(text) => text.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!("Clipboard read failed: {}", e);
                None
            }
        }
    }

    pub fn set_pinned(&self, id: CardId, pinned: bool) -> Result<Card, StoreError> {
        self.store.lock().set_pinned(id, pinned)
    }

    pub fn add_tag(&self, id: CardId, tag: &str) -> Result<Card, StoreError> {
        self.store.lock().add_tag(id, tag)
    }

    pub fn remove_tag(&self, id: CardId, tag: &str) -> Result<Card, StoreError> {
        let mut store = self.store.lock();
        if !store.remove_tag(id, tag)? {
            debug!(%id, tag, "Tag was not present");
        }
        store.get(id).cloned().ok_or(StoreError::CardNotFound(id))
    }

    pub fn show_panel(&mut self) {
        self.panel_visible = true;
        self.publish(CoreEvent::ShowPanel);
    }

    pub fn hide_panel(&mut self) {
        self.panel_visible = false;
        self.publish(CoreEvent::HidePanel);
    }

    pub fn is_panel_visible(&self) -> bool {
        self.panel_visible
    }

    fn publish(&self, event: CoreEvent) {
        if self.events.send(event).is_err() {
            debug!("No subscribers for panel event");
        }
    }

    /// Stop watching and drop the history.
    pub async fn shutdown(&self) {
        self.watcher.stop().await;
        self.store.lock().clear();
    }

    /// Run against stdin/stdout until input ends, `quit`, or Ctrl-C.
    pub async fn run(&mut self, format: OutputFormat) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.run_with(stdin, stdout, format).await
    }

    /// Run the event loop over arbitrary input and output streams.
    pub async fn run_with<R, W>(&mut self, input: R, mut output: W, format: OutputFormat) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let events = self.subscribe();
        self.start().await;

        let result = self.event_loop(events, input, &mut output, format).await;

        self.shutdown().await;
        result
    }

    /// Main event loop.
    async fn event_loop<R, W>(
        &mut self,
        mut events: broadcast::Receiver<CoreEvent>,
        input: R,
        output: &mut W,
        format: OutputFormat,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let date_format = self.config.display.date_format.clone();
        let mut lines = input.lines();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Ok(event) => {
                        write_message(output, format, &PanelMessage::from(event), &date_format).await?;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event output fell behind");
                    }
                    Err(RecvError::Closed) => break,
                },
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("Input closed");
                        break;
                    };
                    match self.handle_line(&line).await {
                        Flow::Continue => {}
                        Flow::Reply(message) => {
                            write_message(output, format, &message, &date_format).await?;
                        }
                        Flow::Quit => break,
                    }
                }
                _ = &mut ctrl_c => {
                    info!("Interrupted");
                    break;
                }
            }
        }

        // Deliver events published before the loop ended.
        loop {
            match events.try_recv() {
                Ok(event) => write_message(output, format, &PanelMessage::from(event), &date_format).await?,
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }

        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }

        match PanelCommand::parse(line) {
            Ok(command) => self.handle_command(command).await,
            Err(e) => {
                warn!("Rejected panel command: {}", e);
                Flow::Reply(error_message(format!("Invalid command: {}", e)))
            }
        }
    }

    async fn handle_command(&mut self, command: PanelCommand) -> Flow {
        debug!(?command, "Panel command");

        match command {
            PanelCommand::Capture => {
                let card = self.capture_now().await;
                if card.is_none() {
                    debug!("Capture produced no card");
                }
                Flow::Reply(PanelMessage::Captured { card })
            }
            PanelCommand::List => Flow::Reply(PanelMessage::Cards {
                cards: self.all_cards(),
            }),
            PanelCommand::Peek => Flow::Reply(PanelMessage::Clipboard {
                text: self.clipboard_text().await,
            }),
            PanelCommand::Paste { id } => match self.paste_card(CardId(id)).await {
                Ok(_) => Flow::Reply(PanelMessage::Pasted { id }),
                Err(e) => Flow::Reply(error_message(e)),
            },
            PanelCommand::Pin { id, pinned } => card_reply(self.set_pinned(CardId(id), pinned)),
            PanelCommand::Tag { id, tag } => card_reply(self.add_tag(CardId(id), &tag)),
            PanelCommand::Untag { id, tag } => card_reply(self.remove_tag(CardId(id), &tag)),
            PanelCommand::Show => {
                self.show_panel();
                Flow::Continue
            }
            PanelCommand::Hide => {
                self.hide_panel();
                Flow::Continue
            }
            PanelCommand::Quit => Flow::Quit,
        }
    }
}

fn card_reply(result: Result<Card, StoreError>) -> Flow {
    match result {
        Ok(card) => Flow::Reply(PanelMessage::CardUpdated { card }),
        Err(e) => Flow::Reply(error_message(e)),
    }
}

fn error_message(e: impl std::fmt::Display) -> PanelMessage {
    PanelMessage::Error {
        message: e.to_string(),
    }
}

async fn write_message<W>(
    output: &mut W,
    format: OutputFormat,
    message: &PanelMessage,
    date_format: &str,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    output
        .write_all(format.render(message, date_format).as_bytes())
        .await?;
    output.flush().await?;
    Ok(())
}
