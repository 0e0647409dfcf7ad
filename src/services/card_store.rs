//! Card store - bounded, most-recent-first clipboard history.

use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, trace};

use crate::error::StoreError;
use crate::models::{CaptureSource, Card, CardId};
use crate::services::classifier::classify;
use crate::services::fingerprint::{fingerprint, Fingerprint};
use crate::services::summarizer::summarize;

/// Default history bound.
pub const DEFAULT_CAPACITY: usize = 50;

/// Owns card identity, ordering and eviction.
///
/// Duplicate suppression only looks at the head card: re-copying older
/// content produces a fresh card. The fingerprint multiset mirrors the
/// retained cards so eviction bookkeeping stays exact when the same content
/// appears more than once.
#[derive(Debug)]
pub struct CardStore {
    cards: VecDeque<Card>,
    active: HashMap<Fingerprint, usize>,
    capacity: usize,
    next_id: u64,
}

impl Default for CardStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CardStore {
    /// Create an empty store. Capacities below 2 are raised to 2.
    pub fn new(capacity: usize) -> Self {
        Self {
            cards: VecDeque::new(),
            active: HashMap::new(),
            capacity: capacity.max(2),
            next_id: 1,
        }
    }

    /// Admit raw clipboard text as a new card.
    ///
    /// Returns `None` for whitespace-only input and for a duplicate of the
    /// current head card.
    pub fn admit(&mut self, raw: &str, source: CaptureSource) -> Option<Card> {
        let content = raw.trim();
        if content.is_empty() {
            trace!("Rejected empty clipboard content");
            return None;
        }

        let hash = fingerprint(content);
        if self.cards.front().is_some_and(|head| head.content_hash == hash) {
            debug!(%hash, "Rejected duplicate of head card");
            return None;
        }

        let card = Card {
            id: CardId(self.next_id),
            content: content.to_string(),
            content_type: classify(content),
            title: summarize(content),
            created_at: Utc::now(),
            is_pinned: false,
            tags: Vec::new(),
            content_hash: hash,
            source,
        };
        self.next_id += 1;

        self.cards.push_front(card.clone());
        *self.active.entry(hash).or_insert(0) += 1;
        self.evict_overflow();

        Some(card)
    }

    /// Drop the oldest unpinned cards until the store fits its capacity.
    fn evict_overflow(&mut self) {
        while self.cards.len() > self.capacity {
            let Some(index) = self.cards.iter().rposition(|c| !c.is_pinned) else {
                break;
            };
            if let Some(evicted) = self.cards.remove(index) {
                debug!(id = %evicted.id, "Evicted card");
                self.release(evicted.content_hash);
            }
        }
        debug_assert!(
            self.cards.len() <= self.capacity,
            "store holds {} cards, capacity {}",
            self.cards.len(),
            self.capacity
        );
    }

    fn release(&mut self, hash: Fingerprint) {
        if let Some(count) = self.active.get_mut(&hash) {
            *count -= 1;
            if *count == 0 {
                self.active.remove(&hash);
            }
        }
    }

    /// Snapshot of the full history, most recent first.
    pub fn all(&self) -> Vec<Card> {
        self.cards.iter().cloned().collect()
    }

    pub fn get(&self, id: CardId) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether any retained card carries this fingerprint.
    pub fn contains_fingerprint(&self, hash: &Fingerprint) -> bool {
        self.active.contains_key(hash)
    }

    /// Pin or unpin a card. Pinned cards are never evicted.
    ///
    /// At most `capacity - 1` cards may be pinned so admission can always
    /// make room.
    pub fn set_pinned(&mut self, id: CardId, pinned: bool) -> Result<Card, StoreError> {
        let pinned_count = self.cards.iter().filter(|c| c.is_pinned).count();
        let capacity = self.capacity;
        let card = self.card_mut(id)?;

        if pinned && !card.is_pinned && pinned_count >= capacity - 1 {
            return Err(StoreError::PinLimit { capacity });
        }

        card.is_pinned = pinned;
        Ok(card.clone())
    }

    /// Attach a tag. Tags are trimmed and kept unique, in insertion order.
    pub fn add_tag(&mut self, id: CardId, tag: &str) -> Result<Card, StoreError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(StoreError::EmptyTag);
        }

        let card = self.card_mut(id)?;
        if !card.tags.iter().any(|t| t == tag) {
            card.tags.push(tag.to_string());
        }
        Ok(card.clone())
    }

    /// Detach a tag. Returns whether the tag was present.
    pub fn remove_tag(&mut self, id: CardId, tag: &str) -> Result<bool, StoreError> {
        let tag = tag.trim();
        let card = self.card_mut(id)?;
        let before = card.tags.len();
        card.tags.retain(|t| t != tag);
        Ok(card.tags.len() != before)
    }

    /// Remove every card and fingerprint.
    pub fn clear(&mut self) {
        self.cards.clear();
        self.active.clear();
    }

    fn card_mut(&mut self, id: CardId) -> Result<&mut Card, StoreError> {
        self.cards
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::CardNotFound(id))
    }
}
