//! In-memory message store
//!
//! Holds two views of the conversation:
//!
//! - the **local sequence**: messages this node authored, in send order.
//!   This is the only thing a node ever serves to peers.
//! - the **merged table**: every message seen locally or pulled from any
//!   peer, keyed by id. A second write for the same id replaces the first.
//!
//! Display order is computed on read by sorting on timestamp, then on
//! arrival order.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::message::Message;
use crate::identity::Identity;

/// Counts reported by [`MessageStore::merge`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Messages in the incoming batch
    pub received: usize,
    /// Ids that were not in the merged table before
    pub inserted: usize,
}

#[derive(Debug)]
struct MergedEntry {
    /// Monotonic arrival counter, used to break timestamp ties
    arrival: u64,
    message: Message,
}

#[derive(Debug, Default)]
struct StoreInner {
    local: Vec<Message>,
    merged: HashMap<String, MergedEntry>,
    next_arrival: u64,
}

impl StoreInner {
    /// Returns true if the id was new.
    fn upsert(&mut self, message: Message) -> bool {
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        self.merged
            .insert(message.id.clone(), MergedEntry { arrival, message })
            .is_none()
    }
}

/// Thread-safe handle to the node's messages
///
/// Cloning is cheap; clones share the same store.
#[derive(Debug, Clone)]
pub struct MessageStore {
    identity: Identity,
    inner: Arc<RwLock<StoreInner>>,
}

impl MessageStore {
    /// Create an empty store for messages authored as `identity`
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            inner: Arc::new(RwLock::new(StoreInner::default())),
        }
    }

    /// The identity local messages are authored under
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Author a message now.
    ///
    /// Empty or whitespace-only bodies are ignored and return `None`.
    pub fn append_local(&self, body: &str) -> Option<Message> {
        self.append_local_at(body, chrono::Utc::now().timestamp())
    }

    /// Author a message with an explicit timestamp.
    pub fn append_local_at(&self, body: &str, timestamp: i64) -> Option<Message> {
        let body = body.trim();
        if body.is_empty() {
            return None;
        }

        let message = Message::new(&self.identity, timestamp, body);
        let mut inner = self.inner.write();
        inner.local.push(message.clone());
        inner.upsert(message.clone());
        Some(message)
    }

    /// Merge messages pulled from a peer. Merging the same message again has no further effect.
    pub fn merge<I>(&self, incoming: I) -> MergeStats
    where
        I: IntoIterator<Item = Message>,
    {
        let mut stats = MergeStats::default();
        let mut inner = self.inner.write();
        for message in incoming {
            stats.received += 1;
            if inner.upsert(message) {
                stats.inserted += 1;
            }
        }
        trace!(received = stats.received, inserted = stats.inserted, "Merged messages");
        stats
    }

    /// Messages to serve to a peer: only what this node authored.
    pub fn snapshot_for_peer(&self) -> Vec<Message> {
        self.inner.read().local.clone()
    }

    /// Every known message ordered by timestamp, then arrival.
    pub fn snapshot_for_display(&self) -> Vec<Message> {
        let inner = self.inner.read();
        let mut entries: Vec<&MergedEntry> = inner.merged.values().collect();
        entries.sort_by_key(|e| (e.message.timestamp, e.arrival));
        entries.into_iter().map(|e| e.message.clone()).collect()
    }

    /// Whether `id` is present in the merged table
    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().merged.contains_key(id)
    }

    /// Number of locally authored messages
    pub fn local_len(&self) -> usize {
        self.inner.read().local.len()
    }

    /// Number of distinct message ids known
    pub fn merged_len(&self) -> usize {
        self.inner.read().merged.len()
    }
}
