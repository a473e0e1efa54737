//! Peer table for tracking discovered nodes
//!
//! Written by the discovery listener, read by the presentation layer. A peer
//! is recorded the first time its identity is announced and is never updated
//! or removed afterwards: there is no liveness tracking, and an address
//! change only takes effect after a restart.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Peer Discovery Flow                                            │
//! │  1. Listener decodes "<identity>:<port>" from a datagram        │
//! │  2. insert_if_new(identity, sender_ip:port)                     │
//! │  3. true  -> new peer, hand it to the sync dispatcher once      │
//! │     false -> already known, drop the announcement               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// A discovered remote node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    /// The peer's announced identity
    pub identity: Identity,
    /// Sender IP of the announcement plus the announced sync port
    pub address: SocketAddr,
    /// When we first saw this peer (Unix timestamp, seconds)
    pub discovered_at: i64,
}

impl PeerRecord {
    /// Create a record stamped with the current time
    pub fn new(identity: Identity, address: SocketAddr) -> Self {
        Self {
            identity,
            address,
            discovered_at: chrono::Utc::now().timestamp(),
        }
    }

    /// WebSocket URL of this peer's sync endpoint
    pub fn sync_url(&self) -> String {
        format!("ws://{}{}", self.address, crate::sync::SYNC_PATH)
    }
}

/// Concurrently accessed identity -> peer mapping
///
/// Cloning is cheap; clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct PeerTable {
    inner: Arc<RwLock<HashMap<Identity, PeerRecord>>>,
}

impl PeerTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` unless its identity is already known.
    ///
    /// The lookup and the insert happen under one write lock, so concurrent
    /// callers racing on the same identity see exactly one `true`.
    pub fn insert_if_new(&self, record: PeerRecord) -> bool {
        let mut peers = self.inner.write();
        if peers.contains_key(&record.identity) {
            return false;
        }
        peers.insert(record.identity.clone(), record);
        true
    }

    /// Look up a peer by identity
    pub fn get(&self, identity: &Identity) -> Option<PeerRecord> {
        self.inner.read().get(identity).cloned()
    }

    /// Whether `identity` is already known
    pub fn contains(&self, identity: &Identity) -> bool {
        self.inner.read().contains_key(identity)
    }

    /// Snapshot of all peers, sorted by identity for stable display
    pub fn list(&self) -> Vec<PeerRecord> {
        let mut peers: Vec<PeerRecord> = self.inner.read().values().cloned().collect();
        peers.sort_by(|a, b| a.identity.cmp(&b.identity));
        peers
    }

    /// Number of known peers
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether no peers are known yet
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
