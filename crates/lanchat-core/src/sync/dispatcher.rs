//! Sync dispatcher
//!
//! Pulls each newly discovered peer's message dump exactly once.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  SyncDispatcher                                                 │
//! │  ├── dispatch(peer) -> JoinHandle<SyncOutcome>                  │
//! │  │   └── one task per peer, no retry                            │
//! │  ├── permits: Semaphore                                         │
//! │  │   └── caps pulls in flight; extra tasks wait their turn      │
//! │  ├── outstanding: AtomicUsize                                   │
//! │  │   └── queued + running tasks                                 │
//! │  ├── tasks: abort handles                                       │
//! │  │   └── abort_all() cancels every queued or running pull       │
//! │  └── event_tx: broadcast::Sender<NodeEvent>                     │
//! │      └── PeerSynced / SyncFailed per finished task              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{broadcast, Semaphore};
use parking_lot::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use super::events::{NodeEvent, SyncOutcome};
use super::protocol::WireMessage;
use crate::chat::{Message, MessageStore};
use crate::error::{NodeError, NodeResult};
use crate::peers::PeerRecord;

/// Decrements the outstanding counter when a task ends, including on abort.
struct OutstandingGuard(Arc<AtomicUsize>);

impl Drop for OutstandingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Abort handles of live pulls. Once closed, new pulls are cancelled on spawn.
#[derive(Default)]
struct TaskRegistry {
    handles: Vec<AbortHandle>,
    closed: bool,
}

/// Spawns one bounded pull task per discovered peer
#[derive(Clone)]
pub struct SyncDispatcher {
    store: MessageStore,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    outstanding: Arc<AtomicUsize>,
    tasks: Arc<Mutex<TaskRegistry>>,
    timeout: Duration,
    event_tx: broadcast::Sender<NodeEvent>,
}

impl SyncDispatcher {
    /// Create a dispatcher merging into `store`
    pub fn new(
        store: MessageStore,
        max_concurrent: usize,
        timeout: Duration,
        event_tx: broadcast::Sender<NodeEvent>,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            store,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            outstanding: Arc::new(AtomicUsize::new(0)),
            tasks: Arc::new(Mutex::new(TaskRegistry::default())),
            timeout,
            event_tx,
        }
    }

    /// Number of dispatched tasks that have not finished yet
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Maximum number of pulls running at the same time
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Pull `peer` once in the background.
    ///
    /// The task never retries. Its outcome is returned through the handle and
    /// also broadcast as a [`NodeEvent`].
    pub fn dispatch(&self, peer: PeerRecord) -> JoinHandle<SyncOutcome> {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let guard = OutstandingGuard(self.outstanding.clone());
        let this = self.clone();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let _permit = this.permits.clone().acquire_owned().await;

            let outcome = match fetch_messages(&peer, this.timeout).await {
                Ok(messages) => {
                    let stats = this.store.merge(messages);
                    info!(
                        identity = %peer.identity,
                        received = stats.received,
                        inserted = stats.inserted,
                        "Synced with peer"
                    );
                    SyncOutcome::Synced {
                        identity: peer.identity.clone(),
                        stats,
                    }
                }
                Err(e) => {
                    warn!(identity = %peer.identity, address = %peer.address, error = %e, "Sync with peer failed");
                    SyncOutcome::Failed {
                        identity: peer.identity.clone(),
                        error: e.to_string(),
                    }
                }
            };

            let _ = this.event_tx.send(NodeEvent::from(&outcome));
            outcome
        });

        let mut tasks = self.tasks.lock();
        if tasks.closed {
            handle.abort();
        } else {
            tasks.handles.retain(|h| !h.is_finished());
            tasks.handles.push(handle.abort_handle());
        }
        handle
    }

    /// Cancel every queued or running pull and refuse new ones.
    ///
    /// Cancelled pulls drop their connections.
    pub fn abort_all(&self) {
        let mut tasks = self.tasks.lock();
        tasks.closed = true;
        let aborted = tasks.handles.len();
        for handle in tasks.handles.drain(..) {
            handle.abort();
        }
        debug!(aborted, "Aborted sync pulls");
    }
}

/// Fetch a peer's message dump, bounded by `timeout`.
pub async fn fetch_messages(peer: &PeerRecord, timeout: Duration) -> NodeResult<Vec<Message>> {
    tokio::time::timeout(timeout, pull(&peer.sync_url()))
        .await
        .map_err(|_| NodeError::Timeout(timeout))?
}

async fn pull(url: &str) -> NodeResult<Vec<Message>> {
    let (mut ws, _response) = tokio_tungstenite::connect_async(url).await?;

    let wire = loop {
        match ws.next().await {
            Some(Ok(WsMessage::Text(text))) => break WireMessage::decode(text.as_bytes())?,
            Some(Ok(WsMessage::Binary(data))) => break WireMessage::decode(&data)?,
            Some(Ok(WsMessage::Close(_))) | None => {
                return Err(NodeError::Network(
                    "sync endpoint closed before sending messages".to_string(),
                ))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    };

    if let Err(e) = ws.close(None).await {
        debug!(%url, error = %e, "Close after sync pull failed");
    }
    Ok(wire.into_messages())
}
