//! ChatEngine - the primary entry point for a LAN chat node
//!
//! ChatEngine wires identity, discovery, the message store, and sync:
//! - binds the sync server and the discovery listener (fatal on failure)
//! - broadcasts our identity and sync port on the discovery port
//! - pulls every newly discovered peer once
//! - exposes the presentation boundary: `submit`, `messages`, `peers`, `subscribe`
//!
//! # Example
//!
//! ```ignore
//! use lanchat_core::{ChatEngine, NodeConfig};
//!
//! let engine = ChatEngine::start(NodeConfig::default()).await?;
//! engine.submit("hello, LAN");
//!
//! let mut events = engine.subscribe();
//! while let Ok(event) = events.recv().await {
//!     if event.changes_messages() {
//!         for message in engine.messages() {
//!             println!("[{}] {}: {}", message.clock_time(), message.id, message.body);
//!         }
//!     }
//! }
//! ```

use std::net::{SocketAddr, SocketAddrV4};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::chat::{Message, MessageStore};
use crate::config::NodeConfig;
use crate::discovery::{spawn_discovery, DiscoveryTasks};
use crate::error::NodeResult;
use crate::identity::{choose_port, Identity};
use crate::peers::{PeerRecord, PeerTable};
use crate::sync::{NodeEvent, SyncDispatcher, SyncServer};

/// Default capacity for the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Resolve the configured identity, falling back to the local IPv4 address
pub fn resolve_identity(config: &NodeConfig) -> NodeResult<Identity> {
    match &config.identity {
        Some(explicit) => Identity::new(explicit.clone()),
        None => Identity::resolve(),
    }
}

/// A running chat node
///
/// All background tasks are owned by the engine and stop on [`shutdown`](Self::shutdown)
/// or when the engine is dropped.
pub struct ChatEngine {
    identity: Identity,
    sync_addr: SocketAddr,
    discovery_addr: SocketAddr,
    peers: PeerTable,
    store: MessageStore,
    dispatcher: SyncDispatcher,
    event_tx: broadcast::Sender<NodeEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChatEngine {
    /// Start a node.
    ///
    /// Fails if no identity can be resolved or if the sync or discovery
    /// sockets cannot be bound. Nothing is left running on failure.
    pub async fn start(config: NodeConfig) -> NodeResult<Self> {
        let identity = resolve_identity(&config)?;

        let port = config
            .sync_port
            .unwrap_or_else(|| choose_port(config.sync_port_range.clone()));
        let bind = SocketAddr::V4(SocketAddrV4::new(config.bind_ip, port));

        let store = MessageStore::new(identity.clone());
        let peers = PeerTable::new();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let server = SyncServer::bind(bind, store.clone(), config.sync_timeout).await?;
        let sync_addr = server.local_addr()?;

        let (new_peer_tx, new_peer_rx) = mpsc::unbounded_channel();
        let discovery =
            spawn_discovery(&identity, sync_addr.port(), &config, peers.clone(), new_peer_tx)
                .await?;
        let DiscoveryTasks {
            listen_addr,
            broadcaster,
            listener,
        } = discovery;

        let dispatcher = SyncDispatcher::new(
            store.clone(),
            config.max_concurrent_syncs,
            config.sync_timeout,
            event_tx.clone(),
        );

        let server_task = tokio::spawn(server.run());
        let pump_task = tokio::spawn(Self::new_peer_pump(
            new_peer_rx,
            dispatcher.clone(),
            event_tx.clone(),
        ));

        info!(%identity, %sync_addr, discovery = %listen_addr, "Node started");

        Ok(Self {
            identity,
            sync_addr,
            discovery_addr: listen_addr,
            peers,
            store,
            dispatcher,
            event_tx,
            tasks: vec![broadcaster, listener, server_task, pump_task],
        })
    }

    /// Forward each newly discovered peer to the dispatcher, once.
    async fn new_peer_pump(
        mut new_peers: mpsc::UnboundedReceiver<PeerRecord>,
        dispatcher: SyncDispatcher,
        event_tx: broadcast::Sender<NodeEvent>,
    ) {
        while let Some(peer) = new_peers.recv().await {
            let _ = event_tx.send(NodeEvent::PeerDiscovered(peer.clone()));
            debug!(identity = %peer.identity, "Dispatching sync");
            // Fire and forget: the outcome arrives as a NodeEvent.
            let _ = dispatcher.dispatch(peer);
        }
    }

    /// This node's identity
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Address of the sync server; its port is what we announce
    pub fn sync_addr(&self) -> SocketAddr {
        self.sync_addr
    }

    /// Address the discovery listener is bound to
    pub fn discovery_addr(&self) -> SocketAddr {
        self.discovery_addr
    }

    /// Submit user text as a new local message.
    ///
    /// Empty or whitespace-only text is ignored and returns `None`.
    pub fn submit(&self, text: &str) -> Option<Message> {
        let message = self.store.append_local(text)?;
        debug!(id = %message.id, "Local message");
        let _ = self.event_tx.send(NodeEvent::LocalMessage(message.clone()));
        Some(message)
    }

    /// All known messages in display order
    pub fn messages(&self) -> Vec<Message> {
        self.store.snapshot_for_display()
    }

    /// All known peers
    pub fn peers(&self) -> Vec<PeerRecord> {
        self.peers.list()
    }

    /// Shared handle to the message store
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Shared handle to the peer table
    pub fn peer_table(&self) -> &PeerTable {
        &self.peers
    }

    /// Number of sync pulls queued or running
    pub fn outstanding_syncs(&self) -> usize {
        self.dispatcher.outstanding()
    }

    /// Subscribe to node events
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.event_tx.subscribe()
    }

    /// Stop every background task, including in-flight sync pulls and
    /// responses; sockets close as the tasks are dropped.
    pub fn shutdown(mut self) {
        info!(identity = %self.identity, "Shutting down node");
        self.abort_tasks();
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.dispatcher.abort_all();
    }
}

impl Drop for ChatEngine {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// Run discovery only: announce ourselves and record peers, without syncing.
///
/// Each new peer is passed to `on_peer`. Returns only if the listener stops.
pub async fn run_discovery_only<F>(config: NodeConfig, sync_port: u16, mut on_peer: F) -> NodeResult<()>
where
    F: FnMut(&PeerRecord),
{
    let identity = resolve_identity(&config)?;
    let peers = PeerTable::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let tasks = spawn_discovery(&identity, sync_port, &config, peers, tx).await?;
    info!(%identity, sync_port, discovery = %tasks.listen_addr, "Discovery running");

    while let Some(peer) = rx.recv().await {
        on_peer(&peer);
    }

    tasks.abort();
    Ok(())
}
