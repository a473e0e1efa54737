//! Broadcast-based peer discovery
//!
//! ## Overview
//!
//! Every node periodically broadcasts `"<identity>:<port>"` on a well-known
//! UDP port and listens on that same port for everyone else's
//! announcements.
//!
//! ```text
//! Node A                      LAN broadcast                    Node B
//!   |--- "10.0.0.1:15123" ------------>|------------------------->|
//!   |<---------------------------------|<--- "10.0.0.2:11876" ----|
//!   |                                                             |
//!   | (new identity 10.0.0.2 -> PeerTable -> sync dispatcher)     |
//! ```
//!
//! Re-announcements of a known identity are ignored, so a peer is handed to
//! the sync dispatcher at most once per run.

pub mod announce;
pub mod broadcaster;
pub mod listener;

pub use announce::Announcement;
pub use broadcaster::Broadcaster;
pub use listener::{AnnouncementHandler, DatagramOutcome, Listener};

use std::net::SocketAddr;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::NodeConfig;
use crate::error::NodeResult;
use crate::identity::Identity;
use crate::peers::{PeerRecord, PeerTable};

/// Running broadcaster and listener tasks
pub struct DiscoveryTasks {
    /// Address the listener bound
    pub listen_addr: SocketAddr,
    /// Broadcaster loop
    pub broadcaster: JoinHandle<()>,
    /// Listener loop
    pub listener: JoinHandle<()>,
}

impl DiscoveryTasks {
    /// Stop both loops
    pub fn abort(&self) {
        self.broadcaster.abort();
        self.listener.abort();
    }
}

/// Bind both discovery sockets and spawn their loops.
///
/// New peers are inserted into `peers` and sent on `new_peers`. Bind
/// failures are returned before anything is spawned.
pub async fn spawn_discovery(
    identity: &Identity,
    sync_port: u16,
    config: &NodeConfig,
    peers: PeerTable,
    new_peers: mpsc::UnboundedSender<PeerRecord>,
) -> NodeResult<DiscoveryTasks> {
    let handler = AnnouncementHandler::new(identity.clone(), peers, new_peers);
    let listener = Listener::bind(config.discovery_bind, handler)?;
    let listen_addr = listener.local_addr()?;

    let announcement = Announcement::new(identity.clone(), sync_port);
    let broadcaster = Broadcaster::bind(
        &announcement,
        config.bind_ip,
        config.announce_target,
        config.announce_interval,
    )
    .await?;

    Ok(DiscoveryTasks {
        listen_addr,
        broadcaster: tokio::spawn(broadcaster.run()),
        listener: tokio::spawn(listener.run()),
    })
}
