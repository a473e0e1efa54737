//! Discovery listener
//!
//! Receives announcements on the shared discovery port and turns the first
//! sighting of each remote identity into a [`PeerRecord`]. The discovery
//! port is shared noise: our own announcements, duplicates, and garbage all
//! arrive here and are dropped without complaint.

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::announce::Announcement;
use crate::error::{NodeError, NodeResult};
use crate::identity::Identity;
use crate::peers::{PeerRecord, PeerTable};

/// Receive buffer size; announcements are far shorter.
const RECV_BUFFER_SIZE: usize = 1024;

/// What happened to one received datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatagramOutcome {
    /// Not a valid announcement
    Malformed,
    /// Our own announcement looped back
    OwnAnnouncement,
    /// Identity already in the peer table
    KnownPeer,
    /// First sighting; the record was inserted and queued for sync
    NewPeer(PeerRecord),
}

/// Applies announcements to the peer table.
///
/// Kept separate from the socket so it can be driven directly.
#[derive(Debug, Clone)]
pub struct AnnouncementHandler {
    local: Identity,
    peers: PeerTable,
    new_peers: mpsc::UnboundedSender<PeerRecord>,
}

impl AnnouncementHandler {
    /// Create a handler that forwards new peers on `new_peers`
    pub fn new(
        local: Identity,
        peers: PeerTable,
        new_peers: mpsc::UnboundedSender<PeerRecord>,
    ) -> Self {
        Self {
            local,
            peers,
            new_peers,
        }
    }

    /// Process one datagram received from `from`.
    pub fn handle_datagram(&self, payload: &[u8], from: SocketAddr) -> DatagramOutcome {
        let Some(announcement) = Announcement::decode(payload) else {
            trace!(%from, len = payload.len(), "Ignoring malformed datagram");
            return DatagramOutcome::Malformed;
        };

        if announcement.identity == self.local {
            return DatagramOutcome::OwnAnnouncement;
        }

        let address = SocketAddr::new(from.ip(), announcement.port);
        let record = PeerRecord::new(announcement.identity, address);
        if !self.peers.insert_if_new(record.clone()) {
            return DatagramOutcome::KnownPeer;
        }

        info!(identity = %record.identity, %address, "Discovered peer");
        if self.new_peers.send(record.clone()).is_err() {
            debug!(identity = %record.identity, "New-peer channel closed, not syncing");
        }
        DatagramOutcome::NewPeer(record)
    }
}

/// Bound discovery socket plus its handler
pub struct Listener {
    socket: UdpSocket,
    handler: AnnouncementHandler,
}

impl Listener {
    /// Bind the discovery port. Failure here is a startup error.
    ///
    /// The socket is opened with address (and on unix, port) reuse so that
    /// several nodes on one host can listen on the same discovery port.
    pub fn bind(addr: SocketAddr, handler: AnnouncementHandler) -> NodeResult<Self> {
        let socket = bind_shared_udp(addr).map_err(|source| NodeError::Bind {
            what: "discovery listener",
            addr,
            source,
        })?;
        Ok(Self { socket, handler })
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> NodeResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive forever. Receive errors are logged and the loop continues.
    pub async fn run(self) {
        debug!(addr = ?self.socket.local_addr().ok(), "Discovery listener started");

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((n, from)) => {
                    self.handler.handle_datagram(&buf[..n], from);
                }
                Err(e) => warn!(error = %e, "Discovery receive failed"),
            }
        }
    }
}

fn bind_shared_udp(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_handler(local: &str) -> (AnnouncementHandler, PeerTable, mpsc::UnboundedReceiver<PeerRecord>) {
        let peers = PeerTable::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = AnnouncementHandler::new(Identity::new(local).unwrap(), peers.clone(), tx);
        (handler, peers, rx)
    }

    fn from(ip: &str) -> SocketAddr {
        format!("{}:9876", ip).parse().unwrap()
    }

    #[test]
    fn test_new_peer_is_recorded_and_queued_once() {
        let (handler, peers, mut rx) = new_handler("10.0.0.1");

        let outcome = handler.handle_datagram(b"10.0.0.2:15000", from("10.0.0.2"));
        let DatagramOutcome::NewPeer(record) = outcome else {
            panic!("expected NewPeer, got {:?}", outcome);
        };
        assert_eq!(record.address.to_string(), "10.0.0.2:15000");
        assert_eq!(peers.len(), 1);
        assert_eq!(rx.try_recv().unwrap().identity.as_str(), "10.0.0.2");

        for _ in 0..3 {
            assert_eq!(
                handler.handle_datagram(b"10.0.0.2:15000", from("10.0.0.2")),
                DatagramOutcome::KnownPeer
            );
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_own_announcement_is_ignored() {
        let (handler, peers, mut rx) = new_handler("10.0.0.1");
        assert_eq!(
            handler.handle_datagram(b"10.0.0.1:15000", from("10.0.0.1")),
            DatagramOutcome::OwnAnnouncement
        );
        assert!(peers.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_malformed_payloads_leave_table_unchanged() {
        let (handler, peers, mut rx) = new_handler("10.0.0.1");
        for payload in [&b""[..], b"hello", b"a:b:c", b"10.0.0.2:port", b"10.0.0.2:99999"] {
            assert_eq!(
                handler.handle_datagram(payload, from("10.0.0.2")),
                DatagramOutcome::Malformed
            );
        }
        assert!(peers.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_address_uses_sender_ip_not_identity() {
        let (handler, _peers, _rx) = new_handler("local");
        let outcome = handler.handle_datagram(b"bob:12345", from("192.168.7.9"));
        match outcome {
            DatagramOutcome::NewPeer(record) => {
                assert_eq!(record.address.to_string(), "192.168.7.9:12345")
            }
            other => panic!("expected NewPeer, got {:?}", other),
        }
    }

    #[test]
    fn test_readdress_is_not_picked_up() {
        let (handler, peers, _rx) = new_handler("local");
        handler.handle_datagram(b"bob:12345", from("192.168.7.9"));
        handler.handle_datagram(b"bob:23456", from("192.168.7.10"));

        let bob = peers.get(&Identity::new("bob").unwrap()).unwrap();
        assert_eq!(bob.address.to_string(), "192.168.7.9:12345");
    }

    #[tokio::test]
    async fn test_listener_receives_over_udp() {
        let (handler, peers, mut rx) = new_handler("local");
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), handler).unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(listener.run());

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"garbage", addr).await.unwrap();
        sender.send_to(b"remote:14000", addr).await.unwrap();

        let record = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.identity.as_str(), "remote");
        assert_eq!(record.address.to_string(), "127.0.0.1:14000");
        assert_eq!(peers.len(), 1);

        task.abort();
    }
}
