//! Periodic discovery announcements

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

use super::announce::Announcement;
use crate::error::{NodeError, NodeResult};

/// Sends `"<identity>:<port>"` to the discovery target on a fixed interval
pub struct Broadcaster {
    socket: UdpSocket,
    payload: Vec<u8>,
    target: SocketAddr,
    interval: Duration,
}

impl Broadcaster {
    /// Open a broadcast-enabled socket on `source`. Failure here is a startup error.
    ///
    /// Receivers record our sync address as the datagram's source IP, so a
    /// node bound to one address must announce from it.
    pub async fn bind(
        announcement: &Announcement,
        source: Ipv4Addr,
        target: SocketAddr,
        interval: Duration,
    ) -> NodeResult<Self> {
        let local = SocketAddr::V4(SocketAddrV4::new(source, 0));
        let socket = UdpSocket::bind(local).await.map_err(|source| NodeError::Bind {
            what: "discovery broadcaster",
            addr: local,
            source,
        })?;
        socket.set_broadcast(true)?;

        Ok(Self {
            socket,
            payload: announcement.encode(),
            target,
            interval,
        })
    }

    /// Send a single announcement
    pub async fn announce_once(&self) -> NodeResult<()> {
        self.socket.send_to(&self.payload, self.target).await?;
        Ok(())
    }

    /// Announce forever. Send failures are logged and retried on the next tick.
    pub async fn run(self) {
        debug!(target = %self.target, interval = ?self.interval, "Discovery broadcaster started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.announce_once().await {
                Ok(()) => trace!(target = %self.target, "Sent announcement"),
                Err(e) => warn!(target = %self.target, error = %e, "Broadcast send failed"),
            }
        }
    }
}
