//! Node configuration
//!
//! Every knob has a named default; the CLI maps its flags onto [`NodeConfig`].

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::ops::Range;
use std::time::Duration;

/// Well-known UDP port for discovery announcements.
pub const DEFAULT_DISCOVERY_PORT: u16 = 9876;

/// How often the broadcaster announces us.
pub const DEFAULT_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(2);

/// Sync ports are picked at random from this range.
pub const DEFAULT_SYNC_PORT_RANGE: Range<u16> = 10000..20000;

/// Upper bound on one sync round trip (connect, handshake, read).
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of dispatcher pulls in flight at once.
pub const DEFAULT_MAX_CONCURRENT_SYNCS: usize = 16;

/// Configuration for a [`ChatEngine`](crate::ChatEngine).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Explicit identity; `None` means "use the local IPv4 address".
    pub identity: Option<String>,
    /// Sync server port. `None` picks from `sync_port_range`, `Some(0)` lets the OS choose.
    pub sync_port: Option<u16>,
    /// Range used when `sync_port` is `None`.
    pub sync_port_range: Range<u16>,
    /// Local address for the sync server and the announcement socket.
    pub bind_ip: Ipv4Addr,
    /// Where the discovery listener binds.
    pub discovery_bind: SocketAddr,
    /// Where announcements are sent.
    pub announce_target: SocketAddr,
    /// Interval between announcements.
    pub announce_interval: Duration,
    /// Deadline for each sync round trip, on both client and server side.
    pub sync_timeout: Duration,
    /// Cap on concurrently running dispatcher pulls.
    pub max_concurrent_syncs: usize,
}

impl NodeConfig {
    /// Set an explicit identity
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Set an explicit sync port (`0` = OS-assigned)
    pub fn with_sync_port(mut self, port: u16) -> Self {
        self.sync_port = Some(port);
        self
    }

    /// Set the local address the sync server and broadcaster bind to
    pub fn with_bind_ip(mut self, ip: Ipv4Addr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Set the discovery bind address and announcement target
    pub fn with_discovery(mut self, bind: SocketAddr, target: SocketAddr) -> Self {
        self.discovery_bind = bind;
        self.announce_target = target;
        self
    }

    /// Set the announcement interval
    pub fn with_announce_interval(mut self, interval: Duration) -> Self {
        self.announce_interval = interval;
        self
    }

    /// Set the sync round-trip deadline
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            identity: None,
            sync_port: None,
            sync_port_range: DEFAULT_SYNC_PORT_RANGE,
            bind_ip: Ipv4Addr::UNSPECIFIED,
            discovery_bind: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::UNSPECIFIED,
                DEFAULT_DISCOVERY_PORT,
            )),
            announce_target: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::BROADCAST,
                DEFAULT_DISCOVERY_PORT,
            )),
            announce_interval: DEFAULT_ANNOUNCE_INTERVAL,
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            max_concurrent_syncs: DEFAULT_MAX_CONCURRENT_SYNCS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_well_known_values() {
        let config = NodeConfig::default();
        assert_eq!(config.discovery_bind.port(), 9876);
        assert_eq!(config.announce_target.to_string(), "255.255.255.255:9876");
        assert_eq!(config.announce_interval, Duration::from_secs(2));
        assert_eq!(config.sync_port_range, 10000..20000);
        assert!(config.identity.is_none());
        assert!(config.sync_port.is_none());
        assert_eq!(config.bind_ip, Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn test_builders_override_fields() {
        let bind: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let target: SocketAddr = "127.0.0.1:4001".parse().unwrap();
        let config = NodeConfig::default()
            .with_identity("node-a")
            .with_sync_port(0)
            .with_discovery(bind, target)
            .with_announce_interval(Duration::from_millis(50))
            .with_sync_timeout(Duration::from_secs(1))
            .with_bind_ip(Ipv4Addr::new(127, 0, 0, 2));

        assert_eq!(config.identity.as_deref(), Some("node-a"));
        assert_eq!(config.sync_port, Some(0));
        assert_eq!(config.discovery_bind, bind);
        assert_eq!(config.announce_target, target);
        assert_eq!(config.announce_interval, Duration::from_millis(50));
        assert_eq!(config.sync_timeout, Duration::from_secs(1));
        assert_eq!(config.bind_ip, Ipv4Addr::new(127, 0, 0, 2));
    }
}
