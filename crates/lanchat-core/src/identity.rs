//! Node identity and sync port selection
//!
//! A node is named by its first non-loopback IPv4 interface address.
//! The name only has to be stable for one run; nothing guarantees it is
//! unique across restarts or address reuse.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::ops::Range;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NodeError, NodeResult};

/// Connecting a UDP socket here selects the outbound interface without sending anything.
/// Only used to choose between several usable interfaces.
const ROUTE_PROBE_ADDR: &str = "10.254.254.254:1";

/// Stable name of a node for the lifetime of one process run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Create an identity from an explicit string.
    ///
    /// Rejects empty strings and strings containing `:`, which is the only
    /// separator in a discovery datagram.
    pub fn new(value: impl Into<String>) -> NodeResult<Self> {
        let value = value.into();
        if value.trim().is_empty() || value.contains(':') {
            return Err(NodeError::InvalidIdentity(value));
        }
        Ok(Self(value))
    }

    /// Identity derived from the local IPv4 address
    pub fn resolve() -> NodeResult<Self> {
        let ip = resolve_local_ipv4()?;
        debug!(%ip, "Resolved local identity");
        Ok(Self(ip.to_string()))
    }

    /// Borrow the identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Find the first usable (non-loopback, non-unspecified) local IPv4 address.
///
/// Interfaces are listed in the order the OS reports them. When several are
/// usable, the one the OS routes outbound traffic from is preferred; without
/// a route the first usable interface wins. Returns
/// [`NodeError::NoLocalAddress`] when only loopback is up.
pub fn resolve_local_ipv4() -> NodeResult<Ipv4Addr> {
    let interfaces = if_addrs::get_if_addrs()?;
    let candidates = interfaces.iter().filter_map(|iface| match iface.ip() {
        IpAddr::V4(ip) => Some(ip),
        IpAddr::V6(_) => None,
    });
    select_ipv4(candidates, outbound_ipv4()).ok_or(NodeError::NoLocalAddress)
}

/// Address of the outbound interface, if the host has a route off-link.
fn outbound_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect(ROUTE_PROBE_ADDR).ok()?;
    match socket.local_addr().ok()? {
        SocketAddr::V4(addr) => Some(*addr.ip()),
        SocketAddr::V6(_) => None,
    }
}

/// Pick the identity address from interface addresses.
///
/// `preferred` only breaks ties; it is ignored unless it is one of the usable candidates.
pub(crate) fn select_ipv4<I>(candidates: I, preferred: Option<Ipv4Addr>) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = Ipv4Addr>,
{
    let usable: Vec<Ipv4Addr> = candidates.into_iter().filter(|ip| is_usable(*ip)).collect();
    match preferred {
        Some(ip) if usable.contains(&ip) => Some(ip),
        _ => usable.first().copied(),
    }
}

fn is_usable(ip: Ipv4Addr) -> bool {
    !ip.is_loopback() && !ip.is_unspecified()
}

/// Pick a pseudo-random sync port in `range`. No collision detection.
pub fn choose_port(range: Range<u16>) -> u16 {
    if range.is_empty() {
        return range.start;
    }
    rand::rng().random_range(range)
}
