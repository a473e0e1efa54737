//! Discovery datagram codec
//!
//! An announcement is the ASCII payload `"<identity>:<port>"`. Nothing else
//! is carried: no version, no checksum.

use std::fmt;

use crate::identity::Identity;

/// Decoded discovery announcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Identity of the announcing node
    pub identity: Identity,
    /// Port of its sync endpoint
    pub port: u16,
}

impl Announcement {
    /// Create an announcement
    pub fn new(identity: Identity, port: u16) -> Self {
        Self { identity, port }
    }

    /// Encode as datagram bytes
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Decode a datagram payload.
    ///
    /// Returns `None` for anything that is not UTF-8 with exactly two
    /// `:`-separated fields, a valid identity, and a non-zero `u16` port.
    /// The port accepts a leading `+`, as other implementations of this
    /// datagram do.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(payload).ok()?;
        let mut parts = text.split(':');
        let (id, port) = match (parts.next(), parts.next(), parts.next()) {
            (Some(id), Some(port), None) => (id, port),
            _ => return None,
        };

        let port: u16 = port.parse().ok()?;
        if port == 0 {
            return None;
        }
        let identity = Identity::new(id).ok()?;
        Some(Self { identity, port })
    }
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.identity, self.port)
    }
}
