//! Chat message type shared by the store and the sync wire format

use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// An immutable chat message.
///
/// Serialized as `{"id", "timestamp", "msg"}`; those field names are fixed by
/// the sync wire contract.
///
/// # Example
///
/// ```ignore
/// let message = Message::new(&identity, 1700000000, "hi");
/// assert_eq!(message.id, "192.168.1.20#1700000000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier (author identity + "#" + timestamp)
    pub id: String,
    /// Unix timestamp in seconds when the message was created
    pub timestamp: i64,
    /// Message text
    #[serde(rename = "msg")]
    pub body: String,
}

impl Message {
    /// Create a message authored by `author` at `timestamp`.
    pub fn new(author: &Identity, timestamp: i64, body: impl Into<String>) -> Self {
        Self {
            id: derive_id(author, timestamp),
            timestamp,
            body: body.into(),
        }
    }

    /// The author part of the id, if the id follows the local derivation rule.
    ///
    /// Ids received from peers are not validated, so this is best effort.
    pub fn author(&self) -> Option<&str> {
        self.id.rsplit_once('#').map(|(author, _)| author)
    }

    /// Format the timestamp as local wall-clock time ("HH:MM:SS").
    pub fn clock_time(&self) -> String {
        use chrono::TimeZone;

        match chrono::Local.timestamp_opt(self.timestamp, 0).single() {
            Some(t) => t.format("%H:%M:%S").to_string(),
            None => "--:--:--".to_string(),
        }
    }
}

/// Derive a message id from its author and creation second.
///
/// Two messages from the same author within one second share an id.
pub fn derive_id(author: &Identity, timestamp: i64) -> String {
    format!("{}#{}", author, timestamp)
}
