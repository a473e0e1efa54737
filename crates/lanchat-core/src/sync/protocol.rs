//! Sync wire protocol
//!
//! A sync is a single pull over WebSocket:
//!
//! ```text
//! Dispatcher (Node Y)                 Sync server (Node X)
//!   |                                   |
//!   |--- GET /ws (upgrade) ------------>|
//!   |<-- text frame: [{id,timestamp,msg}, ...] ---|
//!   |<-- close -------------------------|
//!   |                                   |
//!   |    (merge into MessageStore)      |
//! ```
//!
//! The request carries no body; the response is the same for every caller.
//! Responses are wrapped in [`WireMessage`] so the format can grow new
//! versions. Version 1 is the bare JSON array, so it stays readable by
//! nodes that only know the plain array.

use serde::{Deserialize, Serialize};

use crate::chat::Message;

/// Path of the sync endpoint
pub const SYNC_PATH: &str = "/ws";

/// Protocol version produced by [`WireMessage::new`]
pub const PROTOCOL_VERSION: u8 = 1;

/// Versioned sync response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireMessage {
    /// Protocol version 1: a bare array of messages
    V1(Vec<Message>),
}

impl WireMessage {
    /// Wrap a message dump in the current protocol version
    pub fn new(messages: Vec<Message>) -> Self {
        WireMessage::V1(messages)
    }

    /// Encode as JSON text
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode from JSON bytes
    pub fn decode(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Unwrap the carried messages
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            WireMessage::V1(messages) => messages,
        }
    }

    /// Get the protocol version
    pub fn version(&self) -> u8 {
        match self {
            WireMessage::V1(_) => 1,
        }
    }
}
