//! Pull-based message synchronization
//!
//! ## Overview
//!
//! Every node runs a [`SyncServer`] on its announced port. When discovery
//! reports a new peer, the [`SyncDispatcher`] connects to that peer's server
//! once, reads its locally authored messages, and merges them into the
//! [`MessageStore`](crate::chat::MessageStore).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Listener --new PeerRecord--> SyncDispatcher                    │
//! │                                 └── pull ws://peer/ws           │
//! │                                       └── MessageStore::merge   │
//! │                                                                 │
//! │  SyncServer <--- peers pull ---                                 │
//! │    └── MessageStore::snapshot_for_peer (local messages only)   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nodes only ever share what they authored, so a message reaches a node
//! only if that node discovers the author directly.

pub mod dispatcher;
pub mod events;
pub mod protocol;
pub mod server;

pub use dispatcher::{fetch_messages, SyncDispatcher};
pub use events::{NodeEvent, SyncOutcome};
pub use protocol::{WireMessage, PROTOCOL_VERSION, SYNC_PATH};
pub use server::SyncServer;
