//! LAN Chat Core Library
//!
//! Broadcast peer discovery and pull-based message sync for a LAN chat node.
//!
//! ## Overview
//!
//! Every node announces `"<identity>:<port>"` over UDP broadcast and listens
//! for other nodes doing the same. The first time a node hears a new
//! identity it connects to that peer's sync endpoint, pulls the messages the
//! peer authored, and merges them by id into its own store.
//!
//! ## Core Principles
//!
//! - **Local-first**: each node only serves what it authored itself
//! - **At most once**: a peer is pulled once per run; no retry, no eviction
//! - **In memory**: nothing is persisted across restarts
//!
//! ## Quick Start
//!
//! ```ignore
//! use lanchat_core::{ChatEngine, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ChatEngine::start(NodeConfig::default()).await?;
//!     engine.submit("hello from the third floor");
//!
//!     for peer in engine.peers() {
//!         println!("{} at {}", peer.identity, peer.address);
//!     }
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod identity;
pub mod peers;
pub mod sync;

// Re-exports
pub use chat::{MergeStats, Message, MessageStore};
pub use config::NodeConfig;
pub use engine::{resolve_identity, run_discovery_only, ChatEngine};
pub use error::{NodeError, NodeResult};
pub use identity::{choose_port, resolve_local_ipv4, Identity};
pub use peers::{PeerRecord, PeerTable};
pub use sync::{NodeEvent, SyncDispatcher, SyncOutcome, SyncServer, WireMessage};
