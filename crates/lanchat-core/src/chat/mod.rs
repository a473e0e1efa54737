//! Chat messages and the message store
//!
//! [`MessageStore`] keeps what this node authored apart from everything it
//! has merged from peers, so sync only ever shares first-hand messages.

pub mod message;
pub mod store;

pub use message::{derive_id, Message};
pub use store::{MergeStats, MessageStore};
