//! Node events for the presentation layer
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  NodeEvent                                                      │
//! │  ├── PeerDiscovered: listener saw a new identity                │
//! │  ├── PeerSynced: dispatcher pulled and merged a peer's dump     │
//! │  ├── SyncFailed: dispatcher gave up on a peer (no retry)        │
//! │  └── LocalMessage: the user submitted a message                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use crate::chat::{MergeStats, Message};
use crate::identity::Identity;
use crate::peers::PeerRecord;

/// Result of one dispatcher task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The peer's dump was received and merged
    Synced {
        /// Peer that was pulled
        identity: Identity,
        /// Merge counts
        stats: MergeStats,
    },
    /// Connect, read, or decode failed; this peer will not be retried
    Failed {
        /// Peer that was pulled
        identity: Identity,
        /// Error description
        error: String,
    },
}

impl SyncOutcome {
    /// Peer this outcome is about
    pub fn identity(&self) -> &Identity {
        match self {
            SyncOutcome::Synced { identity, .. } => identity,
            SyncOutcome::Failed { identity, .. } => identity,
        }
    }

    /// Whether the sync succeeded
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncOutcome::Synced { .. })
    }
}

/// Events emitted by a running node
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// A new peer was added to the peer table
    PeerDiscovered(PeerRecord),
    /// A peer's messages were merged
    PeerSynced {
        /// The peer
        identity: Identity,
        /// Messages in the dump
        received: usize,
        /// Messages that were new to us
        inserted: usize,
    },
    /// Pulling from a peer failed
    SyncFailed {
        /// The peer
        identity: Identity,
        /// Error message
        error: String,
    },
    /// A message was authored locally
    LocalMessage(Message),
}

impl NodeEvent {
    /// Peer identity associated with this event, if any
    pub fn peer(&self) -> Option<&Identity> {
        match self {
            NodeEvent::PeerDiscovered(record) => Some(&record.identity),
            NodeEvent::PeerSynced { identity, .. } => Some(identity),
            NodeEvent::SyncFailed { identity, .. } => Some(identity),
            NodeEvent::LocalMessage(_) => None,
        }
    }

    /// Whether this event changes what a message view shows
    pub fn changes_messages(&self) -> bool {
        match self {
            NodeEvent::PeerSynced { inserted, .. } => *inserted > 0,
            NodeEvent::LocalMessage(_) => true,
            _ => false,
        }
    }
}

impl From<&SyncOutcome> for NodeEvent {
    fn from(outcome: &SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::Synced { identity, stats } => NodeEvent::PeerSynced {
                identity: identity.clone(),
                received: stats.received,
                inserted: stats.inserted,
            },
            SyncOutcome::Failed { identity, error } => NodeEvent::SyncFailed {
                identity: identity.clone(),
                error: error.clone(),
            },
        }
    }
}

impl fmt::Display for NodeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeEvent::PeerDiscovered(record) => {
                write!(f, "Discovered {} at {}", record.identity, record.address)
            }
            NodeEvent::PeerSynced {
                identity,
                received,
                inserted,
            } => write!(
                f,
                "Synced {} ({} received, {} new)",
                identity, received, inserted
            ),
            NodeEvent::SyncFailed { identity, error } => {
                write!(f, "Sync with {} failed: {}", identity, error)
            }
            NodeEvent::LocalMessage(message) => write!(f, "Sent {}", message.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    #[test]
    fn test_outcome_to_event() {
        let outcome = SyncOutcome::Synced {
            identity: id("X"),
            stats: MergeStats {
                received: 3,
                inserted: 2,
            },
        };
        assert!(outcome.is_synced());

        let event = NodeEvent::from(&outcome);
        assert_eq!(event.peer(), Some(&id("X")));
        assert!(event.changes_messages());
        assert_eq!(event.to_string(), "Synced X (3 received, 2 new)");
    }

    #[test]
    fn test_failed_outcome_to_event() {
        let outcome = SyncOutcome::Failed {
            identity: id("X"),
            error: "refused".to_string(),
        };
        assert!(!outcome.is_synced());
        let event = NodeEvent::from(&outcome);
        assert!(!event.changes_messages());
        assert_eq!(event.to_string(), "Sync with X failed: refused");
    }

    #[test]
    fn test_sync_without_new_messages_does_not_change_view() {
        let event = NodeEvent::PeerSynced {
            identity: id("X"),
            received: 4,
            inserted: 0,
        };
        assert!(!event.changes_messages());
    }

    #[test]
    fn test_local_message_has_no_peer() {
        let event = NodeEvent::LocalMessage(Message::new(&id("me"), 1, "x"));
        assert_eq!(event.peer(), None);
        assert!(event.changes_messages());
    }
}
