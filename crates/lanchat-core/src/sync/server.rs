//! Sync server
//!
//! Serves this node's locally authored messages to any peer that connects.
//! Each connection gets its own task: handshake, one text frame, close.
//! Connection tasks live as long as the accept loop that spawned them.

use std::net::SocketAddr;
use std::time::Duration;

use futures::SinkExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use super::protocol::WireMessage;
use crate::chat::MessageStore;
use crate::error::{NodeError, NodeResult};

/// Accept loop for the sync endpoint
pub struct SyncServer {
    listener: TcpListener,
    store: MessageStore,
    timeout: Duration,
}

impl SyncServer {
    /// Bind the sync port. Failure here is a startup error.
    pub async fn bind(addr: SocketAddr, store: MessageStore, timeout: Duration) -> NodeResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| NodeError::Bind {
                what: "sync server",
                addr,
                source,
            })?;
        Ok(Self {
            listener,
            store,
            timeout,
        })
    }

    /// Address the server is bound to
    pub fn local_addr(&self) -> NodeResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, serving each one on its own task.
    pub async fn run(self) {
        debug!(addr = ?self.listener.local_addr().ok(), "Sync server started");

        // Dropping the set (when this task is aborted) aborts every response in flight.
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let store = self.store.clone();
                        let timeout = self.timeout;
                        connections.spawn(async move {
                            match serve_connection(stream, &store, timeout).await {
                                Ok(sent) => debug!(%peer, sent, "Served sync request"),
                                Err(e) => warn!(%peer, error = %e, "Sync response failed"),
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "Sync accept failed"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }
    }
}

/// Serve one connection: upgrade, send the local dump, close.
///
/// Returns the number of messages sent. The socket is dropped on every path.
async fn serve_connection(
    stream: TcpStream,
    store: &MessageStore,
    timeout: Duration,
) -> NodeResult<usize> {
    let exchange = async {
        let mut ws = tokio_tungstenite::accept_async(stream).await?;

        let messages = store.snapshot_for_peer();
        let sent = messages.len();
        let payload = WireMessage::new(messages).encode()?;
        ws.send(WsMessage::text(payload)).await?;

        // The dump is already flushed; a peer that hangs up first is not an error.
        if let Err(e) = ws.close(None).await {
            debug!(error = %e, "Close after sync response failed");
        }
        Ok::<usize, NodeError>(sent)
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| NodeError::Timeout(timeout))?
}
