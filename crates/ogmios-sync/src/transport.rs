//! Transport abstraction for chain-sync sessions.
//!
//! A session holds one connection at a time and talks to it from two tasks:
//! a writer issuing pipelined requests and a reader decoding responses. The
//! [`Transport`] therefore takes `&self` for both directions. A [`Connector`]
//! opens a fresh transport for each (re)connect.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// A full-duplex text-frame connection to a node.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request frame.
    async fn send(&self, frame: String) -> Result<()>;

    /// Receive the next response frame.
    ///
    /// Returns `None` once the node has closed the connection. Blocks until
    /// a frame is available or an error occurs.
    async fn recv(&self) -> Result<Option<Bytes>>;

    /// Close the connection. Further sends fail; pending receives end.
    async fn close(&self) -> Result<()>;
}

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport + 'static;

    async fn connect(&self) -> Result<Self::Transport>;
}

/// Channel-backed transport for tests.
///
/// [`connector`] yields a [`MemoryConnector`] for the session and a
/// [`MemoryAcceptor`] standing in for the node. Every `connect` hands the
/// acceptor a fresh [`NodeConnection`].
pub mod memory {
    use super::*;
    use std::sync::Mutex;

    use tokio::sync::{mpsc, Mutex as AsyncMutex};

    use crate::error::SyncError;

    /// Frames buffered per direction.
    const CHANNEL_CAPACITY: usize = 1000;

    /// Create a connected transport and node pair.
    pub fn pair() -> (MemoryTransport, NodeConnection) {
        let (request_tx, request_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (response_tx, response_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            MemoryTransport {
                outbound: Mutex::new(Some(request_tx)),
                inbound: AsyncMutex::new(response_rx),
            },
            NodeConnection {
                requests: request_rx,
                responses: response_tx,
            },
        )
    }

    /// Create a connector and the acceptor that receives its connections.
    pub fn connector() -> (MemoryConnector, MemoryAcceptor) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MemoryConnector { accept: tx }, MemoryAcceptor { incoming: rx })
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        outbound: Mutex<Option<mpsc::Sender<String>>>,
        inbound: AsyncMutex<mpsc::Receiver<Bytes>>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&self, frame: String) -> Result<()> {
            let sender = self
                .outbound
                .lock()
                .map_err(|e| SyncError::Transport(format!("lock poisoned: {e}")))?
                .clone()
                .ok_or_else(|| SyncError::Transport("transport closed".into()))?;
            sender
                .send(frame)
                .await
                .map_err(|_| SyncError::Transport("node disconnected".into()))
        }

        async fn recv(&self) -> Result<Option<Bytes>> {
            Ok(self.inbound.lock().await.recv().await)
        }

        async fn close(&self) -> Result<()> {
            self.outbound
                .lock()
                .map_err(|e| SyncError::Transport(format!("lock poisoned: {e}")))?
                .take();
            self.inbound.lock().await.close();
            Ok(())
        }
    }

    /// The node's side of a memory connection.
    pub struct NodeConnection {
        requests: mpsc::Receiver<String>,
        responses: mpsc::Sender<Bytes>,
    }

    impl NodeConnection {
        /// Next request from the client, or `None` once it has closed.
        pub async fn recv(&mut self) -> Option<String> {
            self.requests.recv().await
        }

        /// Send a response frame. Returns false if the client is gone.
        pub async fn send(&self, frame: impl Into<Bytes>) -> bool {
            self.responses.send(frame.into()).await.is_ok()
        }
    }

    /// Hands out memory transports.
    #[derive(Clone)]
    pub struct MemoryConnector {
        accept: mpsc::UnboundedSender<NodeConnection>,
    }

    #[async_trait]
    impl Connector for MemoryConnector {
        type Transport = MemoryTransport;

        async fn connect(&self) -> Result<MemoryTransport> {
            let (transport, node) = pair();
            self.accept
                .send(node)
                .map_err(|_| SyncError::Transport("connection refused".into()))?;
            Ok(transport)
        }
    }

    /// Receives the node side of each connection.
    pub struct MemoryAcceptor {
        incoming: mpsc::UnboundedReceiver<NodeConnection>,
    }

    impl MemoryAcceptor {
        pub async fn accept(&mut self) -> Option<NodeConnection> {
            self.incoming.recv().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::{connector, pair};
    use super::*;

    #[tokio::test]
    async fn test_memory_transport_send_recv() {
        let (transport, mut node) = pair();

        transport.send("ping".into()).await.unwrap();
        assert_eq!(node.recv().await.as_deref(), Some("ping"));

        assert!(node.send("pong").await);
        assert_eq!(transport.recv().await.unwrap(), Some(Bytes::from("pong")));
    }

    #[tokio::test]
    async fn test_memory_transport_close() {
        let (transport, mut node) = pair();
        transport.close().await.unwrap();

        assert!(node.recv().await.is_none());
        assert!(transport.send("late".into()).await.is_err());
    }

    #[tokio::test]
    async fn test_node_drop_ends_recv() {
        let (transport, node) = pair();
        drop(node);
        assert_eq!(transport.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_connector_hands_out_connections() {
        let (connector, mut acceptor) = connector();
        let transport = connector.connect().await.unwrap();
        let mut node = acceptor.accept().await.unwrap();

        transport.send("hello".into()).await.unwrap();
        assert_eq!(node.recv().await.as_deref(), Some("hello"));

        drop(acceptor);
        assert!(connector.connect().await.is_err());
    }
}
