//! WebSocket transport over tokio-tungstenite.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::transport::{Connector, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to an Ogmios endpoint such as `ws://127.0.0.1:1337`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    endpoint: String,
}

impl WebSocketConnector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&self) -> Result<WebSocketTransport> {
        let (ws, _) = connect_async(self.endpoint.as_str())
            .await
            .map_err(|e| SyncError::Transport(format!("connect {}: {e}", self.endpoint)))?;
        debug!(endpoint = %self.endpoint, "websocket connected");
        let (sink, stream) = ws.split();
        Ok(WebSocketTransport {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// One WebSocket connection, split so that sends and receives do not block
/// each other.
pub struct WebSocketTransport {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, frame: String) -> Result<()> {
        self.sink
            .lock()
            .await
            .send(Message::Text(frame))
            .await
            .map_err(|e| SyncError::Transport(format!("send: {e}")))
    }

    async fn recv(&self) -> Result<Option<Bytes>> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                None | Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(Message::Text(text))) => return Ok(Some(Bytes::from(text))),
                Some(Ok(Message::Binary(data))) => return Ok(Some(Bytes::from(data))),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(SyncError::Transport(format!("recv: {e}"))),
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| SyncError::Transport(format!("close: {e}")))
    }
}
