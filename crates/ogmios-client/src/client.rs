//! The client: one endpoint, any number of sessions and queries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use ogmios_core::protocol::{ResponseError, JSONRPC_VERSION};
use ogmios_core::Point;
use ogmios_store::CheckpointStore;
use ogmios_sync::{
    ChainSync, Connector, EventHandler, SessionConfig, SessionHandle, SyncError, Transport,
    WebSocketConnector,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{ClientError, Result};

/// Where a local Ogmios listens by default.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:1337";

/// Configuration for the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint of the node.
    pub endpoint: String,
    /// Configuration for sessions started by [`Client::chain_sync`].
    pub session: SessionConfig,
    /// Upper bound on a single query, connect included.
    pub query_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            session: SessionConfig::default(),
            query_timeout: Duration::from_secs(30),
        }
    }
}

/// An Ogmios client.
///
/// Sessions and queries each open their own connection.
pub struct Client<C = WebSocketConnector> {
    connector: C,
    config: ClientConfig,
    next_id: AtomicU64,
}

impl Client<WebSocketConnector> {
    pub fn new(config: ClientConfig) -> Self {
        let connector = WebSocketConnector::new(config.endpoint.clone());
        Self::with_connector(connector, config)
    }
}

impl Default for Client<WebSocketConnector> {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<JsonValue>,
    id: u64,
}

#[derive(Deserialize)]
struct QueryReply {
    #[serde(default)]
    result: Option<JsonValue>,
    #[serde(default)]
    error: Option<ResponseError>,
}

impl<C> Client<C>
where
    C: Connector + Clone + 'static,
{
    /// Create a client over an arbitrary transport.
    pub fn with_connector(connector: C, config: ClientConfig) -> Self {
        Self {
            connector,
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start a chain-sync session.
    ///
    /// The session resumes from `store` if it holds checkpoints, otherwise
    /// from `points`, otherwise from origin.
    pub fn chain_sync<S, H>(
        &self,
        store: S,
        handler: H,
        points: impl IntoIterator<Item = Point>,
    ) -> Result<SessionHandle>
    where
        S: CheckpointStore + 'static,
        H: EventHandler + 'static,
    {
        let session = ChainSync::new(self.connector.clone(), store, handler)
            .with_points(points)
            .with_config(self.config.session.clone())
            .start()?;
        Ok(session)
    }

    /// Send one JSON-RPC request on a fresh connection and decode its result.
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<JsonValue>,
    ) -> Result<R> {
        let request = QueryRequest {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        let frame = serde_json::to_string(&request)?;

        let limit = self.config.query_timeout;
        let raw = tokio::time::timeout(limit, self.exchange(frame))
            .await
            .map_err(|_| SyncError::Timeout(format!("{method} took longer than {limit:?}")))??;

        let reply: QueryReply = serde_json::from_slice(&raw)?;
        if let Some(error) = reply.error {
            return Err(ClientError::Query {
                method: method.to_string(),
                message: format!("{} (code {})", error.message, error.code),
            });
        }
        let result = reply.result.ok_or_else(|| ClientError::Query {
            method: method.to_string(),
            message: "reply has no result".into(),
        })?;
        Ok(serde_json::from_value(result)?)
    }

    async fn exchange(&self, frame: String) -> Result<Bytes> {
        let transport = self.connector.connect().await?;
        let reply = round_trip(&transport, frame).await;
        if let Err(e) = transport.close().await {
            tracing::debug!(error = %e, "closing query connection");
        }
        Ok(reply?)
    }
}

async fn round_trip<T: Transport>(
    transport: &T,
    frame: String,
) -> std::result::Result<Bytes, SyncError> {
    transport.send(frame).await?;
    transport
        .recv()
        .await?
        .ok_or_else(|| SyncError::Transport("connection closed before reply".into()))
}
