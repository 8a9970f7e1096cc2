//! # Ogmios Chain Sync
//!
//! Drives the chain-sync mini-protocol over a JSON-RPC WebSocket.
//!
//! ## Overview
//!
//! A [`ChainSync`] session connects through a [`Connector`], finds the most
//! recent intersection between its resume points and the node's chain, then
//! streams blocks with a pipeline of `nextBlock` requests. Each event goes to
//! an [`EventHandler`], strictly in order, and each processed point is saved
//! to a [`CheckpointStore`](ogmios_store::CheckpointStore) so the next run
//! resumes where this one stopped.
//!
//! ## Key Properties
//!
//! - **Ordered**: events reach the handler in the order the node sent them,
//!   whatever the pipeline depth
//! - **Resumable**: stored checkpoints take precedence over caller points
//! - **Generation-agnostic**: legacy and current response shapes decode to
//!   the same events
//! - **Closable**: after `close`, no further callback starts
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ogmios_store::SqliteStore;
//! use ogmios_sync::{handler_fn, ChainSync, SessionConfig, WebSocketConnector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::open("checkpoints.db")?;
//! let handler = handler_fn(|_ctx, event| async move {
//!     println!("{} at {:?}", event.name(), event.point());
//!     Ok(())
//! });
//!
//! let session = ChainSync::new(WebSocketConnector::new("ws://127.0.0.1:1337"), store, handler)
//!     .with_config(SessionConfig::default())
//!     .start()?;
//! session.wait().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Client                               Node
//!   |-------- findIntersection -------->|
//!   |<------- intersection / error -----|
//!   |-------- nextBlock (id 1..N) ----->|
//!   |<------- forward / backward -------|
//!   |-------- nextBlock (id N+1) ------>|
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod session;
pub mod transport;
pub mod websocket;

pub use config::{ReconnectConfig, SessionConfig};
pub use error::{Result, SyncError};
pub use handler::{handler_fn, CallbackContext, EventHandler, FnHandler};
pub use session::{
    initial_points, initial_request, ChainSync, SessionHandle, SessionReport, SessionState,
};
pub use transport::{memory, Connector, Transport};
pub use websocket::{WebSocketConnector, WebSocketTransport};
