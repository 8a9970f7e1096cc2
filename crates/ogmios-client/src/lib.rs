//! # Ogmios Client
//!
//! The unified API for following a Cardano chain through Ogmios.
//!
//! ## Overview
//!
//! - **Chain sync**: resumable, pipelined sessions that deliver roll-forward
//!   and roll-backward events in order
//! - **Checkpoints**: durable resume points in SQLite, or in memory
//! - **Queries**: one-shot ledger and network state queries
//! - **Compatibility**: legacy (v5) and current (v6) node responses decode to
//!   one model
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ogmios_client::{Client, ClientConfig};
//! use ogmios_client::store::SqliteStore;
//! use ogmios_client::sync::handler_fn;
//!
//! async fn example() -> ogmios_client::Result<()> {
//!     let client = Client::new(ClientConfig::default());
//!     let tip = client.chain_tip().await?;
//!     println!("node at {tip}");
//!
//!     let store = SqliteStore::open("checkpoints.db")?;
//!     let handler = handler_fn(|_ctx, event| async move {
//!         println!("{} {:?}", event.name(), event.point());
//!         Ok(())
//!     });
//!     let session = client.chain_sync(store, handler, [])?;
//!     let report = session.close().await?;
//!     println!("processed {} blocks", report.blocks);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `ogmios_client::core` - Points, blocks, values, wire codec
//! - `ogmios_client::store` - Checkpoint stores
//! - `ogmios_client::sync` - Sessions and transports

pub mod client;
pub mod error;
pub mod query;

pub use ogmios_core as core;
pub use ogmios_store as store;
pub use ogmios_sync as sync;

pub use client::{Client, ClientConfig, DEFAULT_ENDPOINT};
pub use error::{ClientError, Result};
pub use query::{
    slot_to_elapsed_milliseconds, EraBound, EraHistory, EraMilliseconds, EraParameters,
    EraSeconds, EraStart, EraSummary, ExUnits, ExUnitsBudget, Validator,
};

pub use ogmios_core::{Block, Point, PointStruct, SyncEvent, Tx, Utxo, Value};
pub use ogmios_sync::{SessionConfig, SessionHandle, SessionReport, SessionState};
