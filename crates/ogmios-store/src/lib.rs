//! # Ogmios Store
//!
//! Checkpoint persistence for chain-sync sessions. A session loads candidate
//! resume points from a [`CheckpointStore`] before it connects, and saves
//! each point its consumer has finished processing.
//!
//! ## Key Types
//!
//! - [`CheckpointStore`] - The async trait sessions consume
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests and short-lived tails
//! - [`LoggingStore`] - Logs saves, never resumes
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ogmios_store::{CheckpointStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("checkpoints.db").unwrap();
//!     let resume = store.load().await.unwrap();
//!     println!("resuming from {} candidate points", resume.len());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Most recent first**: `load` returns points in intersection preference order
//! - **Idempotent saves**: re-saving a point replaces it
//! - **Bounded**: every store keeps only the newest few points

pub mod error;
pub mod logging;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use logging::LoggingStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::CheckpointStore;
