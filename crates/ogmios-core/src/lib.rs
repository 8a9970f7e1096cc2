//! # Ogmios Core
//!
//! Pure data model and wire codec for the Ogmios chain-sync protocol.
//!
//! This crate contains no I/O, no storage, no networking. It turns bytes into
//! typed protocol values and back.
//!
//! ## Key Types
//!
//! - [`Point`] - A chain position: the `origin` marker or a slot/hash pair
//! - [`SyncEvent`] - What a chain-sync response means to the consumer
//! - [`Block`] / [`Tx`] / [`Value`] - Current-generation chain model
//! - [`Num`] - Arbitrary-precision amounts
//!
//! ## Generations
//!
//! Nodes answer in one of two schemas. [`compat`] decodes either and always
//! hands back the current one; the [`legacy`] module holds the older model.
//!
//! ## Persistence Formats
//!
//! Points round-trip through JSON, deterministic CBOR (see [`cbor`]) and
//! attribute records (see [`attribute`]).

pub mod attribute;
pub mod block;
pub mod cbor;
pub mod codec;
pub mod compat;
pub mod error;
pub mod legacy;
pub mod num;
pub mod point;
pub mod protocol;
pub mod value;

pub use attribute::AttributeValue;
pub use block::{Block, Tx, TxIn, TxOut, Utxo};
pub use codec::{decode_response, find_intersection, init_id, next_block, Decoded, SyncEvent};
pub use compat::{Compatible, Generational};
pub use error::{CoreError, Result};
pub use num::Num;
pub use point::{display_points, sort_points, Point, PointStruct, ORIGIN};
pub use protocol::{Direction, Method, Response, ResponseError};
pub use value::{AssetId, Coin, Value};
