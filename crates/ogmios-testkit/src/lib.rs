//! # Ogmios Testkit
//!
//! Testing utilities for the Ogmios chain-sync crates.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: exact request bytes and expected decodes for both
//!   wire generations
//! - **Generators**: Proptest strategies for points, amounts and values
//! - **Fixtures**: a synthetic chain plus frame builders and captured payloads
//! - **Scripted node**: an in-memory node that replays a script to a session
//!
//! ## Golden Vectors
//!
//! ```rust
//! use ogmios_core::{find_intersection, init_id};
//! use ogmios_testkit::vectors::request_vectors;
//!
//! for vector in request_vectors().into_iter().filter(|v| v.next_id.is_none()) {
//!     let json = find_intersection(&vector.points, init_id()).to_json().unwrap();
//!     assert_eq!(json, vector.expected, "{}", vector.name);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use ogmios_testkit::generators::point;
//!
//! proptest! {
//!     #[test]
//!     fn cbor_round_trip(p in point()) {
//!         let bytes = p.to_cbor().unwrap();
//!         prop_assert_eq!(ogmios_core::Point::from_cbor(&bytes).unwrap(), Some(p));
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use ogmios_testkit::fixtures::{roll_forward, ChainFixture, Generation};
//!
//! let chain = ChainFixture::new(3);
//! let frame = roll_forward(Generation::Legacy, chain.block(1), &chain.tip(), 1.into());
//! assert!(frame.contains("RequestNext"));
//! ```

pub mod fixtures;
pub mod generators;
pub mod node;
pub mod vectors;

pub use fixtures::{ChainFixture, Generation};
pub use node::{scripted, NodeSession, ScriptedNode, Served, Step};
