//! Test fixtures and helpers.
//!
//! A [`ChainFixture`] is a synthetic linear chain. The frame builders render
//! node responses in either wire generation, so the same scenario can be
//! replayed against a current or a legacy node.

use ogmios_core::block::KIND_PRAOS;
use ogmios_core::legacy::ResponseV5;
use ogmios_core::protocol::{
    Response, ResponseError, ResponseResult, ResultFindIntersection, ResultNextBlock,
    INTERSECTION_NOT_FOUND_CODE, JSONRPC_VERSION,
};
use ogmios_core::{init_id, Block, Direction, Method, Point, PointStruct};
use serde_json::Value as JsonValue;

/// Wire generation of generated frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Current,
    Legacy,
}

/// A synthetic chain of babbage blocks, ten slots apart.
pub struct ChainFixture {
    blocks: Vec<Block>,
}

impl ChainFixture {
    /// Create a chain of `len` blocks at heights `1..=len`.
    pub fn new(len: u64) -> Self {
        Self {
            blocks: (1..=len).map(block_at).collect(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The block at `height`. Heights start at 1.
    pub fn block(&self, height: u64) -> &Block {
        &self.blocks[(height - 1) as usize]
    }

    pub fn point(&self, height: u64) -> Point {
        self.block(height).point().point()
    }

    /// A competing chain sharing blocks `1..=at`, followed by `len` blocks
    /// with different hashes.
    pub fn fork(&self, at: u64, len: u64) -> Self {
        let mut blocks: Vec<Block> = self.blocks.iter().take(at as usize).cloned().collect();
        for height in at + 1..=at + len {
            let ancestor = blocks.last().map_or_else(|| block_hash(0), |b| b.id.clone());
            blocks.push(Block {
                id: fork_hash(height),
                ancestor,
                ..block_at(height)
            });
        }
        Self { blocks }
    }

    /// The last block's point.
    pub fn tip(&self) -> PointStruct {
        self.blocks
            .last()
            .map_or_else(|| PointStruct::new(0, block_hash(0)), Block::point)
    }
}

/// A 32-byte hex hash derived from `height`.
pub fn block_hash(height: u64) -> String {
    format!("{height:064x}")
}

/// Hash of a block at `height` on a fork.
pub fn fork_hash(height: u64) -> String {
    format!("f{height:063x}")
}

/// A babbage block at `height`, slot `height * 10`.
pub fn block_at(height: u64) -> Block {
    Block {
        kind: KIND_PRAOS.into(),
        era: "babbage".into(),
        id: block_hash(height),
        ancestor: block_hash(height.saturating_sub(1)),
        height: Some(height),
        slot: height * 10,
        ..Default::default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frames
// ─────────────────────────────────────────────────────────────────────────────

fn render(generation: Generation, response: Response) -> String {
    let rendered = match generation {
        Generation::Current => serde_json::to_string(&response),
        Generation::Legacy => ResponseV5::from_current(&response)
            .map_err(|e| serde::ser::Error::custom(e.to_string()))
            .and_then(|legacy| serde_json::to_string(&legacy)),
    };
    rendered.expect("fixture frames serialize")
}

fn response(method: Method, result: Option<ResponseResult>, id: JsonValue) -> Response {
    Response {
        jsonrpc: JSONRPC_VERSION.into(),
        method,
        result,
        error: None,
        id: Some(id),
    }
}

pub fn intersection_found(generation: Generation, point: &Point, tip: &PointStruct) -> String {
    let result = ResultFindIntersection {
        intersection: Some(point.clone()),
        tip: Some(tip.clone()),
        ..Default::default()
    };
    render(
        generation,
        response(
            Method::FindIntersection,
            Some(ResponseResult::FindIntersection(result)),
            init_id(),
        ),
    )
}

pub fn intersection_not_found(generation: Generation, tip: &PointStruct) -> String {
    let mut data = serde_json::Map::new();
    data.insert(
        "tip".into(),
        serde_json::to_value(tip).expect("fixture tips serialize"),
    );
    let mut r = response(Method::FindIntersection, None, init_id());
    r.error = Some(ResponseError {
        code: INTERSECTION_NOT_FOUND_CODE,
        message: "No intersection found.".into(),
        data: Some(JsonValue::Object(data)),
    });
    render(generation, r)
}

pub fn roll_forward(generation: Generation, block: &Block, tip: &PointStruct, id: JsonValue) -> String {
    let result = ResultNextBlock {
        direction: Direction::Forward,
        tip: Some(tip.clone()),
        block: Some(block.clone()),
        point: None,
    };
    render(
        generation,
        response(Method::NextBlock, Some(ResponseResult::NextBlock(result)), id),
    )
}

pub fn roll_backward(generation: Generation, point: &Point, tip: &PointStruct, id: JsonValue) -> String {
    let result = ResultNextBlock {
        direction: Direction::Backward,
        tip: Some(tip.clone()),
        block: None,
        point: Some(point.clone()),
    };
    render(
        generation,
        response(Method::NextBlock, Some(ResponseResult::NextBlock(result)), id),
    )
}

/// An application error; legacy nodes report it as a JSON-WSP fault.
pub fn protocol_error(
    generation: Generation,
    method: Method,
    code: i64,
    message: &str,
    id: JsonValue,
) -> String {
    let mut r = response(method, None, id);
    r.error = Some(ResponseError {
        code,
        message: message.into(),
        data: None,
    });
    render(generation, r)
}

// ─────────────────────────────────────────────────────────────────────────────
// Captured payloads
// ─────────────────────────────────────────────────────────────────────────────

/// A legacy alonzo roll-forward carrying one transaction.
pub const LEGACY_ROLL_FORWARD: &str = r#"{
  "type": "jsonwsp/response",
  "version": "1.0",
  "servicename": "ogmios",
  "methodname": "RequestNext",
  "result": {
    "RollForward": {
      "block": {
        "alonzo": {
          "body": [{
            "id": "3a4eb4b1e6b0e1bf0c4ab0b3a1bba8c0ee9c0c37bd08b7bfad1b1a4e9d0f0a11",
            "body": {
              "inputs": [{"txId": "ab2f0c9d3b1e4c6a8f7d5e3c1b9a8f7e6d5c4b3a2f1e0d9c8b7a6f5e4d3c2b1a", "index": 1}],
              "outputs": [{"address": "addr_test1vz", "value": {"coins": 1500000, "assets": {}}}],
              "fee": 170000,
              "validityInterval": {"invalidBefore": null, "invalidHereafter": 48000000}
            },
            "witness": {"signatures": {}, "scripts": {}, "datums": {}, "redeemers": {}, "bootstrap": []},
            "raw": "hKQAgYJYIA=="
          }],
          "header": {
            "blockHeight": 3000000,
            "blockSize": 1024,
            "prevHash": "9f3b6c1d2e4a5b6c7d8e9f0a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e",
            "slot": 47000000,
            "issuerVK": "5c0a"
          },
          "headerHash": "1f7e2d4c6b8a0e9f1d3c5b7a9e8f0d2c4b6a8e0f1d3c5b7a9f8e0d2c4b6a8e0f"
        }
      },
      "tip": {"slot": 47000100, "hash": "2a6b", "blockNo": 3000005}
    }
  },
  "reflection": 1
}"#;

/// A current babbage roll-forward.
pub const CURRENT_ROLL_FORWARD: &str = r#"{
  "jsonrpc": "2.0",
  "method": "nextBlock",
  "result": {
    "direction": "forward",
    "block": {
      "type": "praos",
      "era": "babbage",
      "id": "1f7e2d4c6b8a0e9f1d3c5b7a9e8f0d2c4b6a8e0f1d3c5b7a9f8e0d2c4b6a8e0f",
      "ancestor": "9f3b6c1d2e4a5b6c7d8e9f0a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e",
      "height": 3000000,
      "slot": 47000000,
      "size": {"bytes": 1024},
      "transactions": [{
        "id": "3a4eb4b1e6b0e1bf0c4ab0b3a1bba8c0ee9c0c37bd08b7bfad1b1a4e9d0f0a11",
        "spends": "inputs",
        "inputs": [{"transaction": {"id": "ab2f0c9d3b1e4c6a8f7d5e3c1b9a8f7e6d5c4b3a2f1e0d9c8b7a6f5e4d3c2b1a"}, "index": 1}],
        "outputs": [{"address": "addr_test1vz", "value": {"ada": {"lovelace": 1500000}}}],
        "fee": {"ada": {"lovelace": 170000}},
        "cbor": "84a40081825820"
      }]
    },
    "tip": {"slot": 47000100, "id": "2a6b", "height": 3000005}
  },
  "id": 1
}"#;

/// A legacy fault for a `RequestNext`.
pub const LEGACY_FAULT: &str = r#"{
  "type": "jsonwsp/fault",
  "version": "1.0",
  "servicename": "ogmios",
  "methodname": "RequestNext",
  "fault": {"code": "client", "string": "Invalid request: unexpected field."},
  "reflection": 2
}"#;
