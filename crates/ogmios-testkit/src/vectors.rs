//! Golden wire vectors.
//!
//! Request vectors pin the exact bytes a session sends. Response vectors pin
//! what each frame shape decodes to, for both wire generations.

use ogmios_core::{Point, PointStruct};

use crate::fixtures::{CURRENT_ROLL_FORWARD, LEGACY_FAULT, LEGACY_ROLL_FORWARD};

/// An outgoing request and its exact serialization.
#[derive(Debug, Clone)]
pub struct RequestVector {
    pub name: &'static str,
    /// Resume points, most recent first. Empty for `nextBlock`.
    pub points: Vec<Point>,
    /// `nextBlock` correlation id; `None` for the intersection request.
    pub next_id: Option<u64>,
    pub expected: &'static str,
}

pub fn request_vectors() -> Vec<RequestVector> {
    vec![
        RequestVector {
            name: "intersection from a single checkpoint",
            points: vec![PointStruct::new(456, "hash").point()],
            next_id: None,
            expected: r#"{"id":{"step":"INIT"},"jsonrpc":"2.0","method":"findIntersection","params":{"points":[{"id":"hash","slot":456}]}}"#,
        },
        RequestVector {
            name: "intersection from origin",
            points: vec![Point::origin()],
            next_id: None,
            expected: r#"{"id":{"step":"INIT"},"jsonrpc":"2.0","method":"findIntersection","params":{"points":["origin"]}}"#,
        },
        RequestVector {
            name: "intersection with fallback to origin",
            points: vec![PointStruct::new(20, "bb").point(), Point::origin()],
            next_id: None,
            expected: r#"{"id":{"step":"INIT"},"jsonrpc":"2.0","method":"findIntersection","params":{"points":[{"id":"bb","slot":20},"origin"]}}"#,
        },
        RequestVector {
            name: "first pipelined nextBlock",
            points: Vec::new(),
            next_id: Some(1),
            expected: r#"{"id":1,"jsonrpc":"2.0","method":"nextBlock"}"#,
        },
    ]
}

/// An incoming frame and the event it must decode to.
#[derive(Debug, Clone)]
pub struct ResponseVector {
    pub name: &'static str,
    pub frame: &'static str,
    /// `SyncEvent::name()` of the decoded event.
    pub event: &'static str,
    pub point: Option<Point>,
    pub tip: Option<PointStruct>,
    /// Correlation id, rendered as JSON.
    pub id: Option<&'static str>,
}

const BLOCK_ID: &str = "1f7e2d4c6b8a0e9f1d3c5b7a9e8f0d2c4b6a8e0f1d3c5b7a9f8e0d2c4b6a8e0f";

pub fn response_vectors() -> Vec<ResponseVector> {
    vec![
        ResponseVector {
            name: "current roll forward",
            frame: CURRENT_ROLL_FORWARD,
            event: "RollForward",
            point: Some(PointStruct::new(47_000_000, BLOCK_ID).point()),
            tip: Some(PointStruct::new(47_000_100, "2a6b")),
            id: Some("1"),
        },
        ResponseVector {
            name: "legacy roll forward",
            frame: LEGACY_ROLL_FORWARD,
            event: "RollForward",
            point: Some(PointStruct::new(47_000_000, BLOCK_ID).point()),
            tip: Some(PointStruct::new(47_000_100, "2a6b")),
            id: Some("1"),
        },
        ResponseVector {
            name: "current roll backward to origin",
            frame: r#"{"jsonrpc":"2.0","method":"nextBlock","result":{"direction":"backward","point":"origin","tip":{"slot":9,"id":"aa","height":1}},"id":4}"#,
            event: "RollBackward",
            point: Some(Point::origin()),
            tip: Some(PointStruct::new(9, "aa")),
            id: Some("4"),
        },
        ResponseVector {
            name: "legacy roll backward",
            frame: r#"{"type":"jsonwsp/response","version":"1.0","servicename":"ogmios","methodname":"RequestNext","result":{"RollBackward":{"point":{"slot":5,"hash":"aa"},"tip":{"slot":9,"hash":"bb","blockNo":2}}},"reflection":3}"#,
            event: "RollBackward",
            point: Some(PointStruct::new(5, "aa").point()),
            tip: Some(PointStruct::new(9, "bb")),
            id: Some("3"),
        },
        ResponseVector {
            name: "current intersection found",
            frame: r#"{"jsonrpc":"2.0","method":"findIntersection","result":{"intersection":{"slot":456,"id":"hash"},"tip":{"slot":900,"id":"cc","height":12}},"id":{"step":"INIT"}}"#,
            event: "IntersectionFound",
            point: Some(PointStruct::new(456, "hash").point()),
            tip: Some(PointStruct::new(900, "cc")),
            id: Some(r#"{"step":"INIT"}"#),
        },
        ResponseVector {
            name: "legacy intersection found",
            frame: r#"{"type":"jsonwsp/response","version":"1.0","servicename":"ogmios","methodname":"FindIntersect","result":{"IntersectionFound":{"point":{"slot":456,"hash":"hash"},"tip":{"slot":900,"hash":"cc","blockNo":12}}},"reflection":{"step":"INIT"}}"#,
            event: "IntersectionFound",
            point: Some(PointStruct::new(456, "hash").point()),
            tip: Some(PointStruct::new(900, "cc")),
            id: Some(r#"{"step":"INIT"}"#),
        },
        ResponseVector {
            name: "current intersection not found",
            frame: r#"{"jsonrpc":"2.0","method":"findIntersection","error":{"code":1000,"message":"No intersection found.","data":{"tip":{"slot":900,"id":"cc"}}},"id":{"step":"INIT"}}"#,
            event: "IntersectionNotFound",
            point: None,
            tip: Some(PointStruct::new(900, "cc")),
            id: Some(r#"{"step":"INIT"}"#),
        },
        ResponseVector {
            name: "legacy intersection not found",
            frame: r#"{"type":"jsonwsp/response","version":"1.0","servicename":"ogmios","methodname":"FindIntersect","result":{"IntersectionNotFound":{"tip":{"slot":900,"hash":"cc","blockNo":12}}},"reflection":{"step":"INIT"}}"#,
            event: "IntersectionNotFound",
            point: None,
            tip: Some(PointStruct::new(900, "cc")),
            id: Some(r#"{"step":"INIT"}"#),
        },
        ResponseVector {
            name: "legacy fault",
            frame: LEGACY_FAULT,
            event: "ProtocolError",
            point: None,
            tip: None,
            id: Some("2"),
        },
    ]
}
