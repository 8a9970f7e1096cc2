//! Chain-sync request builders and response decoding.
//!
//! Requests are always emitted in the current generation. Responses may
//! arrive in either generation; [`decode_response`] reads the method and
//! error discriminants first, then hands the envelope to the compatibility
//! layer and flattens the result into a [`SyncEvent`].

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::block::Block;
use crate::compat::decode_json;
use crate::error::{CoreError, Result};
use crate::legacy::FaultV5;
use crate::point::{Point, PointStruct};
use crate::protocol::{
    Direction, Method, Response, ResponseError, ResponseResult, ResultFindIntersection,
    ResultNextBlock, JSONRPC_VERSION,
};

/// Step tag carried by the correlation id of the initial intersection request.
pub const INIT_STEP: &str = "INIT";

/// A JSON-RPC request envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request<P = JsonValue> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonValue>,
    pub jsonrpc: String,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<P>,
}

impl<P: Serialize> Request<P> {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FindIntersectionParams {
    pub points: Vec<Point>,
}

/// The correlation id of the initial intersection request: `{"step":"INIT"}`.
pub fn init_id() -> JsonValue {
    let mut id = serde_json::Map::new();
    id.insert("step".into(), JsonValue::from(INIT_STEP));
    JsonValue::Object(id)
}

/// True if `id` is the initial intersection request's id.
pub fn is_init_id(id: &JsonValue) -> bool {
    id.get("step").and_then(JsonValue::as_str) == Some(INIT_STEP)
}

/// `findIntersection` with candidates in preference order.
pub fn find_intersection(points: &[Point], id: JsonValue) -> Request<FindIntersectionParams> {
    Request {
        id: Some(id),
        jsonrpc: JSONRPC_VERSION.into(),
        method: Method::FindIntersection,
        params: Some(FindIntersectionParams {
            points: points.to_vec(),
        }),
    }
}

pub fn next_block(id: JsonValue) -> Request<()> {
    Request {
        id: Some(id),
        jsonrpc: JSONRPC_VERSION.into(),
        method: Method::NextBlock,
        params: None,
    }
}

/// A decoded chain-sync notification.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncEvent {
    RollForward {
        block: Box<Block>,
        tip: PointStruct,
    },
    RollBackward {
        point: Point,
        tip: PointStruct,
    },
    IntersectionFound {
        point: Point,
        tip: PointStruct,
    },
    /// Legacy nodes may omit the tip.
    IntersectionNotFound {
        tip: Option<PointStruct>,
    },
    ProtocolError {
        code: i64,
        message: String,
    },
}

impl SyncEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::RollForward { .. } => "RollForward",
            SyncEvent::RollBackward { .. } => "RollBackward",
            SyncEvent::IntersectionFound { .. } => "IntersectionFound",
            SyncEvent::IntersectionNotFound { .. } => "IntersectionNotFound",
            SyncEvent::ProtocolError { .. } => "ProtocolError",
        }
    }

    /// The chain position this event leaves the consumer at.
    pub fn point(&self) -> Option<Point> {
        match self {
            SyncEvent::RollForward { block, .. } => Some(block.point().point()),
            SyncEvent::RollBackward { point, .. } | SyncEvent::IntersectionFound { point, .. } => {
                Some(point.clone())
            }
            _ => None,
        }
    }

    pub fn tip(&self) -> Option<&PointStruct> {
        match self {
            SyncEvent::RollForward { tip, .. }
            | SyncEvent::RollBackward { tip, .. }
            | SyncEvent::IntersectionFound { tip, .. } => Some(tip),
            SyncEvent::IntersectionNotFound { tip } => tip.as_ref(),
            SyncEvent::ProtocolError { .. } => None,
        }
    }
}

/// A decoded response with its correlation id.
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded {
    pub id: Option<JsonValue>,
    pub method: Method,
    pub event: SyncEvent,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    methodname: Option<String>,
    #[serde(default)]
    error: Option<ResponseError>,
    #[serde(default)]
    fault: Option<FaultV5>,
    #[serde(default)]
    id: Option<JsonValue>,
    #[serde(default)]
    reflection: Option<JsonValue>,
}

/// Decode a chain-sync response of either generation.
pub fn decode_response(data: &[u8]) -> Result<Decoded> {
    let envelope: Envelope = serde_json::from_slice(data)?;
    let name = envelope
        .method
        .as_deref()
        .or(envelope.methodname.as_deref())
        .ok_or_else(|| CoreError::MalformedMessage("response has no method".into()))?;
    let method = Method::from_name(name)?;
    let id = envelope.id.or(envelope.reflection);

    let error = envelope
        .error
        .or_else(|| envelope.fault.as_ref().map(FaultV5::to_current));
    if let Some(error) = error {
        return Ok(Decoded {
            id,
            method,
            event: error_event(method, error),
        });
    }

    let response: Response = decode_json(data)?;
    let event = match response.result {
        Some(ResponseResult::FindIntersection(r)) => find_intersection_event(r)?,
        Some(ResponseResult::NextBlock(r)) => next_block_event(r)?,
        None => {
            return Err(CoreError::MalformedMessage(format!(
                "{method} response has neither result nor error"
            )))
        }
    };
    Ok(Decoded { id, method, event })
}

/// Intersection misses are reported as errors by current nodes.
fn error_event(method: Method, error: ResponseError) -> SyncEvent {
    if method == Method::FindIntersection && error.is_intersection_not_found() {
        return SyncEvent::IntersectionNotFound { tip: error.tip() };
    }
    SyncEvent::ProtocolError {
        code: error.code,
        message: error.message,
    }
}

fn missing(field: &str, event: &str) -> CoreError {
    CoreError::MalformedMessage(format!("{event} without {field}"))
}

fn find_intersection_event(r: ResultFindIntersection) -> Result<SyncEvent> {
    if let Some(point) = r.intersection {
        let tip = r.tip.ok_or_else(|| missing("tip", "IntersectionFound"))?;
        return Ok(SyncEvent::IntersectionFound { point, tip });
    }
    if let Some(error) = r.error {
        return Ok(error_event(Method::FindIntersection, error));
    }
    Ok(SyncEvent::IntersectionNotFound { tip: r.tip })
}

fn next_block_event(r: ResultNextBlock) -> Result<SyncEvent> {
    match r.direction {
        Direction::Forward => Ok(SyncEvent::RollForward {
            block: Box::new(r.block.ok_or_else(|| missing("block", "RollForward"))?),
            tip: r.tip.ok_or_else(|| missing("tip", "RollForward"))?,
        }),
        Direction::Backward => Ok(SyncEvent::RollBackward {
            point: r.point.ok_or_else(|| missing("point", "RollBackward"))?,
            tip: r.tip.ok_or_else(|| missing("tip", "RollBackward"))?,
        }),
    }
}
