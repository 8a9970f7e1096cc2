//! Current-generation chain-sync wire model.
//!
//! Responses are JSON-RPC 2.0 envelopes whose `result` shape depends on the
//! method. [`Response`] carries the decoded method together with exactly
//! one populated [`ResponseResult`] variant; accessors return
//! [`CoreError::WrongVariant`] instead of panicking on a mismatch.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::block::Block;
use crate::error::{CoreError, Result};
use crate::point::{Point, PointStruct};

/// JSON-RPC version marker.
pub const JSONRPC_VERSION: &str = "2.0";

/// Error code a node reports when none of the requested points is on chain.
pub const INTERSECTION_NOT_FOUND_CODE: i64 = 1000;

/// Chain-sync methods, known under two names each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    FindIntersection,
    NextBlock,
}

impl Method {
    /// Resolve a method name from either protocol generation.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "findIntersection" | "FindIntersect" => Ok(Method::FindIntersection),
            "nextBlock" | "RequestNext" => Ok(Method::NextBlock),
            other => Err(CoreError::UnknownMethod(other.to_string())),
        }
    }

    /// Current-generation name.
    pub fn name(self) -> &'static str {
        match self {
            Method::FindIntersection => "findIntersection",
            Method::NextBlock => "nextBlock",
        }
    }

    /// Legacy-generation name.
    pub fn legacy_name(self) -> &'static str {
        match self {
            Method::FindIntersection => "FindIntersect",
            Method::NextBlock => "RequestNext",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Method::from_name(&name).map_err(de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

/// A node-reported error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

impl ResponseError {
    /// The chain tip embedded in `data.tip`, if any.
    pub fn tip(&self) -> Option<PointStruct> {
        let tip = self.data.as_ref()?.get("tip")?;
        serde_json::from_value(tip.clone()).ok()
    }

    pub fn is_intersection_not_found(&self) -> bool {
        self.code == INTERSECTION_NOT_FOUND_CODE
    }
}

/// Result of `findIntersection`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultFindIntersection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intersection: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<PointStruct>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonValue>,
}

/// Result of `nextBlock`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultNextBlock {
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<PointStruct>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<Block>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<Point>,
}

/// The method-specific payload of a response.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseResult {
    FindIntersection(ResultFindIntersection),
    NextBlock(ResultNextBlock),
}

impl ResponseResult {
    pub fn method(&self) -> Method {
        match self {
            ResponseResult::FindIntersection(_) => Method::FindIntersection,
            ResponseResult::NextBlock(_) => Method::NextBlock,
        }
    }

    fn variant_name(&self) -> &'static str {
        self.method().name()
    }

    /// Decode a raw result for the given method.
    pub fn from_json_value(method: Method, value: JsonValue) -> Result<Self> {
        Ok(match method {
            Method::FindIntersection => {
                ResponseResult::FindIntersection(serde_json::from_value(value)?)
            }
            Method::NextBlock => ResponseResult::NextBlock(serde_json::from_value(value)?),
        })
    }
}

impl Serialize for ResponseResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ResponseResult::FindIntersection(r) => r.serialize(serializer),
            ResponseResult::NextBlock(r) => r.serialize(serializer),
        }
    }
}

/// A chain-sync response envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub jsonrpc: String,
    pub method: Method,
    pub result: Option<ResponseResult>,
    pub error: Option<ResponseError>,
    pub id: Option<JsonValue>,
}

impl Response {
    /// The `findIntersection` result, or `WrongVariant`.
    pub fn find_intersection(&self) -> Result<&ResultFindIntersection> {
        match &self.result {
            Some(ResponseResult::FindIntersection(r)) => Ok(r),
            other => Err(wrong_variant("findIntersection", other.as_ref())),
        }
    }

    /// The `nextBlock` result, or `WrongVariant`.
    pub fn next_block(&self) -> Result<&ResultNextBlock> {
        match &self.result {
            Some(ResponseResult::NextBlock(r)) => Ok(r),
            other => Err(wrong_variant("nextBlock", other.as_ref())),
        }
    }
}

fn wrong_variant(expected: &'static str, actual: Option<&ResponseResult>) -> CoreError {
    CoreError::WrongVariant {
        expected,
        actual: actual.map_or("none", ResponseResult::variant_name),
    }
}

#[derive(Serialize)]
struct ResponseRepr<'a> {
    jsonrpc: &'a str,
    method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a ResponseResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ResponseError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a JsonValue>,
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    jsonrpc: String,
    method: Method,
    #[serde(default)]
    result: Option<JsonValue>,
    #[serde(default)]
    error: Option<ResponseError>,
    #[serde(default)]
    id: Option<JsonValue>,
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        ResponseRepr {
            jsonrpc: &self.jsonrpc,
            method: self.method,
            result: self.result.as_ref(),
            error: self.error.as_ref(),
            id: self.id.as_ref(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Response {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawResponse::deserialize(deserializer)?;
        let result = match raw.result {
            None | Some(JsonValue::Null) => None,
            Some(value) => Some(
                ResponseResult::from_json_value(raw.method, value).map_err(de::Error::custom)?,
            ),
        };
        Ok(Response {
            jsonrpc: raw.jsonrpc,
            method: raw.method,
            result,
            error: raw.error,
            id: raw.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_aliases() {
        assert_eq!(Method::from_name("findIntersection").unwrap(), Method::FindIntersection);
        assert_eq!(Method::from_name("FindIntersect").unwrap(), Method::FindIntersection);
        assert_eq!(Method::from_name("nextBlock").unwrap(), Method::NextBlock);
        assert_eq!(Method::from_name("RequestNext").unwrap(), Method::NextBlock);
        assert!(matches!(
            Method::from_name("queryLedgerState/tip"),
            Err(CoreError::UnknownMethod(_))
        ));
    }

    #[test]
    fn test_response_accessors() {
        let json = r#"{
            "jsonrpc": "2.0",
            "method": "nextBlock",
            "result": {"direction": "backward", "point": "origin", "tip": {"slot": 9, "id": "aa", "height": 3}},
            "id": 4
        }"#;
        let response: Response = serde_json::from_str(json).unwrap();
        let next = response.next_block().unwrap();
        assert_eq!(next.direction, Direction::Backward);
        assert_eq!(next.point, Some(Point::origin()));

        let err = response.find_intersection().unwrap_err();
        assert!(matches!(
            err,
            CoreError::WrongVariant {
                expected: "findIntersection",
                actual: "nextBlock"
            }
        ));
    }

    #[test]
    fn test_error_tip() {
        let json = r#"{
            "jsonrpc": "2.0",
            "method": "findIntersection",
            "error": {"code": 1000, "message": "No intersection found.", "data": {"tip": {"slot": 10, "id": "ab"}}},
            "id": null
        }"#;
        let response: Response = serde_json::from_str(json).unwrap();
        let error = response.error.unwrap();
        assert!(error.is_intersection_not_found());
        assert_eq!(error.tip(), Some(PointStruct::new(10, "ab")));
        assert!(response.result.is_none());
    }

    #[test]
    fn test_unknown_method_rejected() {
        let json = r#"{"jsonrpc": "2.0", "method": "submitTransaction", "result": {}}"#;
        assert!(serde_json::from_str::<Response>(json).is_err());
    }
}
