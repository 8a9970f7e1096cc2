//! Chain positions.
//!
//! A [`Point`] is either an opaque marker (canonically `"origin"`, before the
//! first block) or a concrete [`PointStruct`] naming a block by slot and
//! header hash, optionally with its height.
//!
//! ## Encodings
//!
//! Points have three independent wire forms, each a pure function over the
//! variant:
//!
//! - **JSON**: a marker is a JSON string, a struct is an object whose
//!   `height` is omitted when absent.
//! - **Binary**: a deterministic CBOR map keyed by variant tag, `1` for a
//!   marker and `2` for a struct. Decoding an empty or `nil` payload yields
//!   no point rather than an error.
//! - **Attribute**: a marker is an `S` scalar, a struct is an `M` map.
//!
//! ## Ordering
//!
//! Points sort most recent first: struct points by slot descending, any
//! struct ahead of any marker, markers in descending lexical order. Height
//! never takes part in equality or ordering.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use ciborium::value::Value as CborValue;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::attribute::{from_attribute, AttributeValue};
use crate::cbor;
use crate::error::{CoreError, Result};

/// The canonical marker for the start of the chain.
pub const ORIGIN: &str = "origin";

/// Variant tags for the binary form.
mod keys {
    pub const STRING: u64 = 1;
    pub const STRUCT: u64 = 2;
}

/// A concrete block position.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PointStruct {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    /// Block header hash, hex encoded.
    pub id: String,
    pub slot: u64,
}

impl PointStruct {
    /// Create a point without height.
    pub fn new(slot: u64, id: impl Into<String>) -> Self {
        Self {
            height: None,
            id: id.into(),
            slot,
        }
    }

    pub fn with_height(mut self, height: u64) -> Self {
        self.height = Some(height);
        self
    }

    /// Check that the hash is well-formed hex.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(CoreError::InvalidPoint("empty hash".into()));
        }
        hex::decode(&self.id)
            .map(|_| ())
            .map_err(|e| CoreError::InvalidPoint(format!("hash {:?} is not hex: {e}", self.id)))
    }

    pub fn point(self) -> Point {
        Point::Struct(self)
    }
}

impl PartialEq for PointStruct {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.id == other.id
    }
}

impl Eq for PointStruct {}

impl Hash for PointStruct {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for PointStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.height {
            Some(h) => write!(f, "slot={} id={} height={}", self.slot, self.id, h),
            None => write!(f, "slot={} id={}", self.slot, self.id),
        }
    }
}

/// A position on the chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Point {
    /// Opaque marker, `"origin"` in practice.
    Marker(String),
    Struct(PointStruct),
}

impl Point {
    /// The origin marker.
    pub fn origin() -> Self {
        Point::Marker(ORIGIN.to_string())
    }

    /// Construct a concrete point, validating the hash.
    pub fn from_struct(slot: u64, hash: impl Into<String>, height: Option<u64>) -> Result<Self> {
        let point = PointStruct {
            height,
            id: hash.into(),
            slot,
        };
        point.validate()?;
        Ok(Point::Struct(point))
    }

    pub fn is_origin(&self) -> bool {
        matches!(self, Point::Marker(s) if s == ORIGIN)
    }

    pub fn as_struct(&self) -> Option<&PointStruct> {
        match self {
            Point::Struct(p) => Some(p),
            Point::Marker(_) => None,
        }
    }

    pub fn as_marker(&self) -> Option<&str> {
        match self {
            Point::Marker(s) => Some(s),
            Point::Struct(_) => None,
        }
    }

    /// Slot of a concrete point.
    pub fn slot(&self) -> Option<u64> {
        self.as_struct().map(|p| p.slot)
    }

    /// True if a rollback to `to` leaves this point off the chain.
    ///
    /// Concrete points above `to`, or at its slot with another hash, are
    /// orphaned. Markers never are. A rollback to a marker orphans every
    /// concrete point.
    pub fn orphaned_by(&self, to: &Point) -> bool {
        match (self, to) {
            (Point::Marker(_), _) => false,
            (Point::Struct(_), Point::Marker(_)) => true,
            (Point::Struct(p), Point::Struct(t)) => {
                p.slot > t.slot || (p.slot == t.slot && p.id != t.id)
            }
        }
    }

    /// Validate a point supplied by a caller or a store.
    pub fn validate(&self) -> Result<()> {
        match self {
            Point::Marker(s) if s.is_empty() => Err(CoreError::InvalidPoint("empty marker".into())),
            Point::Marker(_) => Ok(()),
            Point::Struct(p) => p.validate(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Binary form
    // ─────────────────────────────────────────────────────────────────────

    /// Encode as a deterministic CBOR map keyed by variant tag.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        cbor::encode_canonical(&self.to_cbor_value())
    }

    /// Decode the binary form. An empty or `nil` payload, or a map with
    /// neither variant present, decodes to `None`.
    pub fn from_cbor(data: &[u8]) -> Result<Option<Self>> {
        if data.is_empty() || data == b"nil" {
            return Ok(None);
        }
        let value = cbor::decode_value(data)?;
        Self::from_cbor_value(&value)
    }

    fn to_cbor_value(&self) -> CborValue {
        let entry = match self {
            Point::Marker(s) => (
                CborValue::Integer(keys::STRING.into()),
                CborValue::Text(s.clone()),
            ),
            Point::Struct(p) => (
                CborValue::Integer(keys::STRUCT.into()),
                struct_to_cbor(p),
            ),
        };
        CborValue::Map(vec![entry])
    }

    fn from_cbor_value(value: &CborValue) -> Result<Option<Self>> {
        let entries = match value {
            CborValue::Null => return Ok(None),
            CborValue::Map(m) => m,
            _ => return Err(CoreError::CborDecoding("point: expected map".into())),
        };

        if let Some(inner) = cbor::get_int_key(entries, keys::STRUCT) {
            if !matches!(inner, CborValue::Null) {
                return struct_from_cbor(inner).map(|p| Some(Point::Struct(p)));
            }
        }
        match cbor::get_int_key(entries, keys::STRING) {
            Some(CborValue::Text(s)) if !s.is_empty() => Ok(Some(Point::Marker(s.clone()))),
            Some(CborValue::Text(_)) | Some(CborValue::Null) | None => Ok(None),
            Some(_) => Err(CoreError::CborDecoding("point: marker must be text".into())),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Attribute form
    // ─────────────────────────────────────────────────────────────────────

    /// Encode as an attribute node: `S` for a marker, `M` for a struct.
    pub fn to_attribute(&self) -> Result<AttributeValue> {
        crate::attribute::to_attribute(self)
    }

    /// Decode an attribute node, inferring the variant from which form is
    /// populated. A null node decodes to `None`.
    pub fn from_attribute(item: &AttributeValue) -> Result<Option<Self>> {
        match item {
            AttributeValue::Null(_) => Ok(None),
            AttributeValue::S(s) => Ok(Some(Point::Marker(s.clone()))),
            AttributeValue::M(m) if m.is_empty() => Ok(None),
            AttributeValue::M(_) => from_attribute::<PointStruct>(item).map(|p| Some(Point::Struct(p))),
            other => Err(CoreError::Attribute(format!(
                "point: unexpected {} node",
                other.kind()
            ))),
        }
    }
}

fn struct_to_cbor(p: &PointStruct) -> CborValue {
    let mut entries = Vec::with_capacity(3);
    if let Some(h) = p.height {
        entries.push((CborValue::Text("height".into()), CborValue::Integer(h.into())));
    }
    entries.push((CborValue::Text("id".into()), CborValue::Text(p.id.clone())));
    entries.push((CborValue::Text("slot".into()), CborValue::Integer(p.slot.into())));
    CborValue::Map(entries)
}

fn struct_from_cbor(value: &CborValue) -> Result<PointStruct> {
    let entries = match value {
        CborValue::Map(m) => m,
        _ => return Err(CoreError::CborDecoding("point struct: expected map".into())),
    };
    let slot = cbor::get_text_key(entries, "slot")
        .and_then(cbor::as_u64)
        .ok_or_else(|| CoreError::CborDecoding("point struct: missing slot".into()))?;
    let id = match cbor::get_text_key(entries, "id") {
        Some(CborValue::Text(s)) => s.clone(),
        _ => return Err(CoreError::CborDecoding("point struct: missing id".into())),
    };
    let height = match cbor::get_text_key(entries, "height") {
        None | Some(CborValue::Null) => None,
        Some(v) => Some(
            cbor::as_u64(v)
                .ok_or_else(|| CoreError::CborDecoding("point struct: bad height".into()))?,
        ),
    };
    Ok(PointStruct { height, id, slot })
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Point::Marker(s) => f.write_str(s),
            Point::Struct(p) => p.fmt(f),
        }
    }
}

impl From<PointStruct> for Point {
    fn from(p: PointStruct) -> Self {
        Point::Struct(p)
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Point::Struct(a), Point::Struct(b)) => {
                b.slot.cmp(&a.slot).then_with(|| a.id.cmp(&b.id))
            }
            (Point::Struct(_), Point::Marker(_)) => Ordering::Less,
            (Point::Marker(_), Point::Struct(_)) => Ordering::Greater,
            (Point::Marker(a), Point::Marker(b)) => b.cmp(a),
        }
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort points most recent first. Stable.
pub fn sort_points(points: &mut [Point]) {
    points.sort();
}

/// Render a list of points for logs.
pub fn display_points(points: &[Point]) -> String {
    points
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ─────────────────────────────────────────────────────────────────────────
// JSON form (serde)
// ─────────────────────────────────────────────────────────────────────────

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Point::Marker(s) => serializer.serialize_str(s),
            Point::Struct(p) => p.serialize(serializer),
        }
    }
}

struct PointVisitor;

impl<'de> Visitor<'de> for PointVisitor {
    type Value = Point;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a point marker string or a {slot, id} object")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Point, E> {
        Ok(Point::Marker(v.to_string()))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> std::result::Result<Point, A::Error> {
        let inner = PointStruct::deserialize(de::value::MapAccessDeserializer::new(map))?;
        Ok(Point::Struct(inner))
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(PointVisitor)
    }
}
