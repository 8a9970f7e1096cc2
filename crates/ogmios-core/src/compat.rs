//! Two-generation wire compatibility.
//!
//! Nodes speak one of two incompatible schemas and say nothing about which.
//! Every decode here is a speculative double attempt:
//!
//! 1. decode as the current generation and accept if a field only that
//!    generation has is populated;
//! 2. otherwise decode as the legacy generation, accept if its own
//!    distinguishing field is populated, and convert;
//! 3. otherwise fail with [`CoreError::IncompatibleWireFormat`] carrying both
//!    decode errors.
//!
//! Encoding always emits the legacy generation.
//!
//! ## Encodings
//!
//! The same [`Generational`] conversion backs JSON, CBOR and attribute
//! records. Only the parsing step differs between them.
//!
//! The detection is a heuristic. A future schema that populates a
//! distinguishing field of the other generation would be misread.

use std::fmt::Display;
use std::ops::{Deref, DerefMut};

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::attribute::{from_attribute, to_attribute, AttributeValue};
use crate::block::Tx;
use crate::error::{CoreError, Result};
use crate::legacy::{
    ResponseV5, ResultFindIntersectionV5, ResultNextBlockV5, TxV5, ValueV5,
};
use crate::protocol::{Response, ResultFindIntersection, ResultNextBlock};
use crate::value::Value;

/// A type with a current and a legacy wire representation.
pub trait Generational: Sized {
    /// Name used in error messages.
    const KIND: &'static str;

    type Legacy;

    /// True if a field only the current generation has is populated.
    fn is_current(&self) -> bool;

    /// True if a field only the legacy generation has is populated.
    fn is_legacy(legacy: &Self::Legacy) -> bool;

    fn from_legacy(legacy: Self::Legacy) -> Result<Self>;

    fn to_legacy(&self) -> Result<Self::Legacy>;
}

const NO_CURRENT_FIELDS: &str = "no current-generation field present";
const NO_LEGACY_FIELDS: &str = "no legacy-generation field present";

/// The shared double-decode. `legacy` runs only when the current attempt is
/// rejected.
fn decode_with<T, E1, E2>(
    current: std::result::Result<T, E1>,
    legacy: impl FnOnce() -> std::result::Result<T::Legacy, E2>,
) -> Result<T>
where
    T: Generational,
    E1: Display,
    E2: Display,
{
    let current_err = match current {
        Ok(v) if v.is_current() => return Ok(v),
        Ok(_) => NO_CURRENT_FIELDS.to_string(),
        Err(e) => e.to_string(),
    };
    let legacy_err = match legacy() {
        Ok(v) if T::is_legacy(&v) => return T::from_legacy(v),
        Ok(_) => NO_LEGACY_FIELDS.to_string(),
        Err(e) => e.to_string(),
    };
    Err(CoreError::IncompatibleWireFormat {
        kind: T::KIND,
        current: current_err,
        legacy: legacy_err,
    })
}

pub fn decode_json<T>(data: &[u8]) -> Result<T>
where
    T: Generational + DeserializeOwned,
    T::Legacy: DeserializeOwned,
{
    decode_with(serde_json::from_slice::<T>(data), || {
        serde_json::from_slice::<T::Legacy>(data)
    })
}

pub fn decode_json_value<T>(value: JsonValue) -> Result<T>
where
    T: Generational + DeserializeOwned,
    T::Legacy: DeserializeOwned,
{
    decode_with(serde_json::from_value::<T>(value.clone()), || {
        serde_json::from_value::<T::Legacy>(value)
    })
}

pub fn decode_cbor<T>(data: &[u8]) -> Result<T>
where
    T: Generational + DeserializeOwned,
    T::Legacy: DeserializeOwned,
{
    decode_with(ciborium::from_reader::<T, _>(data), || {
        ciborium::from_reader::<T::Legacy, _>(data)
    })
}

pub fn decode_attribute<T>(item: &AttributeValue) -> Result<T>
where
    T: Generational + DeserializeOwned,
    T::Legacy: DeserializeOwned,
{
    decode_with(from_attribute::<T>(item), || from_attribute::<T::Legacy>(item))
}

pub fn encode_json<T>(value: &T) -> Result<Vec<u8>>
where
    T: Generational,
    T::Legacy: Serialize,
{
    Ok(serde_json::to_vec(&value.to_legacy()?)?)
}

pub fn encode_cbor<T>(value: &T) -> Result<Vec<u8>>
where
    T: Generational,
    T::Legacy: Serialize,
{
    let mut out = Vec::new();
    ciborium::into_writer(&value.to_legacy()?, &mut out)
        .map_err(|e| CoreError::CborEncoding(e.to_string()))?;
    Ok(out)
}

pub fn encode_attribute<T>(value: &T) -> Result<AttributeValue>
where
    T: Generational,
    T::Legacy: Serialize,
{
    to_attribute(&value.to_legacy()?)
}

// ─────────────────────────────────────────────────────────────────────────
// Serde wrapper
// ─────────────────────────────────────────────────────────────────────────

/// Wraps a current-generation value so that it deserializes from either
/// generation and serializes as the legacy one.
///
/// Works with any self-describing serde format.
#[derive(Clone, Debug, PartialEq)]
pub struct Compatible<T>(pub T);

impl<T> Compatible<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Compatible<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Compatible<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> From<T> for Compatible<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<'de, T> Deserialize<'de> for Compatible<T>
where
    T: Generational + DeserializeOwned,
    T::Legacy: DeserializeOwned,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = JsonValue::deserialize(deserializer)?;
        decode_json_value(raw).map(Compatible).map_err(de::Error::custom)
    }
}

impl<T> Serialize for Compatible<T>
where
    T: Generational,
    T::Legacy: Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0
            .to_legacy()
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

pub type CompatibleResultFindIntersection = Compatible<ResultFindIntersection>;
pub type CompatibleResultNextBlock = Compatible<ResultNextBlock>;
pub type CompatibleResponse = Compatible<Response>;
pub type CompatibleValue = Compatible<Value>;
pub type CompatibleTx = Compatible<Tx>;

// ─────────────────────────────────────────────────────────────────────────
// Generations
// ─────────────────────────────────────────────────────────────────────────

impl Generational for ResultFindIntersection {
    const KIND: &'static str = "findIntersection result";
    type Legacy = ResultFindIntersectionV5;

    fn is_current(&self) -> bool {
        self.intersection.is_some() || self.error.is_some()
    }

    fn is_legacy(legacy: &Self::Legacy) -> bool {
        legacy.intersection_found.is_some() || legacy.intersection_not_found.is_some()
    }

    fn from_legacy(legacy: Self::Legacy) -> Result<Self> {
        Ok(legacy.to_current())
    }

    fn to_legacy(&self) -> Result<Self::Legacy> {
        Ok(ResultFindIntersectionV5::from_current(self))
    }
}

impl Generational for ResultNextBlock {
    const KIND: &'static str = "nextBlock result";
    type Legacy = ResultNextBlockV5;

    /// `direction` is required, so any successful decode qualifies.
    fn is_current(&self) -> bool {
        true
    }

    fn is_legacy(legacy: &Self::Legacy) -> bool {
        legacy.roll_forward.is_some() || legacy.roll_backward.is_some()
    }

    fn from_legacy(legacy: Self::Legacy) -> Result<Self> {
        legacy.to_current()
    }

    fn to_legacy(&self) -> Result<Self::Legacy> {
        ResultNextBlockV5::from_current(self)
    }
}

impl Generational for Response {
    const KIND: &'static str = "response";
    type Legacy = ResponseV5;

    fn is_current(&self) -> bool {
        !self.jsonrpc.is_empty() && (self.result.is_some() || self.error.is_some())
    }

    fn is_legacy(legacy: &Self::Legacy) -> bool {
        !legacy.methodname.is_empty() && (legacy.result.is_some() || legacy.fault.is_some())
    }

    fn from_legacy(legacy: Self::Legacy) -> Result<Self> {
        legacy.to_current()
    }

    fn to_legacy(&self) -> Result<Self::Legacy> {
        ResponseV5::from_current(self)
    }
}

impl Generational for Value {
    const KIND: &'static str = "value";
    type Legacy = ValueV5;

    fn is_current(&self) -> bool {
        !self.has_policy("coins") && !self.has_policy("assets")
    }

    fn is_legacy(_: &Self::Legacy) -> bool {
        true
    }

    fn from_legacy(legacy: Self::Legacy) -> Result<Self> {
        Ok(legacy.to_current())
    }

    fn to_legacy(&self) -> Result<Self::Legacy> {
        Ok(ValueV5::from_current(self))
    }
}

impl Generational for Tx {
    const KIND: &'static str = "transaction";
    type Legacy = TxV5;

    fn is_current(&self) -> bool {
        !self.spends.is_empty()
    }

    fn is_legacy(legacy: &Self::Legacy) -> bool {
        !legacy.raw.is_empty() || !legacy.input_source.is_empty()
    }

    fn from_legacy(legacy: Self::Legacy) -> Result<Self> {
        Ok(legacy.to_current())
    }

    fn to_legacy(&self) -> Result<Self::Legacy> {
        Ok(TxV5::from_current(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::Num;
    use crate::point::{Point, PointStruct};
    use crate::protocol::{Direction, Method};

    #[test]
    fn test_find_intersection_both_generations() {
        let current = br#"{"intersection": {"slot": 1, "id": "aa"}, "tip": {"slot": 2, "id": "bb"}}"#;
        let legacy = br#"{"IntersectionFound": {"point": {"slot": 1, "hash": "aa"}, "tip": {"slot": 2, "hash": "bb"}}}"#;

        let a: ResultFindIntersection = decode_json(current).unwrap();
        let b: ResultFindIntersection = decode_json(legacy).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.intersection, Some(Point::from(PointStruct::new(1, "aa"))));
    }

    #[test]
    fn test_find_intersection_encodes_legacy() {
        let result = ResultFindIntersection {
            intersection: Some(Point::origin()),
            tip: Some(PointStruct::new(2, "bb").with_height(1)),
            ..Default::default()
        };
        let json = String::from_utf8(encode_json(&result).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"IntersectionFound":{"point":"origin","tip":{"blockNo":1,"hash":"bb","slot":2}}}"#
        );
        let decoded: ResultFindIntersection = decode_json(json.as_bytes()).unwrap();
        assert_eq!(decoded, result);
    }

    #[test]
    fn test_next_block_legacy_rollback() {
        let legacy = br#"{"RollBackward": {"point": "origin", "tip": {"slot": 5, "hash": "cc", "blockNo": 2}}}"#;
        let result: ResultNextBlock = decode_json(legacy).unwrap();
        assert_eq!(result.direction, Direction::Backward);
        assert_eq!(result.point, Some(Point::origin()));
        assert_eq!(result.tip.unwrap().height, Some(2));
    }

    #[test]
    fn test_neither_generation_reports_both_errors() {
        let err = decode_json::<ResultNextBlock>(br#"{"foo": 1}"#).unwrap_err();
        match err {
            CoreError::IncompatibleWireFormat { kind, current, legacy } => {
                assert_eq!(kind, "nextBlock result");
                assert!(current.contains("direction"));
                assert_eq!(legacy, NO_LEGACY_FIELDS);
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = decode_json::<ResultFindIntersection>(b"{}").unwrap_err();
        assert!(err.is_protocol_mismatch());
    }

    #[test]
    fn test_value_generations() {
        let legacy: Value = decode_json(br#"{"coins": 25, "assets": {"abcd.01": 1}}"#).unwrap();
        assert_eq!(legacy.ada_lovelace(), Num::from(25u64));

        let current: Value = decode_json(br#"{"ada": {"lovelace": 25}, "abcd": {"01": 1}}"#).unwrap();
        assert_eq!(current, legacy);

        let encoded = String::from_utf8(encode_json(&current).unwrap()).unwrap();
        assert_eq!(encoded, r#"{"coins":25,"assets":{"abcd.01":1}}"#);
    }

    #[test]
    fn test_tx_generations() {
        let current: Tx = decode_json(br#"{"id": "aa", "spends": "inputs"}"#).unwrap();
        let legacy: Tx = decode_json(br#"{"id": "aa", "inputSource": "inputs", "body": {}}"#).unwrap();
        assert_eq!(current, legacy);

        let unknown = decode_json::<Tx>(br#"{"id": "aa"}"#);
        assert!(matches!(unknown, Err(CoreError::IncompatibleWireFormat { .. })));
    }

    #[test]
    fn test_response_envelopes() {
        let current = br#"{"jsonrpc": "2.0", "method": "findIntersection", "result": {"intersection": "origin", "tip": {"slot": 1, "id": "aa"}}, "id": "x"}"#;
        let legacy = br#"{"type": "jsonwsp/response", "version": "1.0", "servicename": "ogmios", "methodname": "FindIntersect", "result": {"IntersectionFound": {"point": "origin", "tip": {"slot": 1, "hash": "aa"}}}, "reflection": "x"}"#;

        let a: Response = decode_json(current).unwrap();
        let b: Response = decode_json(legacy).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.method, Method::FindIntersection);
    }

    #[test]
    fn test_cbor_and_attribute_share_conversion() {
        let legacy = ResultFindIntersectionV5::from_current(&ResultFindIntersection {
            intersection: Some(PointStruct::new(7, "dd").point()),
            tip: Some(PointStruct::new(9, "ee")),
            ..Default::default()
        });

        let mut cbor = Vec::new();
        ciborium::into_writer(&legacy, &mut cbor).unwrap();
        let from_cbor: ResultFindIntersection = decode_cbor(&cbor).unwrap();

        let item = to_attribute(&legacy).unwrap();
        let from_attribute: ResultFindIntersection = decode_attribute(&item).unwrap();

        assert_eq!(from_cbor, from_attribute);
        assert_eq!(from_cbor.tip, Some(PointStruct::new(9, "ee")));

        let encoded = encode_cbor(&from_cbor).unwrap();
        assert_eq!(decode_cbor::<ResultFindIntersection>(&encoded).unwrap(), from_cbor);
        let encoded = encode_attribute(&from_attribute).unwrap();
        assert!(encoded.get("IntersectionFound").is_some());
    }

    #[test]
    fn test_compatible_wrapper() {
        let wrapped: CompatibleValue = serde_json::from_str(r#"{"coins": 3}"#).unwrap();
        assert_eq!(wrapped.ada_lovelace(), Num::from(3u64));
        assert_eq!(serde_json::to_string(&wrapped).unwrap(), r#"{"coins":3}"#);
    }
}
