//! Structured attribute records for external key-value stores.
//!
//! An [`AttributeValue`] is the typed-scalar tree used by document stores
//! such as DynamoDB: every node says what it is (`S`, `N`, `B`, `BOOL`,
//! `NULL`, `L`, `M`). Numbers travel as decimal strings so arbitrary-precision
//! amounts survive the trip.
//!
//! Any serde type converts through [`to_attribute`] / [`from_attribute`],
//! which go via `serde_json::Value`.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};

/// A typed attribute node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "B", with = "base64_bytes")]
    B(Vec<u8>),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    #[serde(rename = "M")]
    M(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// True if the node carries content. Empty strings, maps and lists,
    /// and nulls are not populated.
    pub fn is_populated(&self) -> bool {
        match self {
            AttributeValue::S(s) | AttributeValue::N(s) => !s.is_empty(),
            AttributeValue::B(b) => !b.is_empty(),
            AttributeValue::Bool(_) => true,
            AttributeValue::Null(_) => false,
            AttributeValue::L(l) => !l.is_empty(),
            AttributeValue::M(m) => !m.is_empty(),
        }
    }

    /// Look up a key in an `M` node.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        match self {
            AttributeValue::M(m) => m.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, AttributeValue>> {
        match self {
            AttributeValue::M(m) => Some(m),
            _ => None,
        }
    }

    /// Name of the node type, as used in the record's JSON shape.
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::S(_) => "S",
            AttributeValue::N(_) => "N",
            AttributeValue::B(_) => "B",
            AttributeValue::Bool(_) => "BOOL",
            AttributeValue::Null(_) => "NULL",
            AttributeValue::L(_) => "L",
            AttributeValue::M(_) => "M",
        }
    }
}

/// Convert any serializable value into an attribute tree.
pub fn to_attribute<T: Serialize + ?Sized>(value: &T) -> Result<AttributeValue> {
    let json = serde_json::to_value(value)?;
    Ok(json_to_attribute(json))
}

/// Rebuild a value from an attribute tree.
pub fn from_attribute<T: DeserializeOwned>(item: &AttributeValue) -> Result<T> {
    let json = attribute_to_json(item)?;
    Ok(serde_json::from_value(json)?)
}

/// JSON tree to attribute tree. Total.
pub fn json_to_attribute(value: JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null(true),
        JsonValue::Bool(b) => AttributeValue::Bool(b),
        JsonValue::Number(n) => AttributeValue::N(n.to_string()),
        JsonValue::String(s) => AttributeValue::S(s),
        JsonValue::Array(items) => {
            AttributeValue::L(items.into_iter().map(json_to_attribute).collect())
        }
        JsonValue::Object(map) => AttributeValue::M(
            map.into_iter()
                .map(|(k, v)| (k, json_to_attribute(v)))
                .collect(),
        ),
    }
}

/// Attribute tree to JSON tree.
///
/// Binary nodes become hex strings, the representation the chain model uses
/// for every byte field.
pub fn attribute_to_json(item: &AttributeValue) -> Result<JsonValue> {
    Ok(match item {
        AttributeValue::S(s) => JsonValue::String(s.clone()),
        AttributeValue::N(n) => {
            let number = n
                .parse::<serde_json::Number>()
                .map_err(|e| CoreError::Attribute(format!("invalid number {n:?}: {e}")))?;
            JsonValue::Number(number)
        }
        AttributeValue::B(b) => JsonValue::String(hex::encode(b)),
        AttributeValue::Bool(b) => JsonValue::Bool(*b),
        AttributeValue::Null(_) => JsonValue::Null,
        AttributeValue::L(items) => JsonValue::Array(
            items
                .iter()
                .map(attribute_to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        AttributeValue::M(map) => {
            let mut object = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                object.insert(k.clone(), attribute_to_json(v)?);
            }
            JsonValue::Object(object)
        }
    })
}

mod base64_bytes {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        BASE64.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::Num;

    #[test]
    fn test_record_shape() {
        let item = to_attribute(&serde_json::json!({"slot": 456, "id": "ab"})).unwrap();
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"M": {"id": {"S": "ab"}, "slot": {"N": "456"}}})
        );
    }

    #[test]
    fn test_large_numbers_survive() {
        let amount: Num = "99999999999999999999999999".parse().unwrap();
        let item = to_attribute(&amount).unwrap();
        assert_eq!(item, AttributeValue::N("99999999999999999999999999".into()));
        let back: Num = from_attribute(&item).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn test_binary_nodes_decode_as_hex() {
        let item = AttributeValue::M(BTreeMap::from([(
            "datum".to_string(),
            AttributeValue::B(vec![0xd8, 0x79]),
        )]));
        let json = attribute_to_json(&item).unwrap();
        assert_eq!(json["datum"], "d879");

        let wire = serde_json::to_string(&item).unwrap();
        assert_eq!(wire, r#"{"M":{"datum":{"B":"2Hk="}}}"#);
    }

    #[test]
    fn test_populated() {
        assert!(!AttributeValue::S(String::new()).is_populated());
        assert!(!AttributeValue::M(BTreeMap::new()).is_populated());
        assert!(!AttributeValue::Null(true).is_populated());
        assert!(AttributeValue::S("origin".into()).is_populated());
    }

    #[test]
    fn test_bad_number_rejected() {
        let item = AttributeValue::N("12abc".into());
        assert!(from_attribute::<Num>(&item).is_err());
    }
}
