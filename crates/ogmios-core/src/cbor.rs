//! Binary form of checkpoint records.
//!
//! A point is stored as a one-entry map keyed by its variant tag:
//! `{1: "origin"}` for a marker, `{2: {"slot": .., "id": .., "height": ..}}`
//! for a concrete point. Stores key rows on these bytes, so the same point
//! must always produce the same bytes. The encoder therefore writes every
//! head in its shortest form, uses definite lengths only, and orders map
//! entries by their encoded key. Floats never occur in a point and are
//! rejected.
//!
//! Decoding is plain ciborium; any well-formed CBOR is accepted.

use ciborium::value::Value;

use crate::error::{CoreError, Result};

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;

const FALSE: u8 = 0xf4;
const TRUE: u8 = 0xf5;
const NULL: u8 = 0xf6;

/// Encode a record value to its deterministic bytes.
pub fn encode_canonical(value: &Value) -> Result<Vec<u8>> {
    let mut out = Encoder::default();
    out.value(value)?;
    Ok(out.bytes)
}

/// Decode bytes into a CBOR value tree.
pub fn decode_value(bytes: &[u8]) -> Result<Value> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::CborDecoding(e.to_string()))
}

/// Look up a map entry by small integer key.
pub fn get_int_key(entries: &[(Value, Value)], key: u64) -> Option<&Value> {
    entries
        .iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == i128::from(key)))
        .map(|(_, v)| v)
}

/// Look up a map entry by text key.
pub fn get_text_key<'a>(entries: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    entries
        .iter()
        .find(|(k, _)| matches!(k, Value::Text(t) if t == key))
        .map(|(_, v)| v)
}

/// Read an unsigned integer out of a CBOR value.
pub fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(i) => u64::try_from(*i).ok(),
        _ => None,
    }
}

#[derive(Default)]
struct Encoder {
    bytes: Vec<u8>,
}

impl Encoder {
    fn value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Integer(i) => match u64::try_from(*i) {
                Ok(n) => self.head(MAJOR_UNSIGNED, n),
                Err(_) => {
                    // Major type 1 carries -1 - n.
                    let n = u64::try_from(-1 - i128::from(*i)).map_err(|_| {
                        CoreError::CborEncoding("integer out of range".into())
                    })?;
                    self.head(MAJOR_NEGATIVE, n);
                }
            },
            Value::Bytes(b) => {
                self.head(MAJOR_BYTES, b.len() as u64);
                self.bytes.extend_from_slice(b);
            }
            Value::Text(t) => {
                self.head(MAJOR_TEXT, t.len() as u64);
                self.bytes.extend_from_slice(t.as_bytes());
            }
            Value::Array(items) => {
                self.head(MAJOR_ARRAY, items.len() as u64);
                for item in items {
                    self.value(item)?;
                }
            }
            Value::Map(entries) => self.map(entries)?,
            Value::Bool(b) => self.bytes.push(if *b { TRUE } else { FALSE }),
            Value::Null => self.bytes.push(NULL),
            Value::Float(_) => {
                return Err(CoreError::CborEncoding("floats have no place in a record".into()))
            }
            other => {
                return Err(CoreError::CborEncoding(format!(
                    "unsupported value in a record: {other:?}"
                )))
            }
        }
        Ok(())
    }

    /// Write a major type and argument in the shortest form.
    fn head(&mut self, major: u8, n: u64) {
        let major = major << 5;
        match n {
            0..=23 => self.bytes.push(major | n as u8),
            24..=0xff => self.bytes.extend_from_slice(&[major | 24, n as u8]),
            0x100..=0xffff => {
                self.bytes.push(major | 25);
                self.bytes.extend_from_slice(&(n as u16).to_be_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.bytes.push(major | 26);
                self.bytes.extend_from_slice(&(n as u32).to_be_bytes());
            }
            _ => {
                self.bytes.push(major | 27);
                self.bytes.extend_from_slice(&n.to_be_bytes());
            }
        }
    }

    fn map(&mut self, entries: &[(Value, Value)]) -> Result<()> {
        let mut encoded = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let mut k = Encoder::default();
            k.value(key)?;
            encoded.push((k.bytes, value));
        }
        encoded.sort_by(|a, b| a.0.cmp(&b.0));

        self.head(MAJOR_MAP, encoded.len() as u64);
        for (key, value) in encoded {
            self.bytes.extend_from_slice(&key);
            self.value(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_encoding_smallest_form() {
        let cases: [(u64, &[u8]); 5] = [
            (0, &[0x00]),
            (23, &[0x17]),
            (24, &[0x18, 0x18]),
            (256, &[0x19, 0x01, 0x00]),
            (65536, &[0x1a, 0x00, 0x01, 0x00, 0x00]),
        ];
        for (n, expected) in cases {
            let bytes = encode_canonical(&Value::Integer(n.into())).unwrap();
            assert_eq!(bytes, expected, "encoding {n}");
        }
    }

    #[test]
    fn test_map_keys_sorted() {
        let forward = Value::Map(vec![
            (Value::Integer(2.into()), Value::Text("b".into())),
            (Value::Integer(1.into()), Value::Text("a".into())),
        ]);
        let reverse = Value::Map(vec![
            (Value::Integer(1.into()), Value::Text("a".into())),
            (Value::Integer(2.into()), Value::Text("b".into())),
        ]);
        assert_eq!(
            encode_canonical(&forward).unwrap(),
            encode_canonical(&reverse).unwrap()
        );
    }

    #[test]
    fn test_point_record_bytes() {
        let marker = Value::Map(vec![(Value::Integer(1.into()), Value::Text("origin".into()))]);
        assert_eq!(
            encode_canonical(&marker).unwrap(),
            [&[0xa1u8, 0x01, 0x66][..], &b"origin"[..]].concat()
        );
        assert_eq!(encode_canonical(&Value::Integer((-1).into())).unwrap(), vec![0x20u8]);
    }

    #[test]
    fn test_floats_rejected() {
        assert!(encode_canonical(&Value::Float(1.5)).is_err());
    }

    #[test]
    fn test_decode_matches_encode() {
        let value = Value::Map(vec![(
            Value::Text("slot".into()),
            Value::Integer(456.into()),
        )]);
        let bytes = encode_canonical(&value).unwrap();
        let decoded = decode_value(&bytes).unwrap();
        match decoded {
            Value::Map(entries) => {
                assert_eq!(get_text_key(&entries, "slot").and_then(as_u64), Some(456));
            }
            other => panic!("expected map, got {other:?}"),
        }
    }
}
