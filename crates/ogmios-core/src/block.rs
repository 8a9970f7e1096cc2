//! Current-generation block and transaction model.
//!
//! Blocks carry an era tag plus the era-specific payload. Fields the chain
//! defines but this client never interprets (scripts, redeemers, metadata,
//! certificates) are kept as raw JSON so nothing is lost in transit.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::CoreError;
use crate::point::PointStruct;
use crate::value::Value;

/// Block header kind for Shelley-based eras.
pub const KIND_PRAOS: &str = "praos";
/// Block header kind for Byron main blocks.
pub const KIND_BFT: &str = "bft";

/// A block as delivered by `nextBlock`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default)]
    pub era: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ancestor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(default)]
    pub slot: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<BlockSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<Issuer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<ProtocolInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transactions: Vec<Tx>,
}

impl Block {
    /// The block's own position on the chain.
    pub fn point(&self) -> PointStruct {
        PointStruct {
            height: self.height,
            id: self.id.clone(),
            slot: self.slot,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSize {
    pub bytes: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issuer {
    #[serde(default)]
    pub verification_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf_verification_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operational_certificate: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_value: Option<JsonValue>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolInfo {
    pub version: ProtocolVersion,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<u32>,
}

/// A transaction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tx {
    pub id: String,
    /// Which inputs the transaction consumes: `inputs`, or `collaterals`
    /// when script validation failed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub spends: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<TxIn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<TxIn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collaterals: Vec<TxIn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collateral_return: Option<TxOut>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_collateral: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<TxOut>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_interval: Option<ValidityInterval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mint: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub withdrawals: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_integrity_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_extra_signatories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<JsonValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatories: Vec<Signatory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts: Option<JsonValue>,
    /// Datum hash to hex-encoded datum.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub datums: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemers: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposals: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub votes: Option<JsonValue>,
    /// Hex-encoded serialized transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cbor: Option<String>,
}

impl Tx {
    /// The fee in lovelace, zero when absent.
    pub fn fee_lovelace(&self) -> crate::num::Num {
        self.fee.as_ref().map(Value::ada_lovelace).unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxRef {
    pub id: String,
}

/// A reference to a transaction output.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxIn {
    pub transaction: TxRef,
    pub index: u32,
}

impl TxIn {
    pub fn new(tx_id: impl Into<String>, index: u32) -> Self {
        Self {
            transaction: TxRef { id: tx_id.into() },
            index,
        }
    }

    pub fn tx_id(&self) -> &str {
        &self.transaction.id
    }
}

/// `txid#index`.
impl fmt::Display for TxIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.transaction.id, self.index)
    }
}

impl FromStr for TxIn {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hash, index) = s
            .split_once('#')
            .ok_or_else(|| CoreError::MalformedMessage(format!("tx input {s:?}: missing '#'")))?;
        let index = index
            .parse::<u32>()
            .map_err(|e| CoreError::MalformedMessage(format!("tx input {s:?}: {e}")))?;
        Ok(TxIn::new(hash, index))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOut {
    pub address: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datum_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<JsonValue>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityInterval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_before: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_after: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signatory {
    pub key: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_attributes: Option<String>,
}

/// An unspent output as returned by ledger queries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub transaction: TxRef,
    pub index: u32,
    pub address: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datum_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_point() {
        let block = Block {
            kind: KIND_PRAOS.into(),
            era: "babbage".into(),
            id: "27905049".into(),
            height: Some(2),
            slot: 2,
            ..Default::default()
        };
        let point = block.point();
        assert_eq!(point.slot, 2);
        assert_eq!(point.height, Some(2));
        assert_eq!(point.id, "27905049");
    }

    #[test]
    fn test_tx_in_parse() {
        let input: TxIn = "a#3".parse().unwrap();
        assert_eq!(input.tx_id(), "a");
        assert_eq!(input.index, 3);
        assert_eq!(input.to_string(), "a#3");
        assert!("a".parse::<TxIn>().is_err());
        assert!("a#x".parse::<TxIn>().is_err());
    }

    #[test]
    fn test_tx_wire_names() {
        let json = r#"{
            "id": "9cd2",
            "spends": "collaterals",
            "inputs": [{"transaction": {"id": "602b"}, "index": 3}],
            "outputs": [{"address": "addr_test1", "value": {"ada": {"lovelace": 10}}, "datum": "43e33bf3"}],
            "fee": {"ada": {"lovelace": 752644}},
            "validityInterval": {"invalidBefore": 7, "invalidAfter": 6},
            "network": "mainnet",
            "signatories": [{"key": "8d09", "signature": "a29c"}]
        }"#;
        let tx: Tx = serde_json::from_str(json).unwrap();
        assert_eq!(tx.spends, "collaterals");
        assert_eq!(tx.inputs[0].to_string(), "602b#3");
        assert_eq!(tx.fee_lovelace().to_u64(), Some(752_644));
        assert_eq!(
            tx.validity_interval,
            Some(ValidityInterval {
                invalid_before: Some(7),
                invalid_after: Some(6)
            })
        );
        assert_eq!(tx.outputs[0].datum.as_deref(), Some("43e33bf3"));
    }
}
