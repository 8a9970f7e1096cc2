//! Legacy-generation wire model.
//!
//! The legacy protocol wraps results in constructor-named objects
//! (`{"RollForward": {...}}`), keys blocks by era, names points
//! `{hash, slot, blockNo}`, and carries flat coin amounts alongside an
//! `assets` map keyed by `policy.name`. Every type here converts to and from
//! its current-generation counterpart with `to_current` / `from_current`.
//! Those conversions are the only place the two schemas meet.

use std::collections::BTreeMap;
use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::block::{
    Block, BlockSize, Issuer, ProtocolInfo, ProtocolVersion, Signatory, Tx, TxIn, TxOut,
    ValidityInterval, KIND_BFT, KIND_PRAOS,
};
use crate::error::{CoreError, Result};
use crate::num::Num;
use crate::point::{Point, PointStruct};
use crate::protocol::{
    Direction, Method, Response, ResponseError, ResponseResult, ResultFindIntersection,
    ResultNextBlock, INTERSECTION_NOT_FOUND_CODE, JSONRPC_VERSION,
};
use crate::value::{AssetId, Coin, Value};

/// JSON-WSP envelope type of a successful legacy response.
pub const RESPONSE_TYPE: &str = "jsonwsp/response";
/// JSON-WSP envelope type of a legacy fault.
pub const FAULT_TYPE: &str = "jsonwsp/fault";
const SERVICE_NAME: &str = "ogmios";
const WSP_VERSION: &str = "1.0";

const ERA_BYRON: &str = "byron";
const ERA_SHELLEY: &str = "shelley";
const ERA_ALLEGRA: &str = "allegra";
const ERA_MARY: &str = "mary";
const ERA_ALONZO: &str = "alonzo";
const ERA_BABBAGE: &str = "babbage";

// ─────────────────────────────────────────────────────────────────────────
// Points
// ─────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointStructV5 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_no: Option<u64>,
    pub hash: String,
    pub slot: u64,
}

/// Legacy tips share the point struct shape.
pub type TipV5 = PointStructV5;

impl PointStructV5 {
    pub fn to_current(&self) -> PointStruct {
        PointStruct {
            height: self.block_no,
            id: self.hash.clone(),
            slot: self.slot,
        }
    }

    pub fn from_current(p: &PointStruct) -> Self {
        Self {
            block_no: p.height,
            hash: p.id.clone(),
            slot: p.slot,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointV5 {
    Marker(String),
    Struct(PointStructV5),
}

impl PointV5 {
    pub fn to_current(&self) -> Point {
        match self {
            PointV5::Marker(s) => Point::Marker(s.clone()),
            PointV5::Struct(p) => Point::Struct(p.to_current()),
        }
    }

    pub fn from_current(p: &Point) -> Self {
        match p {
            Point::Marker(s) => PointV5::Marker(s.clone()),
            Point::Struct(p) => PointV5::Struct(PointStructV5::from_current(p)),
        }
    }
}

fn tip_to_json(tip: &PointStruct) -> JsonValue {
    let mut map = serde_json::Map::new();
    if let Some(h) = tip.height {
        map.insert("height".into(), JsonValue::from(h));
    }
    map.insert("id".into(), JsonValue::from(tip.id.clone()));
    map.insert("slot".into(), JsonValue::from(tip.slot));
    JsonValue::Object(map)
}

/// The current-generation error for a legacy `IntersectionNotFound`.
fn intersection_not_found(tip: Option<&PointStruct>) -> ResponseError {
    ResponseError {
        code: INTERSECTION_NOT_FOUND_CODE,
        message: "Intersection not found.".into(),
        data: tip.map(|t| {
            let mut data = serde_json::Map::new();
            data.insert("tip".into(), tip_to_json(t));
            JsonValue::Object(data)
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────
// FindIntersect
// ─────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntersectionFoundV5 {
    pub point: PointV5,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<PointStructV5>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntersectionNotFoundV5 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<PointStructV5>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFindIntersectionV5 {
    #[serde(rename = "IntersectionFound", default, skip_serializing_if = "Option::is_none")]
    pub intersection_found: Option<IntersectionFoundV5>,
    #[serde(rename = "IntersectionNotFound", default, skip_serializing_if = "Option::is_none")]
    pub intersection_not_found: Option<IntersectionNotFoundV5>,
}

impl ResultFindIntersectionV5 {
    pub fn to_current(&self) -> ResultFindIntersection {
        if let Some(found) = &self.intersection_found {
            return ResultFindIntersection {
                intersection: Some(found.point.to_current()),
                tip: found.tip.as_ref().map(PointStructV5::to_current),
                error: None,
                id: None,
            };
        }
        match &self.intersection_not_found {
            Some(not_found) => {
                let tip = not_found.tip.as_ref().map(PointStructV5::to_current);
                ResultFindIntersection {
                    error: Some(intersection_not_found(tip.as_ref())),
                    ..Default::default()
                }
            }
            None => ResultFindIntersection::default(),
        }
    }

    /// A result without an intersection becomes `IntersectionNotFound`. Its
    /// tip comes from the result or, failing that, from the error payload;
    /// it stays absent when neither has one.
    pub fn from_current(r: &ResultFindIntersection) -> Self {
        let tip = r.tip.as_ref().map(PointStructV5::from_current);
        match &r.intersection {
            Some(point) => Self {
                intersection_found: Some(IntersectionFoundV5 {
                    point: PointV5::from_current(point),
                    tip,
                }),
                intersection_not_found: None,
            },
            None => {
                let tip = tip.or_else(|| {
                    r.error
                        .as_ref()
                        .and_then(ResponseError::tip)
                        .map(|t| PointStructV5::from_current(&t))
                });
                Self {
                    intersection_found: None,
                    intersection_not_found: Some(IntersectionNotFoundV5 { tip }),
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// RequestNext
// ─────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RollForwardV5 {
    pub block: RollForwardBlockV5,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<PointStructV5>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollBackwardV5 {
    pub point: PointV5,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<PointStructV5>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultNextBlockV5 {
    #[serde(rename = "RollForward", default, skip_serializing_if = "Option::is_none")]
    pub roll_forward: Option<RollForwardV5>,
    #[serde(rename = "RollBackward", default, skip_serializing_if = "Option::is_none")]
    pub roll_backward: Option<RollBackwardV5>,
}

impl ResultNextBlockV5 {
    pub fn to_current(&self) -> Result<ResultNextBlock> {
        if let Some(forward) = &self.roll_forward {
            return Ok(ResultNextBlock {
                direction: Direction::Forward,
                tip: forward.tip.as_ref().map(PointStructV5::to_current),
                block: forward.block.to_current(),
                point: None,
            });
        }
        if let Some(backward) = &self.roll_backward {
            return Ok(ResultNextBlock {
                direction: Direction::Backward,
                tip: backward.tip.as_ref().map(PointStructV5::to_current),
                block: None,
                point: Some(backward.point.to_current()),
            });
        }
        Err(CoreError::MalformedMessage(
            "legacy next block result has neither RollForward nor RollBackward".into(),
        ))
    }

    /// Fails when the result lacks the block or point its direction needs.
    /// Nothing is invented in their place.
    pub fn from_current(r: &ResultNextBlock) -> Result<Self> {
        let tip = r.tip.as_ref().map(PointStructV5::from_current);
        match r.direction {
            Direction::Forward => {
                let block = r.block.as_ref().ok_or_else(|| {
                    CoreError::MalformedMessage("forward result without block".into())
                })?;
                Ok(Self {
                    roll_forward: Some(RollForwardV5 {
                        block: RollForwardBlockV5::from_current(block),
                        tip,
                    }),
                    roll_backward: None,
                })
            }
            Direction::Backward => {
                let point = r.point.as_ref().ok_or_else(|| {
                    CoreError::MalformedMessage("backward result without point".into())
                })?;
                Ok(Self {
                    roll_forward: None,
                    roll_backward: Some(RollBackwardV5 {
                        point: PointV5::from_current(point),
                        tip,
                    }),
                })
            }
        }
    }
}

/// A legacy block keyed by era. Exactly one era is populated.
///
/// Eras the legacy schema predates land in `other` under their own name and
/// take the Shelley-based block shape, so the era survives a round trip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RollForwardBlockV5 {
    pub allegra: Option<BlockV5>,
    pub alonzo: Option<BlockV5>,
    pub babbage: Option<BlockV5>,
    pub byron: Option<ByronBlockV5>,
    pub mary: Option<BlockV5>,
    pub shelley: Option<BlockV5>,
    pub other: BTreeMap<String, BlockV5>,
}

impl Serialize for RollForwardBlockV5 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        let named = [
            (ERA_ALLEGRA, &self.allegra),
            (ERA_ALONZO, &self.alonzo),
            (ERA_BABBAGE, &self.babbage),
            (ERA_MARY, &self.mary),
            (ERA_SHELLEY, &self.shelley),
        ];
        for (era, block) in named {
            if let Some(block) = block {
                map.serialize_entry(era, block)?;
            }
        }
        if let Some(byron) = &self.byron {
            map.serialize_entry(ERA_BYRON, byron)?;
        }
        for (era, block) in &self.other {
            map.serialize_entry(era, block)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RollForwardBlockV5 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EraVisitor;

        impl<'de> Visitor<'de> for EraVisitor {
            type Value = RollForwardBlockV5;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a block keyed by era")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut out = RollForwardBlockV5::default();
                while let Some(era) = access.next_key::<String>()? {
                    if era == ERA_BYRON {
                        out.byron = Some(access.next_value()?);
                        continue;
                    }
                    let block: BlockV5 = access.next_value()?;
                    match era.as_str() {
                        ERA_ALLEGRA => out.allegra = Some(block),
                        ERA_ALONZO => out.alonzo = Some(block),
                        ERA_BABBAGE => out.babbage = Some(block),
                        ERA_MARY => out.mary = Some(block),
                        ERA_SHELLEY => out.shelley = Some(block),
                        _ => {
                            out.other.insert(era, block);
                        }
                    }
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(EraVisitor)
    }
}

impl RollForwardBlockV5 {
    /// The Shelley-based block and its era, if that is what this holds.
    pub fn shelley_based(&self) -> Option<(&str, &BlockV5)> {
        [
            (ERA_ALLEGRA, &self.allegra),
            (ERA_ALONZO, &self.alonzo),
            (ERA_MARY, &self.mary),
            (ERA_SHELLEY, &self.shelley),
            (ERA_BABBAGE, &self.babbage),
        ]
        .into_iter()
        .find_map(|(era, block)| block.as_ref().map(|b| (era, b)))
        .or_else(|| self.other.iter().next().map(|(era, b)| (era.as_str(), b)))
    }

    /// The block's own position.
    pub fn point(&self) -> Option<PointStructV5> {
        if let Some(byron) = &self.byron {
            return Some(PointStructV5 {
                block_no: Some(byron.header.block_height),
                hash: byron.hash.clone(),
                slot: byron.header.slot,
            });
        }
        self.shelley_based().map(|(_, b)| PointStructV5 {
            block_no: Some(b.header.block_height),
            hash: b.header_hash.clone(),
            slot: b.header.slot,
        })
    }

    pub fn to_current(&self) -> Option<Block> {
        if let Some(byron) = &self.byron {
            return Some(byron.to_current());
        }
        self.shelley_based().map(|(era, b)| b.to_current(era))
    }

    pub fn from_current(block: &Block) -> Self {
        if block.era == ERA_BYRON {
            return Self {
                byron: Some(ByronBlockV5::from_current(block)),
                ..Default::default()
            };
        }
        let legacy = BlockV5::from_current(block);
        match block.era.as_str() {
            ERA_SHELLEY => Self { shelley: Some(legacy), ..Default::default() },
            ERA_ALLEGRA => Self { allegra: Some(legacy), ..Default::default() },
            ERA_MARY => Self { mary: Some(legacy), ..Default::default() },
            ERA_ALONZO => Self { alonzo: Some(legacy), ..Default::default() },
            ERA_BABBAGE => Self { babbage: Some(legacy), ..Default::default() },
            era => Self {
                other: BTreeMap::from([(era.to_string(), legacy)]),
                ..Default::default()
            },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockV5 {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<TxV5>,
    #[serde(default)]
    pub header: BlockHeaderV5,
    #[serde(default)]
    pub header_hash: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeaderV5 {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub block_hash: String,
    #[serde(default)]
    pub block_height: u64,
    #[serde(default)]
    pub block_size: u64,
    #[serde(rename = "issuerVK", default, skip_serializing_if = "String::is_empty")]
    pub issuer_vk: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issuer_vrf: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_cert: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prev_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<ProtocolVersion>,
    #[serde(default)]
    pub slot: u64,
}

impl BlockV5 {
    pub fn to_current(&self, era: &str) -> Block {
        let h = &self.header;
        let issuer = (!h.issuer_vk.is_empty() || !h.issuer_vrf.is_empty()).then(|| Issuer {
            verification_key: h.issuer_vk.clone(),
            vrf_verification_key: (!h.issuer_vrf.is_empty()).then(|| h.issuer_vrf.clone()),
            operational_certificate: h.op_cert.clone(),
            leader_value: None,
        });
        Block {
            kind: KIND_PRAOS.into(),
            era: era.into(),
            id: self.header_hash.clone(),
            ancestor: h.prev_hash.clone(),
            height: Some(h.block_height),
            slot: h.slot,
            size: (h.block_size > 0).then_some(BlockSize { bytes: h.block_size }),
            issuer,
            protocol: h
                .protocol_version
                .clone()
                .map(|version| ProtocolInfo { version }),
            transactions: self.body.iter().map(TxV5::to_current).collect(),
        }
    }

    pub fn from_current(block: &Block) -> Self {
        let issuer = block.issuer.clone().unwrap_or_default();
        Self {
            body: block.transactions.iter().map(TxV5::from_current).collect(),
            header: BlockHeaderV5 {
                block_hash: String::new(),
                block_height: block.height.unwrap_or_default(),
                block_size: block.size.as_ref().map_or(0, |s| s.bytes),
                issuer_vk: issuer.verification_key,
                issuer_vrf: issuer.vrf_verification_key.unwrap_or_default(),
                op_cert: issuer.operational_certificate,
                prev_hash: block.ancestor.clone(),
                protocol_version: block.protocol.as_ref().map(|p| p.version.clone()),
                slot: block.slot,
            },
            header_hash: block.id.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByronBlockV5 {
    pub hash: String,
    #[serde(default)]
    pub header: ByronHeaderV5,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByronHeaderV5 {
    #[serde(default)]
    pub block_height: u64,
    #[serde(default)]
    pub slot: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prev_hash: String,
}

impl ByronBlockV5 {
    pub fn to_current(&self) -> Block {
        Block {
            kind: KIND_BFT.into(),
            era: ERA_BYRON.into(),
            id: self.hash.clone(),
            ancestor: self.header.prev_hash.clone(),
            height: Some(self.header.block_height),
            slot: self.header.slot,
            ..Default::default()
        }
    }

    pub fn from_current(block: &Block) -> Self {
        Self {
            hash: block.id.clone(),
            header: ByronHeaderV5 {
                block_height: block.height.unwrap_or_default(),
                slot: block.slot,
                prev_hash: block.ancestor.clone(),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Values
// ─────────────────────────────────────────────────────────────────────────

/// Flat coin amount plus assets keyed by `policy.name`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueV5 {
    #[serde(default)]
    pub coins: Num,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub assets: BTreeMap<AssetId, Num>,
}

impl ValueV5 {
    /// The coin amount is lifted under `ada`/`lovelace` only when non-zero.
    pub fn to_current(&self) -> Value {
        let mut value = Value::new();
        if !self.coins.is_zero() {
            value.add_asset(Coin::ada(self.coins.clone()));
        }
        for (asset, amount) in &self.assets {
            value.add_asset(Coin::new(asset.clone(), amount.clone()));
        }
        value
    }

    pub fn from_current(value: &Value) -> Self {
        Self {
            coins: value.ada_lovelace(),
            assets: value
                .assets()
                .map(|coin| (coin.asset_id, coin.amount))
                .collect(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Transactions
// ─────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxV5 {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub input_source: String,
    #[serde(default)]
    pub body: TxBodyV5,
    #[serde(default)]
    pub witness: WitnessV5,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    /// Base64-encoded serialized transaction.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxBodyV5 {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<JsonValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collaterals: Vec<TxInV5>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<Num>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<TxInV5>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mint: Option<ValueV5>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<TxOutV5>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_extra_signatures: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_integrity_hash: Option<String>,
    #[serde(default)]
    pub validity_interval: ValidityIntervalV5,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub withdrawals: BTreeMap<String, Num>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collateral_return: Option<TxOutV5>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_collateral: Option<Num>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<TxInV5>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityIntervalV5 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_before: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_hereafter: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInV5 {
    #[serde(rename = "txId")]
    pub tx_id: String,
    pub index: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutV5 {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datum_hash: Option<String>,
    #[serde(default)]
    pub value: ValueV5,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<JsonValue>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WitnessV5 {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bootstrap: Vec<JsonValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub datums: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemers: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub signatures: BTreeMap<String, String>,
}

impl TxInV5 {
    fn to_current(&self) -> TxIn {
        TxIn::new(self.tx_id.clone(), self.index)
    }

    fn from_current(input: &TxIn) -> Self {
        Self {
            tx_id: input.transaction.id.clone(),
            index: input.index,
        }
    }
}

impl TxOutV5 {
    fn to_current(&self) -> TxOut {
        TxOut {
            address: self.address.clone(),
            value: self.value.to_current(),
            datum_hash: self.datum_hash.clone(),
            datum: self.datum.clone(),
            script: self.script.clone(),
        }
    }

    fn from_current(out: &TxOut) -> Self {
        Self {
            address: out.address.clone(),
            datum: out.datum.clone(),
            datum_hash: out.datum_hash.clone(),
            value: ValueV5::from_current(&out.value),
            script: out.script.clone(),
        }
    }
}

/// Older nodes sent datums as base64; the current model is hex.
pub fn normalize_datum(datum: &str) -> String {
    if hex::decode(datum).is_ok() {
        return datum.to_string();
    }
    match BASE64.decode(datum) {
        Ok(bytes) => hex::encode(bytes),
        Err(_) => datum.to_string(),
    }
}

fn base64_to_hex(raw: &str) -> String {
    BASE64
        .decode(raw)
        .map(hex::encode)
        .unwrap_or_else(|_| raw.to_string())
}

fn hex_to_base64(cbor: &str) -> String {
    hex::decode(cbor)
        .map(|bytes| BASE64.encode(bytes))
        .unwrap_or_else(|_| cbor.to_string())
}

/// Spend marker given to legacy transactions that predate `inputSource`.
const DEFAULT_SPENDS: &str = "inputs";

impl TxV5 {
    pub fn to_current(&self) -> Tx {
        let body = &self.body;
        let validity = &body.validity_interval;
        let validity_interval = (validity.invalid_before.is_some()
            || validity.invalid_hereafter.is_some())
        .then(|| ValidityInterval {
            invalid_before: validity.invalid_before,
            invalid_after: validity.invalid_hereafter,
        });

        Tx {
            id: self.id.clone(),
            spends: if self.input_source.is_empty() {
                DEFAULT_SPENDS.to_string()
            } else {
                self.input_source.clone()
            },
            inputs: body.inputs.iter().map(TxInV5::to_current).collect(),
            references: body.references.iter().map(TxInV5::to_current).collect(),
            collaterals: body.collaterals.iter().map(TxInV5::to_current).collect(),
            collateral_return: body.collateral_return.as_ref().map(TxOutV5::to_current),
            total_collateral: body.total_collateral.clone().map(Value::from_lovelace),
            outputs: body.outputs.iter().map(TxOutV5::to_current).collect(),
            fee: body.fee.clone().map(Value::from_lovelace),
            validity_interval,
            mint: body.mint.as_ref().map(ValueV5::to_current),
            withdrawals: body
                .withdrawals
                .iter()
                .map(|(addr, amount)| (addr.clone(), Value::from_lovelace(amount.clone())))
                .collect(),
            network: body.network.as_ref().and_then(|n| n.as_str().map(str::to_string)),
            script_integrity_hash: body.script_integrity_hash.clone(),
            required_extra_signatories: body.required_extra_signatures.clone(),
            certificates: body.certificates.clone(),
            signatories: self
                .witness
                .signatures
                .iter()
                .map(|(key, signature)| Signatory {
                    key: key.clone(),
                    signature: signature.clone(),
                    chain_code: None,
                    address_attributes: None,
                })
                .collect(),
            scripts: self.witness.scripts.clone(),
            datums: self
                .witness
                .datums
                .iter()
                .map(|(k, v)| (k.clone(), normalize_datum(v)))
                .collect(),
            redeemers: self.witness.redeemers.clone(),
            metadata: self.metadata.clone(),
            proposals: None,
            votes: None,
            cbor: (!self.raw.is_empty()).then(|| base64_to_hex(&self.raw)),
        }
    }

    pub fn from_current(tx: &Tx) -> Self {
        let validity_interval = tx
            .validity_interval
            .as_ref()
            .map(|v| ValidityIntervalV5 {
                invalid_before: v.invalid_before,
                invalid_hereafter: v.invalid_after,
            })
            .unwrap_or_default();

        Self {
            id: tx.id.clone(),
            input_source: tx.spends.clone(),
            body: TxBodyV5 {
                certificates: tx.certificates.clone(),
                collaterals: tx.collaterals.iter().map(TxInV5::from_current).collect(),
                fee: tx.fee.as_ref().map(Value::ada_lovelace),
                inputs: tx.inputs.iter().map(TxInV5::from_current).collect(),
                mint: tx.mint.as_ref().map(ValueV5::from_current),
                network: tx.network.clone().map(JsonValue::String),
                outputs: tx.outputs.iter().map(TxOutV5::from_current).collect(),
                required_extra_signatures: tx.required_extra_signatories.clone(),
                script_integrity_hash: tx.script_integrity_hash.clone(),
                validity_interval,
                withdrawals: tx
                    .withdrawals
                    .iter()
                    .map(|(addr, value)| (addr.clone(), value.ada_lovelace()))
                    .collect(),
                collateral_return: tx.collateral_return.as_ref().map(TxOutV5::from_current),
                total_collateral: tx.total_collateral.as_ref().map(Value::ada_lovelace),
                references: tx.references.iter().map(TxInV5::from_current).collect(),
            },
            witness: WitnessV5 {
                bootstrap: Vec::new(),
                datums: tx.datums.clone(),
                redeemers: tx.redeemers.clone(),
                scripts: tx.scripts.clone(),
                signatures: tx
                    .signatories
                    .iter()
                    .map(|s| (s.key.clone(), s.signature.clone()))
                    .collect(),
            },
            metadata: tx.metadata.clone(),
            raw: tx.cbor.as_deref().map(hex_to_base64).unwrap_or_default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Response envelope
// ─────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultV5 {
    pub code: String,
    pub string: String,
}

const FAULT_CLIENT: &str = "client";
const FAULT_SERVER: &str = "server";
const CODE_INVALID_REQUEST: i64 = -32600;
const CODE_INTERNAL_ERROR: i64 = -32603;

impl FaultV5 {
    pub fn to_current(&self) -> ResponseError {
        let code = match self.code.as_str() {
            FAULT_CLIENT => CODE_INVALID_REQUEST,
            _ => CODE_INTERNAL_ERROR,
        };
        ResponseError {
            code,
            message: self.string.clone(),
            data: None,
        }
    }

    pub fn from_current(error: &ResponseError) -> Self {
        let code = if error.code == CODE_INVALID_REQUEST {
            FAULT_CLIENT
        } else {
            FAULT_SERVER
        };
        Self {
            code: code.into(),
            string: error.message.clone(),
        }
    }
}

/// JSON-WSP response envelope.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseV5 {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub servicename: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub methodname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultV5>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<JsonValue>,
}

impl ResponseV5 {
    pub fn to_current(&self) -> Result<Response> {
        let method = Method::from_name(&self.methodname)?;
        let result = match &self.result {
            None | Some(JsonValue::Null) => None,
            Some(raw) => Some(match method {
                Method::FindIntersection => ResponseResult::FindIntersection(
                    serde_json::from_value::<ResultFindIntersectionV5>(raw.clone())?.to_current(),
                ),
                Method::NextBlock => ResponseResult::NextBlock(
                    serde_json::from_value::<ResultNextBlockV5>(raw.clone())?.to_current()?,
                ),
            }),
        };
        Ok(Response {
            jsonrpc: JSONRPC_VERSION.into(),
            method,
            result,
            error: self.fault.as_ref().map(FaultV5::to_current),
            id: self.reflection.clone(),
        })
    }

    /// An intersection error is expressed as a legacy `IntersectionNotFound`
    /// result; any other error becomes a fault.
    pub fn from_current(r: &Response) -> Result<Self> {
        let mut result = match &r.result {
            Some(ResponseResult::FindIntersection(fi)) => {
                Some(serde_json::to_value(ResultFindIntersectionV5::from_current(fi))?)
            }
            Some(ResponseResult::NextBlock(nb)) => {
                Some(serde_json::to_value(ResultNextBlockV5::from_current(nb)?)?)
            }
            None => None,
        };
        let mut fault = None;
        if let Some(error) = &r.error {
            if r.method == Method::FindIntersection && error.is_intersection_not_found() {
                if result.is_none() {
                    let not_found = ResultFindIntersectionV5::from_current(&ResultFindIntersection {
                        error: Some(error.clone()),
                        ..Default::default()
                    });
                    result = Some(serde_json::to_value(not_found)?);
                }
            } else {
                fault = Some(FaultV5::from_current(error));
            }
        }
        Ok(Self {
            kind: if fault.is_some() { FAULT_TYPE } else { RESPONSE_TYPE }.into(),
            version: WSP_VERSION.into(),
            servicename: SERVICE_NAME.into(),
            methodname: r.method.legacy_name().into(),
            result,
            fault,
            reflection: r.id.clone(),
        })
    }
}
