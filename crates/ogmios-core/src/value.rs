//! Multi-asset values.
//!
//! The current wire model nests amounts by policy then asset name, with the
//! native coin under `ada`/`lovelace`:
//!
//! ```json
//! {"ada": {"lovelace": 2000000}, "<policy>": {"<name>": 1}}
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::num::Num;

/// Policy key of the native coin.
pub const ADA_POLICY: &str = "ada";
/// Asset name of the native coin.
pub const LOVELACE: &str = "lovelace";

/// `policy.name`, or just `policy` for an asset with an empty name.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_parts(policy: &str, name: &str) -> Self {
        if name.is_empty() {
            Self(policy.to_string())
        } else {
            Self(format!("{policy}.{name}"))
        }
    }

    /// The native coin.
    pub fn ada() -> Self {
        Self::from_parts(ADA_POLICY, LOVELACE)
    }

    pub fn is_ada(&self) -> bool {
        self.policy_id() == ADA_POLICY
    }

    pub fn policy_id(&self) -> &str {
        match self.0.find('.') {
            Some(i) if i > 0 => &self.0[..i],
            _ => &self.0,
        }
    }

    /// Hex-encoded asset name; empty when the id has no name.
    pub fn asset_name(&self) -> &str {
        match self.0.find('.') {
            Some(i) if i > 0 => &self.0[i + 1..],
            _ => "",
        }
    }

    /// The asset name decoded from hex, when it is valid UTF-8.
    pub fn asset_name_utf8(&self) -> Option<String> {
        let bytes = hex::decode(self.asset_name()).ok()?;
        String::from_utf8(bytes).ok()
    }

    /// Policy ids are 56 hex characters.
    pub fn has_policy_id(&self, policy: &str) -> bool {
        policy.len() == 56 && self.0.starts_with(policy)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An amount of a single asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coin {
    pub asset_id: AssetId,
    pub amount: Num,
}

impl Coin {
    pub fn new(asset_id: AssetId, amount: Num) -> Self {
        Self { asset_id, amount }
    }

    pub fn ada(lovelace: impl Into<Num>) -> Self {
        Self::new(AssetId::ada(), lovelace.into())
    }
}

/// A bundle of assets keyed by policy and asset name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Value(BTreeMap<String, BTreeMap<String, Num>>);

impl Value {
    pub fn new() -> Self {
        Self::default()
    }

    /// A value holding only the native coin.
    pub fn from_lovelace(lovelace: impl Into<Num>) -> Self {
        let mut v = Self::new();
        v.add_asset(Coin::ada(lovelace));
        v
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `policy` appears as a top-level key.
    pub fn has_policy(&self, policy: &str) -> bool {
        self.0.contains_key(policy)
    }

    /// Native coin amount; zero if absent.
    pub fn ada_lovelace(&self) -> Num {
        self.amount_of(&AssetId::ada())
    }

    pub fn amount_of(&self, asset: &AssetId) -> Num {
        self.0
            .get(asset.policy_id())
            .and_then(|names| names.get(asset.asset_name()))
            .cloned()
            .unwrap_or_default()
    }

    /// Add a coin, merging with any amount already held.
    pub fn add_asset(&mut self, coin: Coin) {
        let names = self
            .0
            .entry(coin.asset_id.policy_id().to_string())
            .or_default();
        let slot = names
            .entry(coin.asset_id.asset_name().to_string())
            .or_default();
        *slot = &*slot + &coin.amount;
    }

    /// Every asset held, native coin included.
    pub fn coins(&self) -> impl Iterator<Item = Coin> + '_ {
        self.0.iter().flat_map(|(policy, names)| {
            names
                .iter()
                .map(move |(name, amount)| Coin::new(AssetId::from_parts(policy, name), amount.clone()))
        })
    }

    /// Every asset other than the native coin.
    pub fn assets(&self) -> impl Iterator<Item = Coin> + '_ {
        self.coins().filter(|c| !c.asset_id.is_ada())
    }

    pub fn add(&self, other: &Value) -> Value {
        let mut out = self.clone();
        for coin in other.coins() {
            out.add_asset(coin);
        }
        out
    }

    pub fn sub(&self, other: &Value) -> Value {
        let mut out = self.clone();
        for coin in other.coins() {
            out.add_asset(Coin::new(coin.asset_id, -coin.amount));
        }
        out
    }

    /// True when every amount in `want` is covered.
    pub fn enough(&self, want: &Value) -> bool {
        want.coins()
            .all(|c| self.amount_of(&c.asset_id) >= c.amount)
    }

    /// Same amounts, treating missing and zero as equal.
    pub fn equals(&self, other: &Value) -> bool {
        self.without_zeros() == other.without_zeros()
    }

    fn without_zeros(&self) -> Value {
        let mut out = Value::new();
        for coin in self.coins().filter(|c| !c.amount.is_zero()) {
            out.add_asset(coin);
        }
        out
    }
}
