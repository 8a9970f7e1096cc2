//! Proptest generators for property-based testing.

use ogmios_core::{AssetId, Coin, Num, Point, PointStruct, Value};
use proptest::prelude::*;

/// A 32-byte hex hash.
pub fn hash() -> impl Strategy<Value = String> {
    prop::array::uniform32(any::<u8>()).prop_map(hex::encode)
}

/// A 28-byte hex policy id.
pub fn policy_id() -> impl Strategy<Value = String> {
    prop::collection::vec(any::<u8>(), 28).prop_map(hex::encode)
}

pub fn point_struct() -> impl Strategy<Value = PointStruct> {
    (any::<u64>(), hash(), proptest::option::of(any::<u64>())).prop_map(|(slot, id, height)| {
        PointStruct {
            height,
            id,
            slot,
        }
    })
}

/// Origin or a concrete point, mostly concrete.
pub fn point() -> impl Strategy<Value = Point> {
    prop_oneof![
        1 => Just(Point::origin()),
        9 => point_struct().prop_map(Point::from),
    ]
}

pub fn points(max_len: usize) -> impl Strategy<Value = Vec<Point>> {
    prop::collection::vec(point(), 0..=max_len)
}

/// Amounts that sometimes exceed 64 bits.
pub fn num() -> impl Strategy<Value = Num> {
    prop_oneof![
        any::<u64>().prop_map(Num::from),
        any::<i128>().prop_map(Num::from),
    ]
}

pub fn asset_id() -> impl Strategy<Value = AssetId> {
    (policy_id(), prop::collection::vec(any::<u8>(), 0..8))
        .prop_map(|(policy, name)| AssetId::from_parts(&policy, &hex::encode(name)))
}

/// A value with some lovelace and up to four other assets.
pub fn value() -> impl Strategy<Value = Value> {
    (any::<u64>(), prop::collection::vec((asset_id(), num()), 0..4)).prop_map(
        |(lovelace, assets)| {
            let mut value = Value::from_lovelace(lovelace);
            for (id, amount) in assets {
                value.add_asset(Coin::new(id, amount));
            }
            value
        },
    )
}
