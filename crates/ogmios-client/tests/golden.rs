//! Golden wire vectors.
//!
//! Every request must serialize byte-for-byte as pinned, and every captured
//! response, legacy or current, must decode to the pinned event.

use ogmios_client::core::{decode_response, find_intersection, init_id, next_block, Block};
use ogmios_client::store::MemoryStore;
use ogmios_client::sync::initial_request;
use ogmios_client::{PointStruct, SyncEvent};
use ogmios_testkit::fixtures::{CURRENT_ROLL_FORWARD, LEGACY_ROLL_FORWARD};
use ogmios_testkit::vectors::{request_vectors, response_vectors};
use serde_json::Value as JsonValue;

#[test]
fn test_request_vectors() {
    for vector in request_vectors() {
        let json = match vector.next_id {
            Some(id) => next_block(JsonValue::from(id)).to_json().unwrap(),
            None => find_intersection(&vector.points, init_id()).to_json().unwrap(),
        };
        assert_eq!(json, vector.expected, "vector: {}", vector.name);
    }
}

#[test]
fn test_response_vectors() {
    for vector in response_vectors() {
        let decoded = decode_response(vector.frame.as_bytes())
            .unwrap_or_else(|e| panic!("vector {}: {e}", vector.name));
        assert_eq!(decoded.event.name(), vector.event, "vector: {}", vector.name);
        assert_eq!(decoded.event.point(), vector.point, "vector: {}", vector.name);
        assert_eq!(
            decoded.event.tip().cloned(),
            vector.tip,
            "vector: {}",
            vector.name
        );
        let id = vector
            .id
            .map(|raw| serde_json::from_str::<JsonValue>(raw).unwrap());
        assert_eq!(decoded.id, id, "vector: {}", vector.name);
    }
}

#[tokio::test]
async fn test_stored_checkpoint_request() {
    let store = MemoryStore::with_points([PointStruct::new(456, "hash").point()]);
    let json = initial_request(&store, &[PointStruct::new(654, "hash").point()], 5)
        .await
        .unwrap();
    assert_eq!(json, request_vectors()[0].expected);
}

fn block_of(frame: &str) -> Block {
    match decode_response(frame.as_bytes()).unwrap().event {
        SyncEvent::RollForward { block, .. } => *block,
        other => panic!("expected a roll forward, got {}", other.name()),
    }
}

#[test]
fn test_legacy_and_current_blocks_agree() {
    let legacy = block_of(LEGACY_ROLL_FORWARD);
    let current = block_of(CURRENT_ROLL_FORWARD);

    assert_eq!(legacy.era, "alonzo");
    assert_eq!(legacy.id, current.id);
    assert_eq!(legacy.ancestor, current.ancestor);
    assert_eq!(legacy.height, current.height);
    assert_eq!(legacy.slot, current.slot);
    assert_eq!(legacy.size, current.size);

    let (lt, ct) = (&legacy.transactions[0], &current.transactions[0]);
    assert_eq!(lt.id, ct.id);
    assert_eq!(lt.spends, ct.spends);
    assert_eq!(lt.inputs, ct.inputs);
    assert_eq!(lt.outputs, ct.outputs);
    assert_eq!(lt.fee_lovelace(), ct.fee_lovelace());
    assert_eq!(lt.cbor, ct.cbor);
}

#[test]
fn test_legacy_validity_interval_renamed() {
    let legacy = block_of(LEGACY_ROLL_FORWARD);
    let interval = legacy.transactions[0].validity_interval.clone().unwrap();
    assert_eq!(interval.invalid_before, None);
    assert_eq!(interval.invalid_after, Some(48_000_000));
}
