//! Client queries and sessions against an in-memory node.

use std::time::Duration;

use ogmios_client::core::TxIn;
use ogmios_client::store::MemoryStore;
use ogmios_client::sync::memory::{self, MemoryAcceptor, MemoryConnector};
use ogmios_client::sync::{handler_fn, SyncError};
use ogmios_client::{Client, ClientConfig, ClientError, Point, PointStruct};
use ogmios_testkit::{scripted, ChainFixture, Step};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

fn client(connector: MemoryConnector) -> Client<MemoryConnector> {
    let config = ClientConfig {
        query_timeout: Duration::from_secs(5),
        ..ClientConfig::default()
    };
    Client::with_connector(connector, config)
}

/// Answer one query with `reply`, returning the request the node received.
fn answer(mut acceptor: MemoryAcceptor, reply: &'static str) -> tokio::task::JoinHandle<JsonValue> {
    tokio::spawn(async move {
        let mut conn = acceptor.accept().await.unwrap();
        let request: JsonValue = serde_json::from_str(&conn.recv().await.unwrap()).unwrap();
        conn.send(reply).await;
        request
    })
}

#[tokio::test]
async fn test_chain_tip() {
    let (connector, acceptor) = memory::connector();
    let node = answer(
        acceptor,
        r#"{"jsonrpc":"2.0","method":"queryLedgerState/tip","result":{"slot":1234,"id":"abcd"},"id":1}"#,
    );

    let tip = client(connector).chain_tip().await.unwrap();
    assert_eq!(tip, PointStruct::new(1234, "abcd").point());

    let request = node.await.unwrap();
    assert_eq!(request["method"], "queryLedgerState/tip");
    assert_eq!(request["jsonrpc"], "2.0");
}

#[tokio::test]
async fn test_utxos_by_tx_in_params() {
    let (connector, acceptor) = memory::connector();
    let node = answer(
        acceptor,
        r#"{"jsonrpc":"2.0","method":"queryLedgerState/utxo","result":[
            {"transaction":{"id":"aa"},"index":0,"address":"addr_test1","value":{"ada":{"lovelace":5}}}
        ]}"#,
    );

    let utxos = client(connector)
        .utxos_by_tx_in(&[TxIn::new("aa", 0)])
        .await
        .unwrap();
    assert_eq!(utxos.len(), 1);
    assert_eq!(utxos[0].value.ada_lovelace().to_u64(), Some(5));

    let request = node.await.unwrap();
    assert_eq!(
        request["params"]["outputReferences"][0]["transaction"]["id"],
        "aa"
    );
}

#[tokio::test]
async fn test_era_summaries() {
    let (connector, acceptor) = memory::connector();
    answer(
        acceptor,
        r#"{"jsonrpc":"2.0","method":"queryLedgerState/eraSummaries","result":[
            {"start":{"time":{"seconds":0},"slot":0,"epoch":0},
             "end":{"time":{"seconds":89856000},"slot":4492800,"epoch":208},
             "parameters":{"epochLength":21600,"slotLength":{"milliseconds":20000},"safeZone":4320}},
            {"start":{"time":{"seconds":89856000},"slot":4492800,"epoch":208},
             "end":{"time":{"seconds":101952000},"slot":16588800,"epoch":236},
             "parameters":{"epochLength":432000,"slotLength":{"milliseconds":1000},"safeZone":129600}}
        ]}"#,
    );

    let history = client(connector).era_summaries().await.unwrap();
    assert_eq!(history.summaries.len(), 2);
    assert_eq!(
        history.elapsed_milliseconds(4_492_801),
        4_492_800 * 20_000 + 1_000
    );
}

#[tokio::test]
async fn test_query_error() {
    let (connector, acceptor) = memory::connector();
    answer(
        acceptor,
        r#"{"jsonrpc":"2.0","method":"queryLedgerState/epoch","error":{"code":2001,"message":"Era mismatch."}}"#,
    );

    match client(connector).current_epoch().await {
        Err(ClientError::Query { method, message }) => {
            assert_eq!(method, "queryLedgerState/epoch");
            assert!(message.contains("Era mismatch."));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_evaluate_tx_rejects_non_list() {
    let (connector, acceptor) = memory::connector();
    let node = answer(
        acceptor,
        r#"{"jsonrpc":"2.0","method":"evaluateTransaction","result":{"unexpected":true}}"#,
    );

    let result = client(connector).evaluate_tx("84a400").await;
    assert!(matches!(result, Err(ClientError::Query { .. })));

    let request = node.await.unwrap();
    assert_eq!(request["params"]["transaction"]["cbor"], "84a400");
}

#[tokio::test]
async fn test_query_connection_closed() {
    let (connector, mut acceptor) = memory::connector();
    tokio::spawn(async move {
        let mut conn = acceptor.accept().await.unwrap();
        conn.recv().await;
    });

    let result = client(connector).start_time().await;
    assert!(matches!(
        result,
        Err(ClientError::Sync(SyncError::Transport(_)))
    ));
}

#[tokio::test]
async fn test_chain_sync_through_client() {
    let chain = ChainFixture::new(3);
    let (connector, mut node) = scripted();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handler = handler_fn(move |_ctx, event| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(event);
            Ok(())
        }
    });

    let session = client(connector)
        .chain_sync(MemoryStore::new(), handler, [chain.point(1)])
        .unwrap();

    let conn = node.accept().await.unwrap();
    let tip = chain.tip();
    let steps = vec![
        Step::Forward(chain.block(2).clone()),
        Step::Forward(chain.block(3).clone()),
    ];
    let server = tokio::spawn(async move { conn.serve(&chain.point(1), &tip, steps).await });

    let mut points: Vec<Point> = Vec::new();
    while points.len() < 3 {
        let event = rx.recv().await.unwrap();
        points.extend(event.point());
    }
    let report = session.close().await.unwrap();
    assert_eq!(report.blocks, 2);

    let served = server.await.unwrap();
    assert_eq!(served.intersections.len(), 1);
    assert_eq!(points.len(), 3);
}
