//! Behavioural tests for chain-sync sessions against a scripted node.

use std::sync::Arc;
use std::time::Duration;

use ogmios_core::{Point, PointStruct, SyncEvent};
use ogmios_store::{CheckpointStore, MemoryStore, SqliteStore};
use ogmios_sync::{
    handler_fn, ChainSync, EventHandler, ReconnectConfig, SessionConfig, SessionState, SyncError,
};
use ogmios_testkit::{scripted, ChainFixture, Step};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// A handler that forwards every event to a channel.
fn recorder() -> (impl EventHandler, mpsc::UnboundedReceiver<SyncEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = handler_fn(move |_ctx, event| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(event);
            Ok(())
        }
    });
    (handler, rx)
}

async fn take(rx: &mut mpsc::UnboundedReceiver<SyncEvent>, n: usize) -> Vec<SyncEvent> {
    let mut events = Vec::with_capacity(n);
    for _ in 0..n {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event within timeout")
            .expect("session still running");
        events.push(event);
    }
    events
}

fn no_reconnect() -> SessionConfig {
    SessionConfig {
        reconnect: ReconnectConfig::disabled(),
        ..SessionConfig::default()
    }
}

fn forward_steps(chain: &ChainFixture) -> Vec<Step> {
    chain.blocks().iter().cloned().map(Step::Forward).collect()
}

#[tokio::test]
async fn test_pipelined_events_arrive_in_order() {
    init_tracing();
    let chain = ChainFixture::new(20);
    let (connector, mut node) = scripted();
    let (handler, mut events) = recorder();

    let config = SessionConfig {
        pipeline_depth: 5,
        ..no_reconnect()
    };
    let session = ChainSync::new(connector, MemoryStore::new(), handler)
        .with_config(config)
        .start()
        .unwrap();

    let conn = node.accept().await.unwrap();
    let steps = forward_steps(&chain);
    let tip = chain.tip();
    let server = tokio::spawn(async move { conn.serve(&Point::origin(), &tip, steps).await });

    let received = take(&mut events, 21).await;
    assert!(matches!(
        &received[0],
        SyncEvent::IntersectionFound { point, .. } if point.is_origin()
    ));
    let points: Vec<Point> = received[1..].iter().filter_map(SyncEvent::point).collect();
    let expected: Vec<Point> = (1..=20).map(|h| chain.point(h)).collect();
    assert_eq!(points, expected);

    let report = session.close().await.unwrap();
    assert_eq!(report.blocks, 20);
    assert_eq!(report.last_point, Some(chain.point(20)));

    let served = server.await.unwrap();
    assert!(served.next_ids.len() >= 20 && served.next_ids.len() <= 25);
    for (i, id) in served.next_ids.iter().enumerate() {
        assert_eq!(*id, JsonValue::from(i as u64 + 1));
    }
}

#[tokio::test]
async fn test_store_checkpoint_takes_precedence() {
    let (connector, mut node) = scripted();
    let (handler, _events) = recorder();
    let store = MemoryStore::with_points([PointStruct::new(456, "hash").point()]);

    let session = ChainSync::new(connector, store, handler)
        .with_points([PointStruct::new(654, "hash").point()])
        .with_config(no_reconnect())
        .start()
        .unwrap();

    let mut conn = node.accept().await.unwrap();
    let points = conn.expect_find_intersection().await.unwrap();
    assert_eq!(points, vec![PointStruct::new(456, "hash").point()]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_explicit_points_used_when_store_empty() {
    let (connector, mut node) = scripted();
    let (handler, _events) = recorder();

    let session = ChainSync::new(connector, MemoryStore::new(), handler)
        .with_points([PointStruct::new(654, "hash").point()])
        .with_config(no_reconnect())
        .start()
        .unwrap();

    let mut conn = node.accept().await.unwrap();
    let points = conn.expect_find_intersection().await.unwrap();
    assert_eq!(points, vec![PointStruct::new(654, "hash").point()]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_intersection_not_found_fails_without_retry() {
    let (connector, mut node) = scripted();
    let (handler, _events) = recorder();
    let tip = PointStruct::new(900, "cc");

    let mut session = ChainSync::new(connector, MemoryStore::new(), handler)
        .start()
        .unwrap();

    let mut conn = node.accept().await.unwrap();
    conn.expect_find_intersection().await.unwrap();
    conn.reject_intersection(&tip).await;

    assert_eq!(session.wait_for(SessionState::Closed).await, SessionState::Failed);
    match session.wait().await {
        Err(SyncError::IntersectionNotFound { tip: Some(t) }) => assert_eq!(t, tip),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(node.accept().await.is_none());
}

#[tokio::test]
async fn test_legacy_node_with_rollback() {
    let chain = ChainFixture::new(3);
    let (connector, mut node) = scripted();
    let (handler, mut events) = recorder();
    let store = Arc::new(MemoryStore::new());

    let session = ChainSync::new(connector, store.clone(), handler)
        .with_config(no_reconnect())
        .start()
        .unwrap();

    let conn = node.accept().await.unwrap().legacy();
    let steps = vec![
        Step::Forward(chain.block(1).clone()),
        Step::Forward(chain.block(2).clone()),
        Step::Backward(chain.point(1)),
        Step::Forward(chain.block(2).clone()),
        Step::Forward(chain.block(3).clone()),
    ];
    let tip = chain.tip();
    let server = tokio::spawn(async move { conn.serve(&Point::origin(), &tip, steps).await });

    let received = take(&mut events, 6).await;
    let names: Vec<&str> = received.iter().map(SyncEvent::name).collect();
    assert_eq!(
        names,
        [
            "IntersectionFound",
            "RollForward",
            "RollForward",
            "RollBackward",
            "RollForward",
            "RollForward"
        ]
    );
    assert_eq!(received[3].point(), Some(chain.point(1)));
    assert_eq!(received[5].tip(), Some(&chain.tip()));

    let report = session.close().await.unwrap();
    assert_eq!(report.blocks, 4);
    assert_eq!(report.rollbacks, 1);
    server.await.unwrap();

    let saved = store.load().await.unwrap();
    assert_eq!(saved, vec![chain.point(3), chain.point(2), chain.point(1)]);
}

#[tokio::test]
async fn test_callback_error_fails_session() {
    let chain = ChainFixture::new(2);
    let (connector, mut node) = scripted();
    let handler = handler_fn(|_ctx, event| async move {
        match event {
            SyncEvent::RollForward { .. } => anyhow::bail!("refusing block"),
            _ => Ok(()),
        }
    });
    let store = Arc::new(MemoryStore::new());

    let session = ChainSync::new(connector, store.clone(), handler)
        .start()
        .unwrap();

    let conn = node.accept().await.unwrap();
    let tip = chain.tip();
    let steps = forward_steps(&chain);
    tokio::spawn(async move { conn.serve(&Point::origin(), &tip, steps).await });

    match session.wait().await {
        Err(SyncError::Callback(e)) => assert_eq!(e.to_string(), "refusing block"),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_protocol_error_fails_session() {
    let (connector, mut node) = scripted();
    let (handler, _events) = recorder();

    let session = ChainSync::new(connector, MemoryStore::new(), handler)
        .start()
        .unwrap();

    let conn = node.accept().await.unwrap();
    let steps = vec![Step::Error {
        code: -32600,
        message: "bad request".into(),
    }];
    let tip = PointStruct::new(1, "aa");
    tokio::spawn(async move { conn.serve(&Point::origin(), &tip, steps).await });

    match session.wait().await {
        Err(SyncError::Protocol { code, message }) => {
            assert_eq!(code, -32600);
            assert_eq!(message, "bad request");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_method_fails_session() {
    let (connector, mut node) = scripted();
    let (handler, _events) = recorder();

    let session = ChainSync::new(connector, MemoryStore::new(), handler)
        .start()
        .unwrap();

    let conn = node.accept().await.unwrap();
    let steps = vec![Step::Raw(
        r#"{"jsonrpc":"2.0","method":"acquireLedgerState","result":{},"id":1}"#.into(),
    )];
    let tip = PointStruct::new(1, "aa");
    tokio::spawn(async move { conn.serve(&Point::origin(), &tip, steps).await });

    assert!(matches!(
        session.wait().await,
        Err(SyncError::Core(ogmios_core::CoreError::UnknownMethod(_)))
    ));
}

#[tokio::test]
async fn test_mismatched_id_fails_session() {
    let chain = ChainFixture::new(1);
    let (connector, mut node) = scripted();
    let (handler, _events) = recorder();

    let session = ChainSync::new(connector, MemoryStore::new(), handler)
        .with_config(SessionConfig {
            pipeline_depth: 1,
            ..SessionConfig::default()
        })
        .start()
        .unwrap();

    let conn = node.accept().await.unwrap();
    let frame = ogmios_testkit::fixtures::roll_forward(
        conn.generation(),
        chain.block(1),
        &chain.tip(),
        JsonValue::from(99),
    );
    let tip = chain.tip();
    tokio::spawn(async move { conn.serve(&Point::origin(), &tip, vec![Step::Raw(frame)]).await });

    assert!(matches!(
        session.wait().await,
        Err(SyncError::UnexpectedResponse(_))
    ));
}

#[tokio::test]
async fn test_reconnect_resumes_from_recent_points() {
    init_tracing();
    let chain = ChainFixture::new(3);
    let (connector, mut node) = scripted();
    let (handler, mut events) = recorder();

    let config = SessionConfig {
        reconnect: ReconnectConfig {
            initial_backoff: Duration::from_millis(10),
            jitter: false,
            ..ReconnectConfig::default()
        },
        ..SessionConfig::default()
    };
    let session = ChainSync::new(connector, MemoryStore::new(), handler)
        .with_config(config)
        .start()
        .unwrap();

    let first = node.accept().await.unwrap();
    let tip = chain.tip();
    let steps = vec![
        Step::Forward(chain.block(1).clone()),
        Step::Forward(chain.block(2).clone()),
        Step::Disconnect,
    ];
    let served = first.serve(&Point::origin(), &tip, steps).await;
    assert_eq!(served.intersections, vec![vec![Point::origin()]]);
    take(&mut events, 3).await;

    let mut second = node.accept().await.unwrap();
    let points = second.expect_find_intersection().await.unwrap();
    assert_eq!(points[0], chain.point(2));
    assert_eq!(points[1], chain.point(1));

    second.intersect(&chain.point(2), &tip).await;
    let resumed = take(&mut events, 1).await;
    assert_eq!(resumed[0].point(), Some(chain.point(2)));

    let report = session.close().await.unwrap();
    assert_eq!(report.reconnects, 1);
    assert_eq!(report.blocks, 2);
}

#[tokio::test]
async fn test_close_stops_callbacks() {
    let chain = ChainFixture::new(200);
    let (connector, mut node) = scripted();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handler = handler_fn(move |_ctx, event: SyncEvent| {
        let tx = tx.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            let _ = tx.send(event.name());
            Ok(())
        }
    });

    let session = ChainSync::new(connector, MemoryStore::new(), handler)
        .with_config(no_reconnect())
        .start()
        .unwrap();

    let conn = node.accept().await.unwrap();
    let tip = chain.tip();
    let steps = forward_steps(&chain);
    tokio::spawn(async move { conn.serve(&Point::origin(), &tip, steps).await });

    for _ in 0..5 {
        rx.recv().await.unwrap();
    }
    let report = session.close().await.unwrap();

    let mut delivered = 5;
    while rx.try_recv().is_ok() {
        delivered += 1;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(report.blocks + 1, delivered);
    assert!(report.blocks < 200);
}

#[tokio::test]
async fn test_sqlite_checkpoints_survive_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checkpoints.db");
    let chain = ChainFixture::new(3);
    let (connector, mut node) = scripted();

    {
        let (handler, mut events) = recorder();
        let store = SqliteStore::open(&path).unwrap();
        let session = ChainSync::new(connector.clone(), store, handler)
            .with_config(no_reconnect())
            .start()
            .unwrap();

        let conn = node.accept().await.unwrap();
        let tip = chain.tip();
        let steps = forward_steps(&chain);
        tokio::spawn(async move { conn.serve(&Point::origin(), &tip, steps).await });

        take(&mut events, 4).await;
        session.close().await.unwrap();
    }

    let (handler, _events) = recorder();
    let store = SqliteStore::open(&path).unwrap();
    let session = ChainSync::new(connector, store, handler)
        .with_points([Point::origin()])
        .with_config(no_reconnect())
        .start()
        .unwrap();

    let mut conn = node.accept().await.unwrap();
    let points = conn.expect_find_intersection().await.unwrap();
    assert_eq!(points, vec![chain.point(3), chain.point(2), chain.point(1)]);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_restart_after_fork_resumes_on_new_chain() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checkpoints.db");
    let chain = ChainFixture::new(7);
    let fork = chain.fork(2, 2);
    let (connector, mut node) = scripted();

    {
        let (handler, mut events) = recorder();
        let store = SqliteStore::open(&path).unwrap();
        let session = ChainSync::new(connector.clone(), store, handler)
            .with_config(no_reconnect())
            .start()
            .unwrap();

        let conn = node.accept().await.unwrap();
        let mut steps = forward_steps(&chain);
        steps.push(Step::Backward(chain.point(2)));
        steps.push(Step::Forward(fork.block(3).clone()));
        steps.push(Step::Forward(fork.block(4).clone()));
        let tip = fork.tip();
        tokio::spawn(async move { conn.serve(&Point::origin(), &tip, steps).await });

        let received = take(&mut events, 11).await;
        assert_eq!(received[8].name(), "RollBackward");
        assert_eq!(received[10].point(), Some(fork.point(4)));
        session.close().await.unwrap();
    }

    let (handler, _events) = recorder();
    let store = SqliteStore::open(&path).unwrap();
    let session = ChainSync::new(connector, store, handler)
        .with_config(no_reconnect())
        .start()
        .unwrap();

    let mut conn = node.accept().await.unwrap();
    let points = conn.expect_find_intersection().await.unwrap();
    assert_eq!(
        points,
        vec![fork.point(4), fork.point(3), chain.point(2), chain.point(1)]
    );
    for height in 3..=7 {
        assert!(!points.contains(&chain.point(height)));
    }
    session.close().await.unwrap();
}
