//! Chain-sync session state machine.
//!
//! A session finds an intersection with the node's chain, then keeps up to
//! `pipeline_depth` `nextBlock` requests in flight and hands every
//! roll-forward and roll-backward to the [`EventHandler`] in the order the
//! node produced them.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle -> Connecting -> AwaitingIntersection -> Streaming -> Closing -> Closed
//!              ^                                    |
//!              +------------ transport error -------+
//! ```
//!
//! Any non-retryable error moves the session to `Failed`. Transport errors
//! and timeouts reconnect under [`ReconnectConfig`](crate::ReconnectConfig),
//! resuming from the most recent points the handler has processed.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use ogmios_core::{
    codec, decode_response, display_points, sort_points, Point, PointStruct, SyncEvent,
};
use ogmios_store::CheckpointStore;
use serde_json::Value as JsonValue;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::error::{Result, SyncError};
use crate::handler::{CallbackContext, EventHandler};
use crate::transport::{Connector, Transport};

// ─────────────────────────────────────────────────────────────────────────────
// State and report
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Connecting,
    AwaitingIntersection,
    Streaming,
    Closing,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::AwaitingIntersection => "awaiting-intersection",
            SessionState::Streaming => "streaming",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    /// Roll-forwards delivered to the handler.
    pub blocks: u64,
    /// Roll-backwards delivered to the handler.
    pub rollbacks: u64,
    /// Successful reconnects after transport errors.
    pub reconnects: u32,
    /// The last point the handler processed.
    pub last_point: Option<Point>,
    /// The most recent tip the node reported.
    pub tip: Option<PointStruct>,
}

impl SessionReport {
    fn events(&self) -> u64 {
        self.blocks + self.rollbacks
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resume points
// ─────────────────────────────────────────────────────────────────────────────

/// Points for the first intersection request of a session.
///
/// Stored checkpoints win over `explicit`; with neither, the session starts
/// from origin. The result is most-recent first and holds at most `max`
/// points.
pub async fn initial_points<S>(store: &S, explicit: &[Point], max: usize) -> Result<Vec<Point>>
where
    S: CheckpointStore + ?Sized,
{
    let mut points = store.load().await?;
    if points.is_empty() {
        points = explicit.to_vec();
    }
    if points.is_empty() {
        points.push(Point::origin());
    }
    for point in &points {
        point.validate()?;
    }
    sort_points(&mut points);
    points.truncate(max);
    Ok(points)
}

/// The serialized intersection request a fresh session would send.
pub async fn initial_request<S>(store: &S, explicit: &[Point], max: usize) -> Result<String>
where
    S: CheckpointStore + ?Sized,
{
    let points = initial_points(store, explicit, max).await?;
    Ok(codec::find_intersection(&points, codec::init_id()).to_json()?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder and handle
// ─────────────────────────────────────────────────────────────────────────────

/// Builds a chain-sync session.
///
/// ```rust,no_run
/// use ogmios_store::MemoryStore;
/// use ogmios_sync::{handler_fn, ChainSync, WebSocketConnector};
///
/// # async fn example() -> ogmios_sync::Result<()> {
/// let handler = handler_fn(|_ctx, event| async move {
///     println!("{}", event.name());
///     Ok(())
/// });
/// let session = ChainSync::new(
///     WebSocketConnector::new("ws://127.0.0.1:1337"),
///     MemoryStore::new(),
///     handler,
/// )
/// .start()?;
/// let report = session.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct ChainSync<C, S, H> {
    connector: C,
    store: S,
    handler: H,
    points: Vec<Point>,
    config: SessionConfig,
}

impl<C, S, H> ChainSync<C, S, H>
where
    C: Connector + 'static,
    S: CheckpointStore + 'static,
    H: EventHandler + 'static,
{
    pub fn new(connector: C, store: S, handler: H) -> Self {
        Self {
            connector,
            store,
            handler,
            points: Vec::new(),
            config: SessionConfig::default(),
        }
    }

    /// Resume points used when the store holds none.
    pub fn with_points(mut self, points: impl IntoIterator<Item = Point>) -> Self {
        self.points = points.into_iter().collect();
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration and spawn the session.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> Result<SessionHandle> {
        self.config.validate()?;
        for point in &self.points {
            point.validate()?;
        }

        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let driver = Driver {
            connector: self.connector,
            store: self.store,
            handler: self.handler,
            points: self.points,
            config: self.config,
            cancel: cancel.clone(),
            state: state_tx,
            recent: VecDeque::new(),
            report: SessionReport::default(),
        };
        let task = tokio::spawn(driver.run());

        Ok(SessionHandle {
            cancel,
            state: state_rx,
            task: Some(task),
        })
    }
}

/// A running session. Dropping the handle cancels it.
pub struct SessionHandle {
    cancel: CancellationToken,
    state: watch::Receiver<SessionState>,
    task: Option<JoinHandle<Result<SessionReport>>>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `target` or a terminal state, and
    /// return the state reached.
    pub async fn wait_for(&mut self, target: SessionState) -> SessionState {
        loop {
            let current = *self.state.borrow_and_update();
            if current == target || current.is_terminal() {
                return current;
            }
            if self.state.changed().await.is_err() {
                return *self.state.borrow();
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Token cancelled when the session starts closing.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the session and wait for it to wind down.
    ///
    /// In-flight requests are abandoned and no callback starts after this is
    /// called. Returns the report, or the error that ended the session if it
    /// had already failed.
    pub async fn close(mut self) -> Result<SessionReport> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the session to end on its own.
    pub async fn wait(mut self) -> Result<SessionReport> {
        self.join().await
    }

    async fn join(&mut self) -> Result<SessionReport> {
        match self.task.take() {
            Some(task) => task.await.map_err(|e| SyncError::Task(e.to_string()))?,
            None => Err(SyncError::Cancelled),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

type Outstanding = Mutex<VecDeque<JsonValue>>;

struct Driver<C, S, H> {
    connector: C,
    store: S,
    handler: H,
    points: Vec<Point>,
    config: SessionConfig,
    cancel: CancellationToken,
    state: watch::Sender<SessionState>,
    /// Most recent processed points, newest first. Used to resume after a
    /// reconnect.
    recent: VecDeque<Point>,
    report: SessionReport,
}

impl<C, S, H> Driver<C, S, H>
where
    C: Connector + 'static,
    S: CheckpointStore + 'static,
    H: EventHandler + 'static,
{
    fn set_state(&self, state: SessionState) {
        tracing::debug!(%state, "session state");
        self.state.send_replace(state);
    }

    async fn run(mut self) -> Result<SessionReport> {
        let mut attempt: u32 = 0;

        let outcome = loop {
            self.set_state(SessionState::Connecting);
            let progress = self.report.events();

            let err = match self.run_connection().await {
                Ok(()) | Err(SyncError::Cancelled) => break Ok(()),
                Err(e) if self.cancel.is_cancelled() => {
                    tracing::debug!(error = %e, "error while closing");
                    break Ok(());
                }
                Err(e) => e,
            };

            if self.report.events() > progress {
                attempt = 0;
            }
            attempt += 1;
            if !err.is_retryable() || !self.config.reconnect.allows(attempt) {
                break Err(err);
            }

            let delay = self.config.reconnect.backoff(attempt);
            tracing::warn!(
                error = %err,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "connection lost, reconnecting"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => break Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
            self.report.reconnects += 1;
        };

        match outcome {
            Ok(()) => {
                self.set_state(SessionState::Closing);
                self.set_state(SessionState::Closed);
                tracing::info!(
                    blocks = self.report.blocks,
                    rollbacks = self.report.rollbacks,
                    "session closed"
                );
                Ok(self.report)
            }
            Err(e) => {
                self.set_state(SessionState::Failed);
                tracing::error!(error = %e, "session failed");
                Err(e)
            }
        }
    }

    /// One connection, from connect to the error that ends it.
    async fn run_connection(&mut self) -> Result<()> {
        let transport = tokio::select! {
            _ = self.cancel.cancelled() => return Err(SyncError::Cancelled),
            conn = self.connector.connect() => Arc::new(conn?),
        };

        let conn_cancel = self.cancel.child_token();
        let result = self.drive(&transport, &conn_cancel).await;
        conn_cancel.cancel();

        if let Err(e) = transport.close().await {
            tracing::debug!(error = %e, "closing transport");
        }
        result
    }

    async fn drive(
        &mut self,
        transport: &Arc<C::Transport>,
        conn_cancel: &CancellationToken,
    ) -> Result<()> {
        // Phase 1: find intersection
        self.set_state(SessionState::AwaitingIntersection);
        let points = self.resume_points().await?;
        tracing::debug!(points = %display_points(&points), "finding intersection");
        transport
            .send(codec::find_intersection(&points, codec::init_id()).to_json()?)
            .await?;

        let raw = self.next_frame(transport.as_ref()).await?;
        let decoded = decode_response(&raw)?;
        if let Some(id) = &decoded.id {
            if !codec::is_init_id(id) {
                return Err(SyncError::UnexpectedResponse(format!(
                    "expected intersection reply, got id {id}"
                )));
            }
        }

        match decoded.event {
            SyncEvent::IntersectionFound { point, tip } => {
                tracing::info!(point = %point, tip = %tip, "intersection found");
                let event = SyncEvent::IntersectionFound { point, tip };
                if self.config.notify_intersection {
                    self.dispatch(event, raw).await?;
                } else {
                    self.record(&event);
                }
            }
            SyncEvent::IntersectionNotFound { tip } => {
                return Err(SyncError::IntersectionNotFound { tip })
            }
            SyncEvent::ProtocolError { code, message } => {
                return Err(SyncError::Protocol { code, message })
            }
            other => {
                return Err(SyncError::UnexpectedResponse(format!(
                    "{} before intersection",
                    other.name()
                )))
            }
        }

        // Phase 2: pipelined streaming
        self.set_state(SessionState::Streaming);
        let outstanding: Arc<Outstanding> = Arc::new(Mutex::new(VecDeque::new()));
        let permits = Arc::new(Semaphore::new(self.config.pipeline_depth));
        let mut writer = tokio::spawn(write_requests(
            transport.clone(),
            outstanding.clone(),
            permits.clone(),
            conn_cancel.clone(),
        ));

        let result = self
            .read_responses(transport.as_ref(), &outstanding, &permits, &mut writer)
            .await;
        conn_cancel.cancel();
        writer.abort();
        result
    }

    async fn read_responses(
        &mut self,
        transport: &C::Transport,
        outstanding: &Outstanding,
        permits: &Semaphore,
        writer: &mut JoinHandle<Result<()>>,
    ) -> Result<()> {
        let mut writer_done = false;

        loop {
            // Frames already received are processed before a writer failure.
            let raw = tokio::select! {
                biased;
                frame = self.next_frame(transport) => frame?,
                res = &mut *writer, if !writer_done => {
                    writer_done = true;
                    match res {
                        Ok(Ok(())) => continue,
                        Ok(Err(e)) => return Err(e),
                        Err(e) => return Err(SyncError::Task(e.to_string())),
                    }
                }
            };

            let decoded = decode_response(&raw)?;
            let expected = outstanding
                .lock()
                .map_err(|e| SyncError::Task(format!("lock poisoned: {e}")))?
                .pop_front()
                .ok_or_else(|| {
                    SyncError::UnexpectedResponse("response with no request in flight".into())
                })?;
            if let Some(id) = &decoded.id {
                if *id != expected {
                    return Err(SyncError::UnexpectedResponse(format!(
                        "expected id {expected}, got {id}"
                    )));
                }
            }

            match decoded.event {
                event @ (SyncEvent::RollForward { .. } | SyncEvent::RollBackward { .. }) => {
                    self.dispatch(event, raw).await?;
                }
                SyncEvent::ProtocolError { code, message } => {
                    return Err(SyncError::Protocol { code, message })
                }
                other => {
                    return Err(SyncError::UnexpectedResponse(format!(
                        "{} while streaming",
                        other.name()
                    )))
                }
            }
            permits.add_permits(1);
        }
    }

    /// Next frame from the node, bounded by the response timeout.
    async fn next_frame(&self, transport: &C::Transport) -> Result<Bytes> {
        let recv = async {
            match self.config.response_timeout {
                Some(limit) => tokio::time::timeout(limit, transport.recv())
                    .await
                    .map_err(|_| SyncError::Timeout(format!("no response within {limit:?}")))?,
                None => transport.recv().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SyncError::Cancelled),
            frame = recv => frame?
                .ok_or_else(|| SyncError::Transport("connection closed by node".into())),
        }
    }

    /// Run the handler for one event, then record and checkpoint it.
    async fn dispatch(&mut self, event: SyncEvent, raw: Bytes) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let checkpoint = match &event {
            SyncEvent::RollForward { block, tip } => {
                tracing::debug!(slot = block.slot, tip = tip.slot, "roll forward");
                event.point().map(Checkpoint::Save)
            }
            SyncEvent::RollBackward { point, tip } => {
                tracing::info!(point = %point, tip = tip.slot, "roll backward");
                Some(Checkpoint::Rollback(point.clone()))
            }
            _ => None,
        };
        let summary = Recorded::of(&event);

        let ctx = CallbackContext::new(self.cancel.clone(), raw);
        self.handler
            .handle(ctx, event)
            .await
            .map_err(SyncError::Callback)?;
        self.apply(summary);

        if self.config.save_checkpoints {
            match checkpoint {
                Some(Checkpoint::Save(point)) => self.store.save(&point).await?,
                Some(Checkpoint::Rollback(point)) => self.store.rollback(&point).await?,
                None => {}
            }
        }
        Ok(())
    }

    fn record(&mut self, event: &SyncEvent) {
        self.apply(Recorded::of(event));
    }

    fn apply(&mut self, recorded: Recorded) {
        if let Some(tip) = recorded.tip {
            self.report.tip = Some(tip);
        }
        let Some(point) = recorded.point else {
            return;
        };
        match recorded.kind {
            RecordedKind::Forward => self.report.blocks += 1,
            RecordedKind::Backward => {
                self.report.rollbacks += 1;
                self.rewind(&point);
            }
            RecordedKind::Intersection => {}
        }
        self.remember(point.clone());
        self.report.last_point = Some(point);
    }

    fn remember(&mut self, point: Point) {
        self.recent.retain(|p| p != &point);
        self.recent.push_front(point);
        self.recent.truncate(self.config.max_intersection_points);
    }

    /// Forget points the node just rolled back past.
    fn rewind(&mut self, to: &Point) {
        self.recent.retain(|p| !p.orphaned_by(to));
    }

    async fn resume_points(&self) -> Result<Vec<Point>> {
        if self.recent.is_empty() {
            initial_points(
                &self.store,
                &self.points,
                self.config.max_intersection_points,
            )
            .await
        } else {
            Ok(self.recent.iter().cloned().collect())
        }
    }
}

/// How a processed event reaches the checkpoint store.
enum Checkpoint {
    Save(Point),
    Rollback(Point),
}

enum RecordedKind {
    Forward,
    Backward,
    Intersection,
}

/// What the report keeps of an event once the handler owns it.
struct Recorded {
    kind: RecordedKind,
    point: Option<Point>,
    tip: Option<PointStruct>,
}

impl Recorded {
    fn of(event: &SyncEvent) -> Self {
        let kind = match event {
            SyncEvent::RollForward { .. } => RecordedKind::Forward,
            SyncEvent::RollBackward { .. } => RecordedKind::Backward,
            _ => RecordedKind::Intersection,
        };
        Self {
            kind,
            point: event.point(),
            tip: event.tip().cloned(),
        }
    }
}

/// Keep the pipeline full: one `nextBlock` per free permit.
///
/// Ids are queued before the request is sent so the reader always finds the
/// id of a response it receives.
async fn write_requests<T: Transport>(
    transport: Arc<T>,
    outstanding: Arc<Outstanding>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut next_id: u64 = 0;
    loop {
        let permit = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            permit = permits.acquire() => permit.map_err(|_| SyncError::Cancelled)?,
        };
        permit.forget();

        next_id += 1;
        let id = JsonValue::from(next_id);
        let frame = codec::next_block(id.clone()).to_json()?;
        outstanding
            .lock()
            .map_err(|e| SyncError::Task(format!("lock poisoned: {e}")))?
            .push_back(id);
        transport.send(frame).await?;
        tracing::trace!(id = next_id, "requested next block");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogmios_store::MemoryStore;

    fn at(slot: u64, hash: &str) -> Point {
        PointStruct::new(slot, hash).point()
    }

    #[tokio::test]
    async fn test_store_points_win() {
        let store = MemoryStore::with_points([at(456, "hash")]);
        let json = initial_request(&store, &[at(654, "hash")], 5).await.unwrap();
        assert_eq!(
            json,
            r#"{"id":{"step":"INIT"},"jsonrpc":"2.0","method":"findIntersection","params":{"points":[{"id":"hash","slot":456}]}}"#
        );
    }

    #[tokio::test]
    async fn test_explicit_points_when_store_empty() {
        let store = MemoryStore::new();
        let points = initial_points(&store, &[at(1, "a"), at(9, "b")], 5)
            .await
            .unwrap();
        assert_eq!(points, vec![at(9, "b"), at(1, "a")]);
    }

    #[tokio::test]
    async fn test_rollback_target_offered_on_resume() {
        let store = MemoryStore::new();
        for slot in 101..=105 {
            store.save(&at(slot, "aa")).await.unwrap();
        }
        store.rollback(&at(100, "bb")).await.unwrap();

        let points = initial_points(&store, &[], 5).await.unwrap();
        assert_eq!(points, vec![at(100, "bb")]);
    }

    #[tokio::test]
    async fn test_origin_fallback() {
        let store = MemoryStore::new();
        let points = initial_points(&store, &[], 5).await.unwrap();
        assert_eq!(points, vec![Point::origin()]);
    }

    #[tokio::test]
    async fn test_points_capped() {
        let store = MemoryStore::new();
        let explicit: Vec<Point> = (1..=8).map(|s| at(s, "h")).collect();
        let points = initial_points(&store, &explicit, 3).await.unwrap();
        assert_eq!(points, vec![at(8, "h"), at(7, "h"), at(6, "h")]);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let (connector, _acceptor) = crate::memory::connector();
        let config = SessionConfig {
            pipeline_depth: 0,
            ..SessionConfig::default()
        };
        let handler = crate::handler_fn(|_, _| async { Ok(()) });
        let result = ChainSync::new(connector, MemoryStore::new(), handler)
            .with_config(config)
            .start();
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::AwaitingIntersection.to_string(), "awaiting-intersection");
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Streaming.is_terminal());
    }
}
