//! A scripted node behind the in-memory transport.
//!
//! ```rust,ignore
//! let (connector, mut node) = scripted();
//! let session = ChainSync::new(connector, store, handler).start()?;
//!
//! let conn = node.accept().await.unwrap();
//! conn.serve(&chain.point(1), &chain.tip(), steps).await;
//! ```

use ogmios_core::codec::{FindIntersectionParams, Request};
use ogmios_core::{Block, Method, Point, PointStruct};
use ogmios_sync::memory::{self, MemoryAcceptor, MemoryConnector, NodeConnection};
use serde_json::Value as JsonValue;

use crate::fixtures::{self, Generation};

/// Create a connector for a session and the node that answers it.
pub fn scripted() -> (MemoryConnector, ScriptedNode) {
    let (connector, acceptor) = memory::connector();
    (connector, ScriptedNode { acceptor })
}

pub struct ScriptedNode {
    acceptor: MemoryAcceptor,
}

impl ScriptedNode {
    /// Wait for the session's next connection.
    pub async fn accept(&mut self) -> Option<NodeSession> {
        self.acceptor.accept().await.map(|conn| NodeSession {
            conn,
            generation: Generation::Current,
        })
    }
}

/// One scripted reply to a `nextBlock`.
#[derive(Debug, Clone)]
pub enum Step {
    Forward(Block),
    Backward(Point),
    Error { code: i64, message: String },
    /// Reply with this frame verbatim.
    Raw(String),
    /// Drop the connection instead of replying.
    Disconnect,
}

/// What the node saw while serving.
#[derive(Debug, Default)]
pub struct Served {
    /// Resume points of every `findIntersection`.
    pub intersections: Vec<Vec<Point>>,
    /// Ids of every `nextBlock`, in arrival order.
    pub next_ids: Vec<JsonValue>,
}

pub struct NodeSession {
    conn: NodeConnection,
    generation: Generation,
}

impl NodeSession {
    /// Answer in the legacy wire generation.
    pub fn legacy(mut self) -> Self {
        self.generation = Generation::Legacy;
        self
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Next request, or `None` once the client has gone.
    pub async fn next_request(&mut self) -> Option<Request> {
        let frame = self.conn.recv().await?;
        serde_json::from_str(&frame).ok()
    }

    /// Read a `findIntersection` and return its points.
    pub async fn expect_find_intersection(&mut self) -> Option<Vec<Point>> {
        let request = self.next_request().await?;
        if request.method != Method::FindIntersection {
            return None;
        }
        let params: FindIntersectionParams = serde_json::from_value(request.params?).ok()?;
        Some(params.points)
    }

    pub async fn send(&self, frame: String) -> bool {
        self.conn.send(frame).await
    }

    pub async fn intersect(&self, point: &Point, tip: &PointStruct) -> bool {
        self.send(fixtures::intersection_found(self.generation, point, tip))
            .await
    }

    pub async fn reject_intersection(&self, tip: &PointStruct) -> bool {
        self.send(fixtures::intersection_not_found(self.generation, tip))
            .await
    }

    /// Answer requests until the script runs out, then keep reading until
    /// the client leaves. `findIntersection` is answered with `intersection`.
    pub async fn serve(
        mut self,
        intersection: &Point,
        tip: &PointStruct,
        steps: impl IntoIterator<Item = Step>,
    ) -> Served {
        let mut steps = steps.into_iter();
        let mut served = Served::default();

        while let Some(request) = self.next_request().await {
            let id = request.id.clone().unwrap_or(JsonValue::Null);
            match request.method {
                Method::FindIntersection => {
                    let points = request
                        .params
                        .and_then(|p| serde_json::from_value::<FindIntersectionParams>(p).ok())
                        .map(|p| p.points)
                        .unwrap_or_default();
                    served.intersections.push(points);
                    self.intersect(intersection, tip).await;
                }
                Method::NextBlock => {
                    served.next_ids.push(id.clone());
                    let frame = match steps.next() {
                        Some(Step::Forward(block)) => {
                            fixtures::roll_forward(self.generation, &block, tip, id)
                        }
                        Some(Step::Backward(point)) => {
                            fixtures::roll_backward(self.generation, &point, tip, id)
                        }
                        Some(Step::Error { code, message }) => fixtures::protocol_error(
                            self.generation,
                            Method::NextBlock,
                            code,
                            &message,
                            id,
                        ),
                        Some(Step::Raw(frame)) => frame,
                        Some(Step::Disconnect) => return served,
                        None => continue,
                    };
                    self.send(frame).await;
                }
            }
        }
        served
    }
}
