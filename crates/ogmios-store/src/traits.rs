//! The checkpoint store interface consumed by chain-sync sessions.

use std::sync::Arc;

use async_trait::async_trait;
use ogmios_core::Point;

use crate::error::Result;

/// Where a session reads resume points from and records progress to.
///
/// # Contract
///
/// - `load` returns points most recently confirmed first. An empty result is
///   legal and means "start from origin".
/// - Each `save` is independent. Saving the same point twice is harmless.
/// - `rollback` makes its point the newest one held: stored points it
///   orphans (see [`Point::orphaned_by`]) are discarded.
/// - A session never calls one store concurrently with itself, so
///   implementations need not be re-entrant across `load`/`save`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Candidate resume points, most recent first.
    async fn load(&self) -> Result<Vec<Point>>;

    /// Record a point the consumer has finished processing.
    async fn save(&self, point: &Point) -> Result<()>;

    /// Record a rollback target, discarding the points it orphans.
    ///
    /// Defaults to a plain `save`. Stores that keep more than one point
    /// should override it, or a restart after a deep rollback may offer only
    /// orphaned points.
    async fn rollback(&self, point: &Point) -> Result<()> {
        self.save(point).await
    }
}

#[async_trait]
impl<S: CheckpointStore + ?Sized> CheckpointStore for Arc<S> {
    async fn load(&self) -> Result<Vec<Point>> {
        (**self).load().await
    }

    async fn save(&self, point: &Point) -> Result<()> {
        (**self).save(point).await
    }

    async fn rollback(&self, point: &Point) -> Result<()> {
        (**self).rollback(point).await
    }
}

#[async_trait]
impl<S: CheckpointStore + ?Sized> CheckpointStore for Box<S> {
    async fn load(&self) -> Result<Vec<Point>> {
        (**self).load().await
    }

    async fn save(&self, point: &Point) -> Result<()> {
        (**self).save(point).await
    }

    async fn rollback(&self, point: &Point) -> Result<()> {
        (**self).rollback(point).await
    }
}
