//! A store that only logs.
//!
//! Every session starts from the caller's points (or origin), and each save
//! is written to the `tracing` log. Useful for tailing the chain without
//! keeping state.

use async_trait::async_trait;
use ogmios_core::Point;
use tracing::{debug, info};

use crate::error::Result;
use crate::traits::CheckpointStore;

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingStore;

impl LoggingStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CheckpointStore for LoggingStore {
    async fn load(&self) -> Result<Vec<Point>> {
        debug!("logging store holds no checkpoints");
        Ok(Vec::new())
    }

    async fn save(&self, point: &Point) -> Result<()> {
        info!(point = %point, "checkpoint");
        Ok(())
    }

    async fn rollback(&self, point: &Point) -> Result<()> {
        info!(point = %point, "rollback checkpoint");
        Ok(())
    }
}
