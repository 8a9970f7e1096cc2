//! Session configuration.

use std::time::Duration;

use rand::Rng;

use crate::error::{Result, SyncError};

/// Configuration for a chain-sync session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum `nextBlock` requests in flight.
    pub pipeline_depth: usize,
    /// Maximum points sent with `findIntersection`.
    pub max_intersection_points: usize,
    /// Give up on a connection after this long without a frame.
    pub response_timeout: Option<Duration>,
    /// Deliver the initial `IntersectionFound` to the handler.
    pub notify_intersection: bool,
    /// Save each processed point to the checkpoint store.
    pub save_checkpoints: bool,
    pub reconnect: ReconnectConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pipeline_depth: 50,
            max_intersection_points: 5,
            response_timeout: None,
            notify_intersection: true,
            save_checkpoints: true,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pipeline_depth == 0 {
            return Err(SyncError::Config("pipeline_depth must be at least 1".into()));
        }
        if self.max_intersection_points == 0 {
            return Err(SyncError::Config(
                "max_intersection_points must be at least 1".into(),
            ));
        }
        self.reconnect.validate()
    }
}

/// Reconnect policy for transport failures.
///
/// Only [`SyncError::is_retryable`] errors trigger a reconnect. Backoff
/// doubles from `initial_backoff` up to `max_backoff`.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub enabled: bool,
    /// `None` retries forever.
    pub max_retries: Option<u32>,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Add up to a quarter of the delay at random.
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: None,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl ReconnectConfig {
    /// Fail on the first transport error.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.initial_backoff > self.max_backoff {
            return Err(SyncError::Config(
                "initial_backoff exceeds max_backoff".into(),
            ));
        }
        Ok(())
    }

    /// Whether retry number `attempt` (1-based) is allowed.
    pub fn allows(&self, attempt: u32) -> bool {
        self.enabled && self.max_retries.map_or(true, |max| attempt <= max)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let base = self
            .initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff);
        if !self.jitter {
            return base;
        }
        let spread = (base.as_millis() / 4) as u64;
        if spread == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }
}
