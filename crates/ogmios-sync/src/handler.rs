//! The event callback contract.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ogmios_core::SyncEvent;
use tokio_util::sync::CancellationToken;

/// What a handler gets alongside each event.
#[derive(Debug, Clone)]
pub struct CallbackContext {
    cancel: CancellationToken,
    raw: Bytes,
}

impl CallbackContext {
    pub fn new(cancel: CancellationToken, raw: Bytes) -> Self {
        Self { cancel, raw }
    }

    /// The frame the event was decoded from, as the node sent it.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn raw_bytes(&self) -> Bytes {
        self.raw.clone()
    }

    /// Cancelled once the session starts closing.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Consumes sync events, one at a time, in chain order.
///
/// Returning an error ends the session; the event is not retried.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, ctx: CallbackContext, event: SyncEvent) -> anyhow::Result<()>;
}

#[async_trait]
impl<H: EventHandler + ?Sized> EventHandler for Arc<H> {
    async fn handle(&self, ctx: CallbackContext, event: SyncEvent) -> anyhow::Result<()> {
        (**self).handle(ctx, event).await
    }
}

/// Handler built from a closure. See [`handler_fn`].
pub struct FnHandler<F>(F);

/// Wrap an async closure as an [`EventHandler`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(CallbackContext, SyncEvent) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(CallbackContext, SyncEvent) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, ctx: CallbackContext, event: SyncEvent) -> anyhow::Result<()> {
        (self.0)(ctx, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_handler_fn() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let handler = handler_fn(move |ctx: CallbackContext, _event| {
            let counter = counter.clone();
            async move {
                assert_eq!(ctx.raw(), b"{}");
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let ctx = CallbackContext::new(CancellationToken::new(), Bytes::from_static(b"{}"));
        let event = SyncEvent::ProtocolError {
            code: 1,
            message: "x".into(),
        };
        handler.handle(ctx.clone(), event.clone()).await.unwrap();
        Arc::new(handler).handle(ctx, event).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
