//! Route handlers
//!
//! Consumers (emotion visualizer, music player, session UI) register a
//! [`RouteHandler`] per [`MessageKind`](crate::core::envelope::MessageKind)
//! on the client's route table. Every handler registered for a kind sees every
//! envelope of that kind; a failing handler never stops its siblings.

use crate::core::envelope::Envelope;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Consumer of dispatched envelopes
///
/// Invocation is at-least-once and only same-kind, same-priority ordering is
/// guaranteed. Errors are logged by the dispatcher; panics are caught.
#[async_trait]
pub trait RouteHandler: Send + Sync + 'static {
    async fn handle(&self, envelope: &Envelope) -> Result<()>;
}

/// Adapter turning a closure into a [`RouteHandler`]
pub struct FnHandler<F>(F);

#[async_trait]
impl<F> RouteHandler for FnHandler<F>
where
    F: Fn(&Envelope) -> Result<()> + Send + Sync + 'static,
{
    async fn handle(&self, envelope: &Envelope) -> Result<()> {
        (self.0)(envelope)
    }
}

/// Wrap a closure as a shareable handler
///
/// Keep the returned `Arc` to remove the route later; removal is by identity.
pub fn handler_fn<F>(f: F) -> Arc<dyn RouteHandler>
where
    F: Fn(&Envelope) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}
