//! Route table
//!
//! Maps a [`MessageKind`] to the handlers registered for it, highest route
//! priority first. Dispatch hands the envelope to all of them:
//!
//! ```text
//! frame → Envelope::decode → RouteTable::dispatch ─┬─> handler (prio 10)
//!                                                  ├─> handler (prio 5)
//!                                                  └─> handler (prio 5, added later)
//! ```
//!
//! Handlers are awaited together and isolated from each other: an `Err` or a
//! panic in one is logged and does not reach its siblings or the caller.

use crate::core::envelope::{Envelope, MessageKind};
use crate::traits::RouteHandler;
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, warn};

struct RouteEntry {
    handler: Arc<dyn RouteHandler>,
    priority: i32,
}

/// Outcome of dispatching one envelope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that returned `Ok`
    pub delivered: usize,
    /// Handlers that returned `Err` or panicked
    pub failed: usize,
}

impl DispatchReport {
    pub fn is_unrouted(&self) -> bool {
        self.delivered == 0 && self.failed == 0
    }
}

#[derive(Default)]
pub struct RouteTable {
    routes: RwLock<HashMap<MessageKind, Vec<RouteEntry>>>,
}

fn same_handler(a: &Arc<dyn RouteHandler>, b: &Arc<dyn RouteHandler>) -> bool {
    // Compare data pointers only; vtable pointers may differ per codegen unit
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`
    ///
    /// Equal priorities keep registration order.
    pub fn add_route(&self, kind: MessageKind, handler: Arc<dyn RouteHandler>, priority: i32) {
        let mut routes = self.routes.write();
        let entries = routes.entry(kind).or_default();
        entries.push(RouteEntry { handler, priority });
        entries.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Remove `handler` from `kind`; the kind disappears with its last handler
    pub fn remove_route(&self, kind: MessageKind, handler: &Arc<dyn RouteHandler>) -> bool {
        let mut routes = self.routes.write();
        let Some(entries) = routes.get_mut(&kind) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|entry| !same_handler(&entry.handler, handler));
        let removed = entries.len() != before;

        if entries.is_empty() {
            routes.remove(&kind);
        }
        removed
    }

    /// Snapshot of the handlers for `kind`, in dispatch order
    pub fn handlers(&self, kind: MessageKind) -> Vec<Arc<dyn RouteHandler>> {
        self.routes
            .read()
            .get(&kind)
            .map(|entries| entries.iter().map(|e| Arc::clone(&e.handler)).collect())
            .unwrap_or_default()
    }

    pub fn has_routes(&self, kind: MessageKind) -> bool {
        self.routes.read().contains_key(&kind)
    }

    pub fn route_count(&self, kind: MessageKind) -> usize {
        self.routes.read().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `envelope` to every handler of its kind
    pub async fn dispatch(&self, envelope: &Envelope) -> DispatchReport {
        let kind = envelope.kind();
        let handlers = self.handlers(kind);

        if handlers.is_empty() {
            warn!("No route registered for message type '{}', dropping", kind);
            return DispatchReport::default();
        }

        let results = join_all(
            handlers
                .iter()
                .map(|handler| AssertUnwindSafe(handler.handle(envelope)).catch_unwind()),
        )
        .await;

        let mut report = DispatchReport::default();
        for result in results {
            match result {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    error!("Route handler for '{}' failed: {}", kind, e);
                }
                Err(_) => {
                    report.failed += 1;
                    error!("Route handler for '{}' panicked", kind);
                }
            }
        }
        report
    }
}
