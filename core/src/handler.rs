//! Handler contract and type-based envelope routing.
//!
//! A handler declares the single event type it processes; the
//! [`HandlerRegistry`] maps event types to handler instances and dispatches
//! each decoded envelope to at most one of them.
//!
//! The registry is plain data: it is populated during startup and then moved
//! behind an `Arc`, after which it is read concurrently by every consumer
//! worker. There is no interior mutability, so post-init mutation is
//! impossible by construction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::envelope::EventEnvelope;

/// An event handler bound to a single event type.
///
/// `handle` receives the process shutdown token; long-running handlers are
/// expected to observe it cooperatively at their await points. A handler is
/// never invoked concurrently for the same delivery: one delivery, one call,
/// one acknowledgment decision.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// The event type this handler processes.
    fn event_type(&self) -> &str;

    /// Process one envelope. An error causes the delivery to be negatively
    /// acknowledged and requeued by the broker.
    async fn handle(
        &self,
        shutdown: CancellationToken,
        envelope: EventEnvelope,
    ) -> anyhow::Result<()>;
}

/// Maps event type identifiers to handler instances.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its event type.
    ///
    /// A later registration for the same event type silently replaces the
    /// earlier one.
    pub fn register(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers
            .insert(handler.event_type().to_string(), handler);
    }

    /// Look up the handler for an event type, if any.
    #[must_use]
    pub fn lookup(&self, event_type: &str) -> Option<&Arc<dyn EventHandler>> {
        self.handlers.get(event_type)
    }

    /// Route an envelope to the handler registered for its event type.
    ///
    /// An envelope whose event type has no registered handler is dropped with
    /// a warning and `Ok(())`; only the broker topology decides which event
    /// types reach this process, and not all of them need handling.
    ///
    /// # Errors
    ///
    /// Propagates the handler's error verbatim.
    pub async fn dispatch(
        &self,
        shutdown: CancellationToken,
        envelope: EventEnvelope,
    ) -> anyhow::Result<()> {
        let Some(handler) = self.lookup(&envelope.event_type) else {
            warn!(
                event_type = %envelope.event_type,
                "no handler registered for event type, dropping event"
            );
            return Ok(());
        };

        handler.handle(shutdown, envelope).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        event_type: &'static str,
        calls: AtomicUsize,
        fail_with: Option<&'static str>,
    }

    impl CountingHandler {
        fn new(event_type: &'static str) -> Arc<Self> {
            Arc::new(Self {
                event_type,
                calls: AtomicUsize::new(0),
                fail_with: None,
            })
        }

        fn failing(event_type: &'static str, message: &'static str) -> Arc<Self> {
            Arc::new(Self {
                event_type,
                calls: AtomicUsize::new(0),
                fail_with: Some(message),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        fn event_type(&self) -> &str {
            self.event_type
        }

        async fn handle(
            &self,
            _shutdown: CancellationToken,
            _envelope: EventEnvelope,
        ) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(message) => Err(anyhow::anyhow!(message)),
                None => Ok(()),
            }
        }
    }

    fn envelope(event_type: &str) -> EventEnvelope {
        EventEnvelope::new(event_type, &serde_json::json!({})).unwrap()
    }

    #[tokio::test]
    async fn dispatch_routes_to_the_matching_handler_only() {
        let reports = CountingHandler::new("portfolio.report");
        let orders = CountingHandler::new("order.created");

        let mut registry = HandlerRegistry::new();
        registry.register(reports.clone());
        registry.register(orders.clone());

        registry
            .dispatch(CancellationToken::new(), envelope("portfolio.report"))
            .await
            .unwrap();

        assert_eq!(reports.calls(), 1);
        assert_eq!(orders.calls(), 0);
    }

    #[tokio::test]
    async fn dispatch_without_a_handler_is_a_silent_drop() {
        let registry = HandlerRegistry::new();

        let result = registry
            .dispatch(CancellationToken::new(), envelope("nobody.cares"))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn dispatch_propagates_handler_errors() {
        let handler = CountingHandler::failing("portfolio.report", "renderer exploded");
        let mut registry = HandlerRegistry::new();
        registry.register(handler);

        let err = registry
            .dispatch(CancellationToken::new(), envelope("portfolio.report"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("renderer exploded"));
    }

    #[tokio::test]
    async fn later_registration_replaces_earlier_one() {
        let first = CountingHandler::new("portfolio.report");
        let second = CountingHandler::new("portfolio.report");

        let mut registry = HandlerRegistry::new();
        registry.register(first.clone());
        registry.register(second.clone());

        registry
            .dispatch(CancellationToken::new(), envelope("portfolio.report"))
            .await
            .unwrap();

        assert_eq!(first.calls(), 0);
        assert_eq!(second.calls(), 1);
    }
}
