//! # Report Export Testing
//!
//! Test doubles for the report export worker:
//!
//! - [`RecordingHandler`]: captures every envelope it receives
//! - [`FailingHandler`]: always fails, for requeue-path tests
//! - [`MockRenderer`]: captures renderer invocations and returns a fixed path
//! - [`MockStore`]: captures report store writes
//!
//! All doubles record through a `tokio::sync::Mutex` so assertions can be made
//! from the test task after dispatch completes.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use report_export_core::envelope::EventEnvelope;
use report_export_core::events::Portfolio;
use report_export_core::handler::EventHandler;
use report_export_core::report::{RenderError, ReportRenderer, ReportStore, StoreError};

/// Handler that records every envelope it is dispatched.
pub struct RecordingHandler {
    event_type: String,
    seen: Mutex<Vec<EventEnvelope>>,
}

impl RecordingHandler {
    /// Create a recording handler for the given event type.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            event_type: event_type.into(),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Envelopes received so far, in dispatch order.
    pub async fn seen(&self) -> Vec<EventEnvelope> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    async fn handle(
        &self,
        _shutdown: CancellationToken,
        envelope: EventEnvelope,
    ) -> anyhow::Result<()> {
        self.seen.lock().await.push(envelope);
        Ok(())
    }
}

/// Handler that always returns an error.
pub struct FailingHandler {
    event_type: String,
    message: String,
}

impl FailingHandler {
    /// Create a handler that fails with the given message.
    #[must_use]
    pub fn new(event_type: impl Into<String>, message: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            event_type: event_type.into(),
            message: message.into(),
        })
    }
}

#[async_trait]
impl EventHandler for FailingHandler {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    async fn handle(
        &self,
        _shutdown: CancellationToken,
        _envelope: EventEnvelope,
    ) -> anyhow::Result<()> {
        Err(anyhow::anyhow!(self.message.clone()))
    }
}

/// Renderer double that captures invocations and returns a fixed path.
pub struct MockRenderer {
    path: PathBuf,
    invocations: Mutex<Vec<Vec<Portfolio>>>,
}

impl MockRenderer {
    /// Create a renderer double answering with the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            path: path.into(),
            invocations: Mutex::new(Vec::new()),
        })
    }

    /// Renderer invocations so far; each entry is the portfolio slice of one call.
    pub async fn invocations(&self) -> Vec<Vec<Portfolio>> {
        self.invocations.lock().await.clone()
    }
}

#[async_trait]
impl ReportRenderer for MockRenderer {
    async fn render_portfolio_report(
        &self,
        portfolios: &[Portfolio],
    ) -> Result<PathBuf, RenderError> {
        self.invocations.lock().await.push(portfolios.to_vec());
        Ok(self.path.clone())
    }
}

/// Store double that captures `(user_id, event_type)` writes.
#[derive(Default)]
pub struct MockStore {
    records: Mutex<Vec<(String, String)>>,
}

impl MockStore {
    /// Create an empty store double.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records written so far, in write order.
    pub async fn records(&self) -> Vec<(String, String)> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ReportStore for MockStore {
    async fn record(&self, user_id: &str, event_type: &str) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .push((user_id.to_string(), event_type.to_string()));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_handler_captures_envelopes_in_order() {
        let handler = RecordingHandler::new("test.event");
        for i in 0..3 {
            let envelope =
                EventEnvelope::new("test.event", &serde_json::json!({ "i": i })).unwrap();
            handler
                .handle(CancellationToken::new(), envelope)
                .await
                .unwrap();
        }

        let seen = handler.seen().await;
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].payload["i"], 2);
    }

    #[tokio::test]
    async fn failing_handler_carries_its_message() {
        let handler = FailingHandler::new("test.event", "boom");
        let envelope = EventEnvelope::new("test.event", &serde_json::json!({})).unwrap();

        let err = handler
            .handle(CancellationToken::new(), envelope)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
