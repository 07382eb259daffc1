//! Seams for the external report collaborators.
//!
//! The report renderer and the report store are external to the
//! consumption-and-dispatch core. Handlers talk to them through these two
//! narrow traits so they can be substituted with test doubles; the real
//! implementations live in the service binary.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::events::Portfolio;

/// Errors from the report renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The report file could not be written.
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the report store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing database failed.
    #[error("database error: {0}")]
    Database(String),
}

/// Turns a set of portfolio records into a report document on disk.
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    /// Render one report containing all given portfolios, in order.
    ///
    /// Returns the path of the generated document.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if the document cannot be produced.
    async fn render_portfolio_report(
        &self,
        portfolios: &[Portfolio],
    ) -> Result<PathBuf, RenderError>;
}

/// Persists one report record per user and event type.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Record that a report of `event_type` was produced for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the record cannot be persisted.
    async fn record(&self, user_id: &str, event_type: &str) -> Result<(), StoreError>;
}
