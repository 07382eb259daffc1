//! The `portfolio.report` event handler.
//!
//! Decodes the portfolio payload, renders one report document covering all
//! portfolios in order, and records one report row per portfolio. Renderer
//! and store failures are logged but do not fail the delivery: the report is
//! best-effort, and redelivering the message would not make a broken
//! collaborator healthier. A payload that does not decode is a handler error
//! and triggers requeue.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use report_export_core::envelope::EventEnvelope;
use report_export_core::events::{self, PortfolioReportPayload};
use report_export_core::handler::EventHandler;
use report_export_core::report::{ReportRenderer, ReportStore};

/// Handles `portfolio.report` events.
pub struct PortfolioReportHandler {
    renderer: Option<Arc<dyn ReportRenderer>>,
    store: Option<Arc<dyn ReportStore>>,
}

impl PortfolioReportHandler {
    /// Build the handler. Either collaborator may be absent, in which case
    /// its step is skipped with a log line.
    #[must_use]
    pub fn new(
        renderer: Option<Arc<dyn ReportRenderer>>,
        store: Option<Arc<dyn ReportStore>>,
    ) -> Self {
        Self { renderer, store }
    }
}

#[async_trait]
impl EventHandler for PortfolioReportHandler {
    fn event_type(&self) -> &str {
        events::PORTFOLIO_REPORT
    }

    async fn handle(
        &self,
        _shutdown: CancellationToken,
        envelope: EventEnvelope,
    ) -> anyhow::Result<()> {
        let payload: PortfolioReportPayload = envelope.decode_payload()?;

        info!(
            portfolios = payload.portfolios.len(),
            "processing portfolio report event"
        );
        for portfolio in &payload.portfolios {
            debug!(
                port_id = portfolio.port_id,
                name = %portfolio.name,
                user_id = %portfolio.user_id,
                created_at = %portfolio.created_at,
                last_update = %portfolio.last_update,
                "portfolio details"
            );
        }

        if let Some(renderer) = &self.renderer {
            match renderer.render_portfolio_report(&payload.portfolios).await {
                Ok(path) => info!(path = %path.display(), "report generated"),
                Err(e) => error!(error = %e, "failed to generate report"),
            }
        } else {
            info!("report renderer not available, skipping report generation");
        }

        if let Some(store) = &self.store {
            for portfolio in &payload.portfolios {
                if let Err(e) = store
                    .record(&portfolio.user_id, &envelope.event_type)
                    .await
                {
                    error!(
                        user_id = %portfolio.user_id,
                        error = %e,
                        "failed to save report record"
                    );
                }
            }
        }

        info!(
            portfolios = payload.portfolios.len(),
            "portfolio report processing completed"
        );
        Ok(())
    }
}
