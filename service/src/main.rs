//! Report export worker entry point.
//!
//! Wires the pieces together: configuration from the environment, the report
//! store and renderer, the handler registry, and the supervised AMQP consume
//! pipeline. SIGINT/SIGTERM cancel the shared token; the supervisor returns
//! the live pipeline and the final close happens here.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use report_export_amqp::{ConsumerPipeline, QueueBinding, ReconnectPolicy, Supervisor};
use report_export_core::events::PORTFOLIO_REPORT;
use report_export_core::handler::HandlerRegistry;
use report_export_core::report::{ReportRenderer, ReportStore};
use report_export_service::config::ServiceConfig;
use report_export_service::portfolio::PortfolioReportHandler;
use report_export_service::render::FileReportRenderer;
use report_export_service::store::PgReportStore;
use report_export_service::{INVESTMENT_EXCHANGE, PORTFOLIO_REPORT_QUEUE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("starting report export service");
    let config = ServiceConfig::from_env();

    // The report store is part of the worker's contract; failing to reach the
    // database aborts startup.
    let store = PgReportStore::connect(&config.database_url()).await?;
    store.ensure_schema().await?;
    let store: Arc<dyn ReportStore> = Arc::new(store);

    // The renderer is best-effort; without it, reports are skipped.
    let renderer: Option<Arc<dyn ReportRenderer>> =
        match FileReportRenderer::new(&config.report_dir) {
            Ok(renderer) => {
                info!(dir = %config.report_dir, "report renderer initialized");
                Some(Arc::new(renderer))
            }
            Err(e) => {
                warn!(error = %e, "failed to initialize report renderer, reports will not be generated");
                None
            }
        };

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(PortfolioReportHandler::new(
        renderer,
        Some(store),
    )));
    let registry = Arc::new(registry);
    info!("event handlers registered");

    let bindings = vec![QueueBinding::new(
        PORTFOLIO_REPORT_QUEUE,
        &[PORTFOLIO_REPORT],
    )];

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        signal_token.cancel();
    });

    let pipeline = ConsumerPipeline::new(
        config.broker.clone(),
        INVESTMENT_EXCHANGE,
        bindings,
        registry,
    );

    // Startup failures are fatal; only established connections are supervised.
    let running = pipeline.start(&shutdown).await?;
    info!("service started successfully");

    let mut supervisor = Supervisor::new(pipeline, ReconnectPolicy::default());
    match supervisor.run(running, shutdown).await {
        Ok(Some(running)) => running.shutdown().await,
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "broker connection is gone for good");
            return Err(e.into());
        }
    }

    info!("service shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
