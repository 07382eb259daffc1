//! Publishes one sample portfolio report event.
//!
//! Handy for exercising a running worker end to end:
//!
//! ```bash
//! RABBITMQ_HOST=localhost cargo run --bin publish-sample-report
//! ```

use tracing::info;
use tracing_subscriber::EnvFilter;

use report_export_amqp::{declare_topology, publish_envelope, BrokerConnection, QueueBinding};
use report_export_core::events::{portfolio_report_envelope, sample_portfolios, PORTFOLIO_REPORT};
use report_export_service::config::ServiceConfig;
use report_export_service::{INVESTMENT_EXCHANGE, PORTFOLIO_REPORT_QUEUE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::from_env();
    let (connection, _closed) = BrokerConnection::connect(&config.broker).await?;

    // Declare the same topology the worker depends on, so publishing works
    // even if the worker has never run against this broker.
    let bindings = vec![QueueBinding::new(
        PORTFOLIO_REPORT_QUEUE,
        &[PORTFOLIO_REPORT],
    )];
    declare_topology(connection.channel(), INVESTMENT_EXCHANGE, &bindings).await?;

    let envelope = portfolio_report_envelope(sample_portfolios())?;
    publish_envelope(
        connection.channel(),
        INVESTMENT_EXCHANGE,
        PORTFOLIO_REPORT,
        &envelope,
    )
    .await?;

    info!("sample portfolio report published");
    connection.close().await;
    Ok(())
}
