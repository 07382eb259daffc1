//! End-to-end flow without a broker: encode → decode → dispatch → collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use report_export_core::envelope::EventEnvelope;
use report_export_core::events::{portfolio_report_envelope, sample_portfolios, PORTFOLIO_REPORT};
use report_export_core::handler::HandlerRegistry;
use report_export_service::portfolio::PortfolioReportHandler;
use report_export_testing::{FailingHandler, MockRenderer, MockStore};

#[tokio::test]
async fn one_envelope_renders_once_and_records_per_portfolio() {
    let renderer = MockRenderer::new("/tmp/portfolio_report_test.txt");
    let store = MockStore::new();

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(PortfolioReportHandler::new(
        Some(renderer.clone()),
        Some(store.clone()),
    )));

    // Publisher side: wrap three sample portfolios in one envelope.
    let portfolios = sample_portfolios();
    let wire = portfolio_report_envelope(portfolios.clone())
        .unwrap()
        .encode()
        .unwrap();

    // Consumer side: decode and dispatch.
    let envelope = EventEnvelope::decode(&wire).unwrap();
    registry
        .dispatch(CancellationToken::new(), envelope)
        .await
        .unwrap();

    // Exactly one renderer invocation, with all records in original order.
    let invocations = renderer.invocations().await;
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0], portfolios);

    // Exactly one store write per record, with that record's user id.
    let records = store.records().await;
    assert_eq!(
        records,
        vec![
            ("user123".to_string(), PORTFOLIO_REPORT.to_string()),
            ("user456".to_string(), PORTFOLIO_REPORT.to_string()),
            ("user123".to_string(), PORTFOLIO_REPORT.to_string()),
        ]
    );
}

#[tokio::test]
async fn unmatched_event_type_invokes_no_collaborator() {
    let renderer = MockRenderer::new("/tmp/unused.txt");
    let store = MockStore::new();

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(PortfolioReportHandler::new(
        Some(renderer.clone()),
        Some(store.clone()),
    )));

    let envelope = EventEnvelope::new("unrelated.event", &serde_json::json!({})).unwrap();
    registry
        .dispatch(CancellationToken::new(), envelope)
        .await
        .unwrap();

    assert!(renderer.invocations().await.is_empty());
    assert!(store.records().await.is_empty());
}

#[tokio::test]
async fn handler_error_propagates_out_of_dispatch() {
    let mut registry = HandlerRegistry::new();
    registry.register(FailingHandler::new(PORTFOLIO_REPORT, "store is down"));

    let envelope = portfolio_report_envelope(sample_portfolios()).unwrap();
    let err = registry
        .dispatch(CancellationToken::new(), envelope)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("store is down"));
}
