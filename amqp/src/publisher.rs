//! Outbound envelope publishing.
//!
//! Publishing shares the connection's single channel with consumption; the
//! lapin channel serializes frame writes internally, so acks and publishes
//! may interleave safely.

use chrono::Utc;
use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel};
use tracing::info;

use report_export_core::envelope::EventEnvelope;

use crate::error::AmqpError;

/// Publish one envelope to the exchange under a routing key.
///
/// The message is sent as `application/json` with a broker-level timestamp.
///
/// # Errors
///
/// Returns [`AmqpError::Publish`] if encoding or publishing fails.
pub async fn publish_envelope(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    envelope: &EventEnvelope,
) -> Result<(), AmqpError> {
    let body = envelope.encode().map_err(|e| AmqpError::Publish {
        exchange: exchange.to_string(),
        reason: e.to_string(),
    })?;

    let properties = BasicProperties::default()
        .with_content_type("application/json".into())
        .with_timestamp(u64::try_from(Utc::now().timestamp()).unwrap_or(0));

    channel
        .basic_publish(
            exchange,
            routing_key,
            BasicPublishOptions::default(),
            &body,
            properties,
        )
        .await
        .map_err(|e| AmqpError::Publish {
            exchange: exchange.to_string(),
            reason: e.to_string(),
        })?
        .await
        .map_err(|e| AmqpError::Publish {
            exchange: exchange.to_string(),
            reason: e.to_string(),
        })?;

    info!(
        event_type = %envelope.event_type,
        routing_key = %routing_key,
        "event published to exchange"
    );
    Ok(())
}
