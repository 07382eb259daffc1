//! Exchange, queue and binding declaration.
//!
//! The worker declares the topology it depends on at every (re)connect.
//! Broker declare semantics make this idempotent: re-declaring identical
//! topology is a no-op, conflicting topology is an error. There is no
//! rollback of declarations that succeeded before a failure.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, ExchangeKind};
use tracing::info;

use crate::error::AmqpError;

/// Static mapping of a queue name to its routing-key patterns.
///
/// Read once at topology setup and again when consumers start; immutable for
/// the process lifetime.
#[derive(Debug, Clone)]
pub struct QueueBinding {
    /// Queue name.
    pub queue: String,
    /// Routing keys binding the queue to the exchange.
    pub routing_keys: Vec<String>,
}

impl QueueBinding {
    /// Build a binding from a queue name and routing keys.
    #[must_use]
    pub fn new(queue: impl Into<String>, routing_keys: &[&str]) -> Self {
        Self {
            queue: queue.into(),
            routing_keys: routing_keys.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Declare the topic exchange, every bound queue, and their bindings.
///
/// The exchange is durable and not auto-deleted; queues are durable,
/// non-exclusive and not auto-deleted.
///
/// # Errors
///
/// Returns [`AmqpError::Topology`] wrapping the first underlying failure.
pub async fn declare_topology(
    channel: &Channel,
    exchange: &str,
    bindings: &[QueueBinding],
) -> Result<(), AmqpError> {
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                auto_delete: false,
                internal: false,
                nowait: false,
                passive: false,
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| AmqpError::Topology(format!("failed to declare exchange '{exchange}': {e}")))?;

    for binding in bindings {
        channel
            .queue_declare(
                &binding.queue,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    nowait: false,
                    passive: false,
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                AmqpError::Topology(format!("failed to declare queue '{}': {e}", binding.queue))
            })?;

        for routing_key in &binding.routing_keys {
            channel
                .queue_bind(
                    &binding.queue,
                    exchange,
                    routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| {
                    AmqpError::Topology(format!(
                        "failed to bind queue '{}' with routing key '{routing_key}': {e}",
                        binding.queue
                    ))
                })?;

            info!(
                queue = %binding.queue,
                routing_key = %routing_key,
                "queue bound to exchange"
            );
        }
    }

    info!(exchange = %exchange, "exchange and queue topology ready");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn binding_copies_all_routing_keys() {
        let binding = QueueBinding::new("portfolio_report_queue", &["portfolio.report", "portfolio.*"]);
        assert_eq!(binding.queue, "portfolio_report_queue");
        assert_eq!(binding.routing_keys, vec!["portfolio.report", "portfolio.*"]);
    }
}
