//! Per-queue consumption workers.
//!
//! One tokio task per bound queue pulls deliveries with manual
//! acknowledgment, decodes each into an envelope, routes it through the
//! handler registry, and acks on success or nacks with `requeue = true` on
//! failure. A decode failure counts as a dispatch failure.
//!
//! All workers of one connection live in a single [`tokio::task::JoinSet`]
//! owned by [`ConsumerSet`]. Dropping the set aborts the whole group, which
//! is exactly what the supervisor does before establishing a new connection:
//! a stale worker can never acknowledge against a new channel instance. A
//! worker also terminates by itself when its delivery stream closes, which is
//! what happens when the underlying channel or connection is lost.

use std::sync::Arc;

use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions};
use lapin::types::FieldTable;
use lapin::Channel;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use report_export_core::envelope::EventEnvelope;
use report_export_core::handler::HandlerRegistry;

use crate::error::AmqpError;
use crate::topology::QueueBinding;

/// The group of consumer worker tasks for one connection.
///
/// Dropping the set aborts every worker; in-flight handler calls are
/// cancelled at their next await point.
pub struct ConsumerSet {
    workers: JoinSet<()>,
}

impl ConsumerSet {
    /// Number of live workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the set has no workers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Abort every worker in the group.
    pub fn abort_all(&mut self) {
        self.workers.abort_all();
    }
}

/// Register one manual-ack consumer per bound queue and spawn its worker.
///
/// # Errors
///
/// Returns [`AmqpError::Consume`] if a consumer cannot be registered; workers
/// spawned for earlier queues are torn down when the returned error causes
/// the caller to drop the partial [`ConsumerSet`].
pub async fn start_consumers(
    channel: &Channel,
    bindings: &[QueueBinding],
    registry: Arc<HandlerRegistry>,
    shutdown: CancellationToken,
) -> Result<ConsumerSet, AmqpError> {
    let mut workers = JoinSet::new();

    for binding in bindings {
        let consumer = channel
            .basic_consume(
                &binding.queue,
                "",
                BasicConsumeOptions {
                    no_ack: false,
                    exclusive: false,
                    no_local: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| AmqpError::Consume {
                queue: binding.queue.clone(),
                reason: e.to_string(),
            })?;

        workers.spawn(consume_queue(
            binding.queue.clone(),
            consumer,
            Arc::clone(&registry),
            shutdown.clone(),
        ));
    }

    info!("message consumers registered for all queues");
    Ok(ConsumerSet { workers })
}

/// Worker loop for one queue. Runs until the delivery stream closes or the
/// shutdown token fires.
async fn consume_queue(
    queue: String,
    mut deliveries: lapin::Consumer,
    registry: Arc<HandlerRegistry>,
    shutdown: CancellationToken,
) {
    info!(queue = %queue, "started consuming messages");

    loop {
        let delivery = tokio::select! {
            next = deliveries.next() => match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => {
                    warn!(queue = %queue, error = %e, "delivery stream error");
                    continue;
                }
                // Channel or connection closed underneath us.
                None => break,
            },
            () = shutdown.cancelled() => break,
        };

        match delivery_disposition(&registry, &shutdown, &delivery.data).await {
            AckDecision::Ack => {
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    warn!(queue = %queue, error = %e, "failed to ack delivery");
                }
            }
            AckDecision::NackRequeue(e) => {
                // Requeue unconditionally; the broker will redeliver. A message
                // that can never be processed circulates until purged.
                warn!(queue = %queue, error = %format!("{e:#}"), "failed to process message, requeueing");
                if let Err(e) = delivery.nack(requeue_nack()).await {
                    warn!(queue = %queue, error = %e, "failed to nack delivery");
                }
            }
        }
    }

    info!(queue = %queue, "consumer stopped");
}

/// Acknowledgment decision for one delivery.
#[derive(Debug)]
enum AckDecision {
    /// The delivery was processed; acknowledge it.
    Ack,
    /// Processing failed; negatively acknowledge and requeue.
    NackRequeue(anyhow::Error),
}

/// Nack options for a failed delivery: single message, requeued.
fn requeue_nack() -> BasicNackOptions {
    BasicNackOptions {
        multiple: false,
        requeue: true,
    }
}

/// Decode one delivery body, route it to the matching handler, and map the
/// outcome to the acknowledgment the worker loop must send.
async fn delivery_disposition(
    registry: &HandlerRegistry,
    shutdown: &CancellationToken,
    body: &[u8],
) -> AckDecision {
    match process_delivery(registry, shutdown, body).await {
        Ok(()) => AckDecision::Ack,
        Err(e) => AckDecision::NackRequeue(e),
    }
}

/// Decode one delivery body and route it to the matching handler.
async fn process_delivery(
    registry: &HandlerRegistry,
    shutdown: &CancellationToken,
    body: &[u8],
) -> anyhow::Result<()> {
    let envelope = EventEnvelope::decode(body)?;
    registry.dispatch(shutdown.clone(), envelope).await
}
