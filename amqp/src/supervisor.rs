//! Reconnect supervision.
//!
//! An explicit state machine replaces the ad hoc monitor loop such a worker
//! usually grows:
//!
//! ```text
//!              close notification (error)
//!   CONNECTED ───────────────────────────► RECONNECTING
//!       ▲                                       │
//!       │ full pipeline re-established          │ retry budget exhausted
//!       └───────────────────────────────────────┼──► FAILED (fatal)
//!                                               │
//!   any state ──(external cancellation)──► SHUTDOWN (clean return)
//! ```
//!
//! While `RECONNECTING`, the supervisor retries the full
//! connect → declare topology → start consumers sequence with exponential
//! backoff, `min(2^attempt, 30)` seconds by default. Cancellation is checked
//! at every wait point (the close-notification wait and the backoff sleep),
//! so shutdown is never delayed by a pending backoff.
//!
//! The supervisor never closes resources on shutdown; the owning process
//! performs the final close on the [`RunningPipeline`] it gets back.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use report_export_core::handler::HandlerRegistry;

use crate::connection::{BrokerConfig, BrokerConnection, CloseNotification};
use crate::consumer::{start_consumers, ConsumerSet};
use crate::error::AmqpError;
use crate::topology::{declare_topology, QueueBinding};

/// Supervisor states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Holding a live connection and an armed close notification.
    Connected,
    /// Driving bounded-retry re-establishment of the pipeline.
    Reconnecting,
    /// Retry budget exhausted; fatal for the process.
    Failed,
    /// External cancellation observed; the supervisor returned cleanly.
    Shutdown,
}

/// Bounded exponential backoff for reconnect attempts.
///
/// The default delay sequence for attempts 0.. is
/// `1s, 2s, 4s, 8s, 16s, 30s, 30s, ...`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Maximum number of reconnect attempts before giving up.
    pub max_retries: u32,
    /// Delay for attempt 0; doubles each attempt.
    pub initial_delay: Duration,
    /// Cap for the exponential backoff.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Backoff delay for a given attempt number, starting at 0.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u128 << attempt.min(64);
        let millis = self.initial_delay.as_millis().saturating_mul(factor);
        let capped = millis.min(self.max_delay.as_millis());
        Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX))
    }
}

/// Everything needed to (re)build the consume pipeline from scratch.
pub struct ConsumerPipeline {
    config: BrokerConfig,
    exchange: String,
    bindings: Vec<QueueBinding>,
    registry: Arc<HandlerRegistry>,
}

impl ConsumerPipeline {
    /// Build a pipeline description.
    #[must_use]
    pub fn new(
        config: BrokerConfig,
        exchange: impl Into<String>,
        bindings: Vec<QueueBinding>,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            config,
            exchange: exchange.into(),
            bindings,
            registry,
        }
    }

    /// Run the full connect → declare topology → start consumers sequence.
    ///
    /// On a mid-sequence failure the fresh connection is closed before the
    /// error is returned, so a failed attempt never leaks resources.
    ///
    /// # Errors
    ///
    /// Returns the first [`AmqpError`] of the sequence.
    pub async fn start(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<RunningPipeline, AmqpError> {
        let (connection, closed) = BrokerConnection::connect(&self.config).await?;

        if let Err(e) = declare_topology(connection.channel(), &self.exchange, &self.bindings).await
        {
            connection.close().await;
            return Err(e);
        }

        let consumers = match start_consumers(
            connection.channel(),
            &self.bindings,
            Arc::clone(&self.registry),
            shutdown.clone(),
        )
        .await
        {
            Ok(consumers) => consumers,
            Err(e) => {
                connection.close().await;
                return Err(e);
            }
        };

        Ok(RunningPipeline {
            connection,
            closed,
            consumers,
        })
    }
}

/// A live pipeline: the connection, its armed close notification, and the
/// group of consumer workers.
pub struct RunningPipeline {
    pub(crate) connection: BrokerConnection,
    pub(crate) closed: CloseNotification,
    pub(crate) consumers: ConsumerSet,
}

impl RunningPipeline {
    /// Number of live consumer workers.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Tear the pipeline down: cancel all workers, then close the connection.
    pub async fn shutdown(mut self) {
        self.consumers.abort_all();
        self.connection.close().await;
    }
}

/// Watches the connection and drives reconnection when it is lost.
pub struct Supervisor {
    pipeline: ConsumerPipeline,
    policy: ReconnectPolicy,
    state: SupervisorState,
}

impl Supervisor {
    /// Build a supervisor over a pipeline description.
    #[must_use]
    pub fn new(pipeline: ConsumerPipeline, policy: ReconnectPolicy) -> Self {
        Self {
            pipeline,
            policy,
            state: SupervisorState::Connected,
        }
    }

    /// Current state, for observability and tests.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Supervise a running pipeline until shutdown or fatal failure.
    ///
    /// Returns `Ok(Some(pipeline))` when cancellation (or a clean connection
    /// close) was observed while connected, in which case the caller performs
    /// the final close; `Ok(None)` when cancellation arrived mid-reconnect
    /// and no pipeline is live.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::ReconnectExhausted`] once the retry budget is
    /// spent; no further attempts are made.
    pub async fn run(
        &mut self,
        mut running: RunningPipeline,
        shutdown: CancellationToken,
    ) -> Result<Option<RunningPipeline>, AmqpError> {
        self.transition(SupervisorState::Connected);

        loop {
            let cause = tokio::select! {
                cause = running.closed.wait() => cause,
                () = shutdown.cancelled() => {
                    info!("shutdown requested, supervisor exiting");
                    self.transition(SupervisorState::Shutdown);
                    return Ok(Some(running));
                }
            };

            let Some(error) = cause else {
                info!("broker connection closed cleanly, supervisor exiting");
                self.transition(SupervisorState::Shutdown);
                return Ok(Some(running));
            };

            warn!(error = %error, "broker connection lost");

            // Stale workers must be gone before a new connection exists so
            // none of them can acknowledge against the new channel.
            running.consumers.abort_all();
            running.connection.close().await;

            self.transition(SupervisorState::Reconnecting);
            match self.reconnect(&shutdown).await? {
                Some(next) => {
                    running = next;
                    self.transition(SupervisorState::Connected);
                }
                None => return Ok(None),
            }
        }
    }

    /// Attempt to re-establish the full pipeline, up to the retry budget.
    ///
    /// Returns `Ok(None)` if cancellation was observed while backing off.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::ReconnectExhausted`] wrapping the last underlying
    /// failure once the budget is spent.
    pub async fn reconnect(
        &mut self,
        shutdown: &CancellationToken,
    ) -> Result<Option<RunningPipeline>, AmqpError> {
        let mut last_error: Option<AmqpError> = None;

        for attempt in 0..self.policy.max_retries {
            info!(
                attempt = attempt + 1,
                max_retries = self.policy.max_retries,
                "attempting to reconnect to broker"
            );

            match self.pipeline.start(shutdown).await {
                Ok(running) => {
                    info!("successfully reconnected to broker");
                    return Ok(Some(running));
                }
                Err(e) => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        error = %e,
                        delay_ms = delay.as_millis(),
                        "reconnect attempt failed, backing off"
                    );
                    last_error = Some(e);

                    tokio::select! {
                        () = sleep(delay) => {}
                        () = shutdown.cancelled() => {
                            info!("shutdown requested during backoff, supervisor exiting");
                            self.transition(SupervisorState::Shutdown);
                            return Ok(None);
                        }
                    }
                }
            }
        }

        self.transition(SupervisorState::Failed);
        Err(AmqpError::ReconnectExhausted {
            attempts: self.policy.max_retries,
            reason: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    fn transition(&mut self, next: SupervisorState) {
        if self.state != next {
            info!(from = ?self.state, to = ?next, "supervisor state change");
            self.state = next;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_sequence_is_capped_at_thirty_seconds() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..7)
            .map(|attempt| policy.delay_for_attempt(attempt).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn backoff_scales_with_the_initial_delay() {
        let policy = ReconnectPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(20));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(40));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(50));
    }

    #[test]
    fn very_large_attempt_numbers_do_not_overflow() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(30));
    }

    fn unreachable_pipeline() -> ConsumerPipeline {
        ConsumerPipeline::new(
            BrokerConfig {
                host: "127.0.0.1".to_string(),
                port: 1,
                username: "guest".to_string(),
                password: "guest".to_string(),
                vhost: "/".to_string(),
            },
            "investment_exchange",
            vec![QueueBinding::new("portfolio_report_queue", &["portfolio.report"])],
            Arc::new(HandlerRegistry::new()),
        )
    }

    #[tokio::test]
    async fn exhausted_retry_budget_is_fatal() {
        let policy = ReconnectPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let mut supervisor = Supervisor::new(unreachable_pipeline(), policy);

        let err = supervisor
            .reconnect(&CancellationToken::new())
            .await
            .map(|_| ())
            .unwrap_err();

        assert!(matches!(
            err,
            AmqpError::ReconnectExhausted { attempts: 2, .. }
        ));
        assert_eq!(supervisor.state(), SupervisorState::Failed);
    }

    #[tokio::test]
    async fn cancellation_during_backoff_returns_cleanly() {
        let policy = ReconnectPolicy {
            max_retries: 3,
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
        };
        let mut supervisor = Supervisor::new(unreachable_pipeline(), policy);

        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let result = supervisor.reconnect(&shutdown).await.map(|r| r.is_none());
        assert_eq!(result.ok(), Some(true));
        assert_eq!(supervisor.state(), SupervisorState::Shutdown);
    }
}
