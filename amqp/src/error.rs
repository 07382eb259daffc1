//! Error taxonomy for the AMQP transport.

use thiserror::Error;

/// Errors that can occur in the AMQP transport.
///
/// Connection errors are retryable by the supervisor; topology and consume
/// errors abort the attempt they occur in; [`AmqpError::ReconnectExhausted`]
/// is fatal for the process.
#[derive(Error, Debug, Clone)]
pub enum AmqpError {
    /// Dialing the broker or opening the channel failed.
    #[error("failed to connect to broker: {0}")]
    Connection(String),

    /// An exchange/queue declare or bind failed.
    #[error("failed to declare topology: {0}")]
    Topology(String),

    /// A consumer could not be registered for a queue.
    #[error("failed to start consumer for queue '{queue}': {reason}")]
    Consume {
        /// The queue that failed.
        queue: String,
        /// The reason for failure.
        reason: String,
    },

    /// Publishing an envelope failed.
    #[error("failed to publish to exchange '{exchange}': {reason}")]
    Publish {
        /// The target exchange.
        exchange: String,
        /// The reason for failure.
        reason: String,
    },

    /// The reconnect retry budget is exhausted. Fatal.
    #[error("gave up reconnecting after {attempts} attempts: {reason}")]
    ReconnectExhausted {
        /// How many attempts were made.
        attempts: u32,
        /// The last underlying failure.
        reason: String,
    },
}
