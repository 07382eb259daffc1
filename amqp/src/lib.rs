//! # Report Export AMQP
//!
//! Everything that touches the broker, built on `lapin`:
//!
//! - [`connection`]: the connection manager. One connection, one multiplexed
//!   channel, an idempotent close, and a fresh close notification per
//!   connection instance.
//! - [`topology`]: idempotent exchange/queue/binding declaration
//! - [`consumer`]: one manual-ack worker task per bound queue, decoding
//!   envelopes and routing them through the handler registry
//! - [`publisher`]: outbound envelope publishing on the shared channel
//! - [`supervisor`]: the reconnect state machine that re-establishes the
//!   whole connect, declare, consume pipeline with bounded, exponentially
//!   backed-off retries
//!
//! # Delivery semantics
//!
//! At-least-once. Deliveries are consumed with manual acknowledgment; a
//! successfully dispatched delivery is acked exactly once, a failed one is
//! nacked with `requeue = true` and redelivered by the broker. There is no
//! redelivery cap and no dead-letter routing: a message whose handler always
//! fails circulates until the handler succeeds or the message is purged.
//! Handlers must therefore be idempotent.

pub mod connection;
pub mod consumer;
pub mod error;
pub mod publisher;
pub mod supervisor;
pub mod topology;

pub use connection::{BrokerConfig, BrokerConnection, CloseNotification};
pub use consumer::{start_consumers, ConsumerSet};
pub use error::AmqpError;
pub use publisher::publish_envelope;
pub use supervisor::{ConsumerPipeline, ReconnectPolicy, RunningPipeline, Supervisor, SupervisorState};
pub use topology::{declare_topology, QueueBinding};
