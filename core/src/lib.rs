//! # Report Export Core
//!
//! Broker-agnostic building blocks for the report export worker:
//!
//! - [`envelope`]: the uniform JSON message envelope and its codec
//! - [`events`]: the portfolio event types carried inside envelopes
//! - [`handler`]: the [`EventHandler`](handler::EventHandler) contract and the
//!   [`HandlerRegistry`](handler::HandlerRegistry) that routes envelopes by event type
//! - [`report`]: narrow seams for the external report renderer and report store
//!
//! Nothing in this crate knows about AMQP. The transport lives in
//! `report-export-amqp`; implementations of the collaborator seams live in the
//! service binary.

pub mod envelope;
pub mod events;
pub mod handler;
pub mod report;

pub use envelope::{EnvelopeError, EventEnvelope};
pub use handler::{EventHandler, HandlerRegistry};
pub use report::{RenderError, ReportRenderer, ReportStore, StoreError};
