//! # Report Export Service
//!
//! The worker binary's library side: environment configuration, the
//! `portfolio.report` handler, the file-based report renderer and the
//! Postgres-backed report store. `main.rs` wires these into the AMQP
//! pipeline from `report-export-amqp`.

pub mod config;
pub mod portfolio;
pub mod render;
pub mod store;

/// The topic exchange every report event flows through.
pub const INVESTMENT_EXCHANGE: &str = "investment_exchange";

/// The queue bound for portfolio report events.
pub const PORTFOLIO_REPORT_QUEUE: &str = "portfolio_report_queue";
