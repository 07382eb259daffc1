//! Portfolio event types carried inside envelopes.
//!
//! Field names follow the published wire contract (`portID`, `userID`, ...),
//! which predates this service; serde renames keep the Rust side idiomatic.

use chrono::{Days, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::envelope::{EnvelopeError, EventEnvelope};

/// Event type identifier for portfolio report requests.
pub const PORTFOLIO_REPORT: &str = "portfolio.report";

/// A single portfolio as it appears on the wire.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Portfolio {
    /// Portfolio identifier.
    #[serde(rename = "portID")]
    pub port_id: i32,

    /// Display name.
    pub name: String,

    /// Identifier of the owning user.
    #[serde(rename = "userID")]
    pub user_id: String,

    /// Creation time, formatted by the publisher.
    #[serde(rename = "createdAt")]
    pub created_at: String,

    /// Last update time, formatted by the publisher.
    #[serde(rename = "lastUpdate")]
    pub last_update: String,
}

/// Payload of a [`PORTFOLIO_REPORT`] event.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortfolioReportPayload {
    /// Portfolios to include in the report, in report order.
    pub portfolios: Vec<Portfolio>,
}

/// Build a `portfolio.report` envelope for the given portfolios.
///
/// # Errors
///
/// Returns [`EnvelopeError::Serialization`] if the payload cannot be serialized.
pub fn portfolio_report_envelope(
    portfolios: Vec<Portfolio>,
) -> Result<EventEnvelope, EnvelopeError> {
    EventEnvelope::new(PORTFOLIO_REPORT, &PortfolioReportPayload { portfolios })
}

/// Sample portfolios used by the publish helper and by tests.
#[must_use]
pub fn sample_portfolios() -> Vec<Portfolio> {
    let now = Utc::now();
    let stamp = |dt: chrono::DateTime<Utc>| dt.format("%Y-%m-%d %H:%M:%S").to_string();

    vec![
        Portfolio {
            port_id: 1,
            name: "My Tech Portfolio".to_string(),
            user_id: "user123".to_string(),
            created_at: stamp(now - Months::new(6)),
            last_update: stamp(now - Days::new(10)),
        },
        Portfolio {
            port_id: 2,
            name: "Retirement Fund".to_string(),
            user_id: "user456".to_string(),
            created_at: stamp(now - Months::new(4)),
            last_update: stamp(now - Days::new(5)),
        },
        Portfolio {
            port_id: 3,
            name: "Growth Portfolio".to_string(),
            user_id: "user123".to_string(),
            created_at: stamp(now - Months::new(2)),
            last_update: stamp(now - Days::new(1)),
        },
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn portfolio_serializes_with_wire_field_names() {
        let portfolios = sample_portfolios();
        let value = serde_json::to_value(&portfolios[0]).unwrap();

        assert_eq!(value["portID"], 1);
        assert_eq!(value["userID"], "user123");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("lastUpdate").is_some());
    }

    #[test]
    fn report_envelope_carries_the_portfolio_event_type() {
        let envelope = portfolio_report_envelope(sample_portfolios()).unwrap();
        assert_eq!(envelope.event_type, PORTFOLIO_REPORT);

        let payload: PortfolioReportPayload = envelope.decode_payload().unwrap();
        assert_eq!(payload.portfolios.len(), 3);
        assert_eq!(payload.portfolios[1].user_id, "user456");
    }

    #[test]
    fn sample_portfolios_have_distinct_ids() {
        let ids: Vec<i32> = sample_portfolios().iter().map(|p| p.port_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
