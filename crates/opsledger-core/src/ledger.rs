//! # Ledger Rules
//!
//! Feed-type routing and `occurred_at` derivation for raw ledger events.
//!
//! ## Routing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  URL token            LedgerRoute                                       │
//! │  ─────────            ──────────────────────────────────────            │
//! │  "sales"          ──► ERP / ERP_SALES_LEDGER                            │
//! │  "payouts"        ──► ERP / ERP_PAYOUT_LEDGER                           │
//! │  "anything-else"  ──► ERP / ANYTHING-ELSE       (upper-cased token)     │
//! │  master data      ──► MASTER / MASTER_DATA_LEDGER (no business day)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## occurred_at
//! Heterogeneous shapes share one ingestion path. The first populated field
//! wins, in this order:
//!
//! 1. `event_time`
//! 2. `closed_at`, `opened_at`, `paid_at`, `applied_at`, `voided_at`,
//!    `refunded_at`, `occurred_at`
//! 3. the server clock
//!
//! A field is populated when it holds an RFC 3339 string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Domain tag for ERP feeds.
pub const ERP_DOMAIN: &str = "ERP";

/// Domain tag for master-data events.
pub const MASTER_DOMAIN: &str = "MASTER";

/// Feed type for master-data events.
pub const MASTER_DATA_FEED: &str = "MASTER_DATA_LEDGER";

/// Explicit event time; always checked first.
pub const EVENT_TIME_FIELD: &str = "event_time";

/// Fallback timestamp fields, highest priority first.
pub const OCCURRED_AT_PRECEDENCE: &[&str] = &[
    "closed_at",
    "opened_at",
    "paid_at",
    "applied_at",
    "voided_at",
    "refunded_at",
    "occurred_at",
];

/// URL token → internal feed type for ERP ledgers.
pub const ERP_FEED_TYPES: &[(&str, &str)] = &[
    ("sales", "ERP_SALES_LEDGER"),
    ("orders-tickets", "ERP_ORDERS_TICKETS_LEDGER"),
    ("discounts", "ERP_DISCOUNTS_LEDGER"),
    ("voids", "ERP_VOIDS_LEDGER"),
    ("refunds", "ERP_REFUNDS_LEDGER"),
    ("open-close-downtime", "ERP_OPEN_CLOSE_DOWNTIME_LEDGER"),
    ("payments-tender", "ERP_PAYMENTS_TENDER_LEDGER"),
    ("payouts", "ERP_PAYOUT_LEDGER"),
    ("cash-variance", "ERP_CASH_VARIANCE_LEDGER"),
    ("labor", "ERP_LABOR_LEDGER"),
    ("stockout-86", "ERP_STOCKOUT_86_LEDGER"),
    ("costing-inputs", "ERP_COSTING_INPUTS_LEDGER"),
    ("ops-incidents", "ERP_OPS_INCIDENTS_LEDGER"),
];

// =============================================================================
// Routing
// =============================================================================

/// Where a batch of raw events lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRoute {
    pub feed_type: String,
    pub domain: String,
}

impl LedgerRoute {
    /// Route for an ERP feed token such as `sales` or `cash-variance`.
    ///
    /// ## Example
    /// ```rust
    /// use opsledger_core::ledger::LedgerRoute;
    ///
    /// assert_eq!(LedgerRoute::erp("sales").feed_type, "ERP_SALES_LEDGER");
    /// assert_eq!(LedgerRoute::erp("fuel").feed_type, "FUEL");
    /// ```
    pub fn erp(token: &str) -> Self {
        let feed_type = ERP_FEED_TYPES
            .iter()
            .find(|(known, _)| *known == token)
            .map(|(_, feed)| (*feed).to_string())
            .unwrap_or_else(|| token.to_uppercase());
        LedgerRoute {
            feed_type,
            domain: ERP_DOMAIN.to_string(),
        }
    }

    /// Route for master-data events.
    pub fn master_data() -> Self {
        LedgerRoute {
            feed_type: MASTER_DATA_FEED.to_string(),
            domain: MASTER_DOMAIN.to_string(),
        }
    }

    /// Master-data rows never belong to a business day.
    pub fn carries_business_day(&self) -> bool {
        self.domain != MASTER_DOMAIN
    }
}

// =============================================================================
// Event Inspection
// =============================================================================

/// The event's idempotency token, if it has a non-empty string one.
pub fn source_event_id(event: &Map<String, Value>) -> Option<&str> {
    event
        .get("source_event_id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
}

/// Derives `occurred_at` from the payload, falling back to `now`.
pub fn occurred_at(event: &Map<String, Value>, now: DateTime<Utc>) -> DateTime<Utc> {
    std::iter::once(EVENT_TIME_FIELD)
        .chain(OCCURRED_AT_PRECEDENCE.iter().copied())
        .find_map(|field| timestamp_field(event, field))
        .unwrap_or(now)
}

fn timestamp_field(event: &Map<String, Value>, field: &str) -> Option<DateTime<Utc>> {
    let raw = event.get(field)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// =============================================================================
// Outcome
// =============================================================================

/// Summary returned by a ledger append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAppendOutcome {
    pub accepted: bool,
    pub ledger: String,
    pub inserted: u32,
    pub deduped: u32,
    pub errors: Vec<String>,
}

impl LedgerAppendOutcome {
    /// Empty outcome for a route.
    pub fn new(route: &LedgerRoute) -> Self {
        LedgerAppendOutcome {
            accepted: true,
            ledger: route.feed_type.clone(),
            inserted: 0,
            deduped: 0,
            errors: Vec::new(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_known_and_unknown_tokens() {
        assert_eq!(LedgerRoute::erp("stockout-86").feed_type, "ERP_STOCKOUT_86_LEDGER");
        assert_eq!(LedgerRoute::erp("payouts").feed_type, "ERP_PAYOUT_LEDGER");
        assert_eq!(LedgerRoute::erp("fuel-deliveries").feed_type, "FUEL-DELIVERIES");
        assert_eq!(LedgerRoute::erp("sales").domain, "ERP");
    }

    #[test]
    fn test_master_data_route() {
        let route = LedgerRoute::master_data();
        assert_eq!(route.feed_type, "MASTER_DATA_LEDGER");
        assert_eq!(route.domain, "MASTER");
        assert!(!route.carries_business_day());
        assert!(LedgerRoute::erp("sales").carries_business_day());
    }

    #[test]
    fn test_event_time_beats_everything() {
        let now = utc("2030-01-01T00:00:00Z");
        let event = obj(json!({
            "paid_at": "2026-01-15T12:41:00+05:00",
            "closed_at": "2026-01-15T12:40:00+05:00",
            "event_time": "2026-01-15T13:00:00+05:00",
        }));
        assert_eq!(occurred_at(&event, now), utc("2026-01-15T08:00:00Z"));
    }

    #[test]
    fn test_precedence_order_without_event_time() {
        let now = utc("2030-01-01T00:00:00Z");
        let event = obj(json!({
            "paid_at": "2026-01-15T12:41:00+05:00",
            "closed_at": "2026-01-15T12:40:00+05:00",
        }));
        assert_eq!(occurred_at(&event, now), utc("2026-01-15T07:40:00Z"));

        let paid_only = obj(json!({ "paid_at": "2026-01-15T12:41:00+05:00", "closed_at": null }));
        assert_eq!(occurred_at(&paid_only, now), utc("2026-01-15T07:41:00Z"));
    }

    #[test]
    fn test_falls_back_to_now() {
        let now = utc("2030-01-01T00:00:00Z");
        let event = obj(json!({ "source_event_id": "x", "event_time": "not a time" }));
        assert_eq!(occurred_at(&event, now), now);
    }

    #[test]
    fn test_source_event_id_rules() {
        assert_eq!(source_event_id(&obj(json!({"source_event_id": "E-1"}))), Some("E-1"));
        assert_eq!(source_event_id(&obj(json!({"source_event_id": ""}))), None);
        assert_eq!(source_event_id(&obj(json!({"source_event_id": null}))), None);
        assert_eq!(source_event_id(&obj(json!({}))), None);
    }
}
