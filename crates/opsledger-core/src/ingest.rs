//! # Ingestion Payloads and Outcomes
//!
//! Wire shapes for the structured bulk-upsert operations.
//!
//! ## Batch Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  IngestBatch<TicketInput>                                               │
//! │   { tenant_id, location_id, source_system_id, business_day_id?, [..] }  │
//! │        │                                                                │
//! │        ▼  one transaction, one savepoint per item                       │
//! │  ┌─────────────┐   seen before   ┌──────────┐                           │
//! │  │ dedup guard │ ──────────────► │ UPDATED  │  (no writes)              │
//! │  └──────┬──────┘                 └──────────┘                           │
//! │         │ new                                                           │
//! │         ▼                                                               │
//! │  ┌─────────────┐   invalid       ┌──────────┐                           │
//! │  │  validate   │ ──────────────► │ REJECTED │  + warning                │
//! │  └──────┬──────┘                 └──────────┘                           │
//! │         ▼                                                               │
//! │  ┌─────────────┐                 ┌──────────┐                           │
//! │  │   create    │ ──────────────► │ UPSERTED │  + soft warnings          │
//! │  └─────────────┘                 └──────────┘                           │
//! │                                                                         │
//! │  BatchOutcome { accepted, updated, rejected, results[] }                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Per-item `source_event_id` fields default to an empty string when absent,
//! so a batch with one malformed item still decodes and that item is
//! rejected on its own.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::money::{Amount, Quantity, TicketTotals};
use crate::types::MappingStatus;

// =============================================================================
// Warning Tokens
// =============================================================================

/// The item (or one of a ticket's children) has no `source_event_id`.
pub const WARN_MISSING_SOURCE_EVENT_ID: &str = "missing_source_event_id";

/// The ticket's channel block matched no channel mapping.
pub const WARN_CHANNEL_NOT_MAPPED: &str = "channel_not_mapped";

/// A line item could not be resolved to an internal item.
pub const WARN_ITEM_NOT_MAPPED: &str = "item_not_mapped";

/// A labor punch named no resolvable employee.
pub const WARN_EMPLOYEE_NOT_MAPPED: &str = "employee_not_mapped";

/// A dedup row collided with a mapping to a different entity.
pub const WARN_DEDUP_CONFLICT: &str = "dedup_conflict";

// =============================================================================
// Batch Envelope
// =============================================================================

/// A structured bulk-upsert request.
///
/// The item array accepts the name each endpoint documents (`tickets`,
/// `signals`, `events`, `punches`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestBatch<T> {
    pub tenant_id: i64,
    pub location_id: i64,
    pub source_system_id: i64,
    #[serde(default)]
    pub business_day_id: Option<i64>,
    #[serde(alias = "tickets", alias = "signals", alias = "events", alias = "punches")]
    pub items: Vec<T>,
}

/// Payout batches are not always tied to a location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutBatch {
    pub tenant_id: i64,
    #[serde(default)]
    pub location_id: Option<i64>,
    pub source_system_id: i64,
    pub payouts: Vec<PayoutInput>,
}

// =============================================================================
// Ticket Inputs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketInput {
    #[serde(default)]
    pub source_event_id: String,
    #[serde(default)]
    pub external_ticket_id: Option<String>,
    pub opened_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default = "default_ticket_status")]
    pub status: String,
    #[serde(default)]
    pub covers: Option<i64>,
    #[serde(default)]
    pub channel: Option<TicketChannelInput>,
    pub gross_amount: Amount,
    #[serde(default)]
    pub discount_amount: Amount,
    #[serde(default)]
    pub tax_amount: Amount,
    pub net_amount: Amount,
    #[serde(default)]
    pub line_items: Vec<TicketLineItemInput>,
    #[serde(default)]
    pub payments: Vec<TicketPaymentInput>,
    #[serde(default)]
    pub discounts: Vec<TicketDiscountInput>,
    #[serde(default)]
    pub voids: Vec<TicketVoidInput>,
    #[serde(default)]
    pub refunds: Vec<TicketRefundInput>,
}

fn default_ticket_status() -> String {
    "CLOSED".to_string()
}

impl TicketInput {
    /// The four top-level figures as reported.
    pub fn totals(&self) -> TicketTotals {
        TicketTotals {
            gross: self.gross_amount,
            discount: self.discount_amount,
            tax: self.tax_amount,
            net: self.net_amount,
        }
    }

    /// Every child `source_event_id`, in creation order.
    pub fn child_event_ids(&self) -> impl Iterator<Item = &str> {
        self.line_items
            .iter()
            .map(|l| l.source_event_id.as_str())
            .chain(self.payments.iter().map(|p| p.source_event_id.as_str()))
            .chain(self.discounts.iter().map(|d| d.source_event_id.as_str()))
            .chain(self.voids.iter().map(|v| v.source_event_id.as_str()))
            .chain(self.refunds.iter().map(|r| r.source_event_id.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketChannelInput {
    #[serde(default)]
    pub provider: Option<String>,
    pub source_channel_code: String,
    #[serde(default)]
    pub source_channel_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketLineItemInput {
    #[serde(default)]
    pub source_event_id: String,
    #[serde(default)]
    pub external_line_id: Option<String>,
    #[serde(default)]
    pub item_id: Option<i64>,
    #[serde(default)]
    pub external_item_key: Option<String>,
    #[serde(default)]
    pub item_name_raw: Option<String>,
    pub qty: Quantity,
    #[serde(default)]
    pub uom: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Amount>,
    pub gross_amount: Amount,
    #[serde(default)]
    pub discount_amount: Amount,
    #[serde(default)]
    pub tax_amount: Amount,
    pub net_amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketPaymentInput {
    #[serde(default)]
    pub source_event_id: String,
    pub tender_type: String,
    pub amount: Amount,
    pub paid_at: DateTime<Utc>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketDiscountInput {
    #[serde(default)]
    pub source_event_id: String,
    pub amount: Amount,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketVoidInput {
    #[serde(default)]
    pub source_event_id: String,
    pub amount: Amount,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRefundInput {
    #[serde(default)]
    pub source_event_id: String,
    pub amount: Amount,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub refunded_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Operational Inputs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenCloseSignalInput {
    #[serde(default)]
    pub source_event_id: String,
    pub signal_type: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DowntimeEventInput {
    #[serde(default)]
    pub source_event_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// A clock-in/clock-out pair. The employee is named either by internal id
/// or by the location's external key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaborPunchInput {
    #[serde(default)]
    pub source_event_id: String,
    #[serde(default)]
    pub employee_id: Option<i64>,
    #[serde(default)]
    pub employee_external_key: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub clock_in: DateTime<Utc>,
    #[serde(default)]
    pub clock_out: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutInput {
    #[serde(default)]
    pub source_event_id: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub payout_reference: Option<String>,
    #[serde(default = "default_payout_status")]
    pub status: String,
    pub currency_code: String,
    pub amount: Amount,
    #[serde(default)]
    pub period_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expected_payout_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

fn default_payout_status() -> String {
    "PENDING".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockoutInput {
    #[serde(default)]
    pub source_event_id: String,
    #[serde(default)]
    pub item_id: Option<i64>,
    #[serde(default)]
    pub item_name_raw: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

// =============================================================================
// Outcomes
// =============================================================================

/// Terminal state of one item within a batch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpsertStatus {
    Upserted,
    Updated,
    Rejected,
}

/// What the orchestrator resolved while creating a ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketResolution {
    pub business_day_id: Option<i64>,
    pub channel_id: Option<i64>,
    pub line_items: Vec<LineItemResolution>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItemResolution {
    pub source_event_id: String,
    pub ticket_line_item_id: i64,
    pub item_id: Option<i64>,
    pub mapping_status: MappingStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketUpsertResult {
    pub source_event_id: String,
    pub ticket_id: Option<i64>,
    pub upsert_status: UpsertStatus,
    /// `{}` unless the ticket was created by this call.
    #[serde(serialize_with = "resolution_or_empty")]
    pub resolved: Option<TicketResolution>,
    pub warnings: Vec<String>,
}

fn resolution_or_empty<S: Serializer>(
    resolved: &Option<TicketResolution>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match resolved {
        Some(resolution) => resolution.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

impl TicketUpsertResult {
    pub fn updated(source_event_id: impl Into<String>, ticket_id: i64) -> Self {
        TicketUpsertResult {
            source_event_id: source_event_id.into(),
            ticket_id: Some(ticket_id),
            upsert_status: UpsertStatus::Updated,
            resolved: None,
            warnings: Vec::new(),
        }
    }

    pub fn rejected(source_event_id: impl Into<String>, warning: &str) -> Self {
        TicketUpsertResult {
            source_event_id: source_event_id.into(),
            ticket_id: None,
            upsert_status: UpsertStatus::Rejected,
            resolved: None,
            warnings: vec![warning.to_string()],
        }
    }
}

/// Result for one non-ticket structured row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityUpsertResult {
    pub source_event_id: String,
    pub entity_id: Option<i64>,
    pub upsert_status: UpsertStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_employee_id: Option<i64>,
    pub warnings: Vec<String>,
}

impl EntityUpsertResult {
    pub fn upserted(source_event_id: impl Into<String>, entity_id: i64) -> Self {
        EntityUpsertResult {
            source_event_id: source_event_id.into(),
            entity_id: Some(entity_id),
            upsert_status: UpsertStatus::Upserted,
            resolved_employee_id: None,
            warnings: Vec::new(),
        }
    }

    pub fn updated(source_event_id: impl Into<String>, entity_id: i64) -> Self {
        EntityUpsertResult {
            upsert_status: UpsertStatus::Updated,
            ..EntityUpsertResult::upserted(source_event_id, entity_id)
        }
    }

    pub fn rejected(source_event_id: impl Into<String>, warning: &str) -> Self {
        EntityUpsertResult {
            source_event_id: source_event_id.into(),
            entity_id: None,
            upsert_status: UpsertStatus::Rejected,
            resolved_employee_id: None,
            warnings: vec![warning.to_string()],
        }
    }
}

/// Anything with an [`UpsertStatus`] can be tallied into a [`BatchOutcome`].
pub trait HasUpsertStatus {
    fn upsert_status(&self) -> UpsertStatus;
}

impl HasUpsertStatus for TicketUpsertResult {
    fn upsert_status(&self) -> UpsertStatus {
        self.upsert_status
    }
}

impl HasUpsertStatus for EntityUpsertResult {
    fn upsert_status(&self) -> UpsertStatus {
        self.upsert_status
    }
}

/// Summary of a bulk-upsert call.
///
/// `accepted` counts newly created items; `updated` counts re-submissions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome<R> {
    pub accepted: u32,
    pub updated: u32,
    pub rejected: u32,
    pub results: Vec<R>,
}

impl<R> Default for BatchOutcome<R> {
    fn default() -> Self {
        BatchOutcome {
            accepted: 0,
            updated: 0,
            rejected: 0,
            results: Vec::new(),
        }
    }
}

impl<R: HasUpsertStatus> BatchOutcome<R> {
    /// Appends a result and bumps the matching counter.
    pub fn push(&mut self, result: R) {
        match result.upsert_status() {
            UpsertStatus::Upserted => self.accepted += 1,
            UpsertStatus::Updated => self.updated += 1,
            UpsertStatus::Rejected => self.rejected += 1,
        }
        self.results.push(result);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ticket_batch_accepts_tickets_alias() {
        let batch: IngestBatch<TicketInput> = serde_json::from_value(json!({
            "tenant_id": 1,
            "location_id": 2,
            "source_system_id": 3,
            "tickets": [{
                "source_event_id": "T-1",
                "opened_at": "2026-01-15T12:00:00+05:00",
                "gross_amount": "2500.00",
                "discount_amount": "100.00",
                "net_amount": "2400.00"
            }]
        }))
        .unwrap();

        assert_eq!(batch.items.len(), 1);
        let ticket = &batch.items[0];
        assert_eq!(ticket.status, "CLOSED");
        assert_eq!(ticket.tax_amount, Amount::ZERO);
        assert!(ticket.totals().reconciles());
        assert_eq!(ticket.opened_at.to_rfc3339(), "2026-01-15T07:00:00+00:00");
    }

    #[test]
    fn test_missing_event_id_decodes_as_empty() {
        let signal: OpenCloseSignalInput = serde_json::from_value(json!({
            "signal_type": "OPEN",
            "occurred_at": "2026-01-15T06:00:00Z"
        }))
        .unwrap();
        assert_eq!(signal.source_event_id, "");
    }

    #[test]
    fn test_updated_result_serializes_empty_resolution() {
        let result = TicketUpsertResult::updated("T-1", 42);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["resolved"], json!({}));
        assert_eq!(value["upsert_status"], json!("UPDATED"));
        assert_eq!(value["ticket_id"], json!(42));
    }

    #[test]
    fn test_batch_outcome_counts() {
        let mut outcome = BatchOutcome::default();
        outcome.push(EntityUpsertResult::upserted("a", 1));
        outcome.push(EntityUpsertResult::updated("b", 2));
        outcome.push(EntityUpsertResult::rejected("", WARN_MISSING_SOURCE_EVENT_ID));

        assert_eq!((outcome.accepted, outcome.updated, outcome.rejected), (1, 1, 1));
        assert_eq!(outcome.results.len(), 3);
    }

    #[test]
    fn test_child_event_ids_cover_every_kind() {
        let ticket: TicketInput = serde_json::from_value(json!({
            "source_event_id": "T-1",
            "opened_at": "2026-01-15T07:00:00Z",
            "gross_amount": 10,
            "net_amount": 10,
            "line_items": [{"source_event_id": "L-1", "qty": 1, "gross_amount": 10, "net_amount": 10}],
            "payments": [{"source_event_id": "P-1", "tender_type": "CARD", "amount": 10, "paid_at": "2026-01-15T07:05:00Z"}],
            "voids": [{"amount": 1}]
        }))
        .unwrap();

        let ids: Vec<&str> = ticket.child_event_ids().collect();
        assert_eq!(ids, vec!["L-1", "P-1", ""]);
    }
}
