//! # Domain Types
//!
//! Persisted entities of the operational record.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Tenant                                                                 │
//! │   ├── Location (IANA zone, currency)                                    │
//! │   │    ├── LocationHours / LocationHoursException                       │
//! │   │    ├── BusinessDay (tenant, location, business_date) UNIQUE         │
//! │   │    ├── Ticket ──┬── TicketLineItem                                  │
//! │   │    │            ├── TicketPayment / TicketDiscount                  │
//! │   │    │            └── TicketVoid / TicketRefund                       │
//! │   │    ├── LedgerEvent        (append-only)                             │
//! │   │    └── OpenCloseSignal, PosDowntimeEvent, LaborPunch, StockoutEvent │
//! │   ├── SourceSystem                                                      │
//! │   ├── IngestionMapping        (append-only dedup map)                   │
//! │   ├── Item ── ItemExternalKey                                           │
//! │   ├── ChannelMapping, Employee, Payout                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ids are storage-assigned positive integers. On the wire each entity's
//! primary key is named after the entity (`ticket_id`, `business_day_id`).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::money::{Amount, Quantity};

// =============================================================================
// JSON Payloads
// =============================================================================

/// Free-form JSON stored verbatim as SQLite `TEXT`.
///
/// Used for ledger payloads and the `metadata` blobs on operational rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(pub Value);

impl Payload {
    /// Returns the inner JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload(value)
    }
}

#[cfg(feature = "sqlx")]
mod sqlite {
    use super::Payload;
    use sqlx::encode::IsNull;
    use sqlx::error::BoxDynError;
    use sqlx::sqlite::{Sqlite, SqliteTypeInfo};
    use sqlx::{Database, Decode, Encode, Type};

    impl Type<Sqlite> for Payload {
        fn type_info() -> SqliteTypeInfo {
            <str as Type<Sqlite>>::type_info()
        }

        fn compatible(ty: &SqliteTypeInfo) -> bool {
            <str as Type<Sqlite>>::compatible(ty)
        }
    }

    impl<'q> Encode<'q, Sqlite> for Payload {
        fn encode_by_ref(
            &self,
            buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>,
        ) -> Result<IsNull, BoxDynError> {
            let text = serde_json::to_string(&self.0)?;
            <String as Encode<'q, Sqlite>>::encode(text, buf)
        }
    }

    impl<'r> Decode<'r, Sqlite> for Payload {
        fn decode(value: <Sqlite as Database>::ValueRef<'r>) -> Result<Self, BoxDynError> {
            let text = <&str as Decode<'r, Sqlite>>::decode(value)?;
            Ok(Payload(serde_json::from_str(text)?))
        }
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Entity types recorded in the dedup map.
///
/// Stored as snake_case TEXT in `ingestion_event_map.entity_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Ticket,
    TicketLineItem,
    TicketPayment,
    TicketDiscount,
    TicketVoid,
    TicketRefund,
    OpenCloseSignal,
    PosDowntimeEvent,
    LaborPunch,
    Payout,
    StockoutEvent,
}

impl EntityType {
    /// The snake_case token used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Ticket => "ticket",
            EntityType::TicketLineItem => "ticket_line_item",
            EntityType::TicketPayment => "ticket_payment",
            EntityType::TicketDiscount => "ticket_discount",
            EntityType::TicketVoid => "ticket_void",
            EntityType::TicketRefund => "ticket_refund",
            EntityType::OpenCloseSignal => "open_close_signal",
            EntityType::PosDowntimeEvent => "pos_downtime_event",
            EntityType::LaborPunch => "labor_punch",
            EntityType::Payout => "payout",
            EntityType::StockoutEvent => "stockout_event",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a line item's `item_id` was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingStatus {
    /// The feed supplied an internal `item_id` directly.
    Mapped,
    /// Resolved through `item_external_keys`.
    MappedByExternalItemKey,
    /// No item could be resolved; `item_id` is null.
    Unmapped,
}

// =============================================================================
// Reference Data
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Tenant {
    #[serde(rename = "tenant_id")]
    pub id: i64,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Location {
    #[serde(rename = "location_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    /// IANA zone name, e.g. `Asia/Karachi`.
    pub timezone: String,
    pub currency_code: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One weekday's hours. Every row of a location shares the same cutover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LocationHours {
    #[serde(skip_serializing)]
    pub id: i64,
    pub tenant_id: i64,
    pub location_id: i64,
    /// Monday = 0 ... Sunday = 6.
    pub day_of_week: i64,
    pub open_local: NaiveTime,
    pub close_local: NaiveTime,
    pub is_closed: bool,
    pub business_day_cutover_local: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LocationHoursException {
    #[serde(rename = "exception_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub location_id: i64,
    pub date_local: NaiveDate,
    pub open_local: Option<NaiveTime>,
    pub close_local: Option<NaiveTime>,
    pub is_closed: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SourceSystem {
    #[serde(rename = "source_system_id")]
    pub id: i64,
    pub tenant_id: i64,
    #[serde(rename = "type")]
    pub system_type: String,
    pub provider: Option<String>,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Item {
    #[serde(rename = "item_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub item_name: String,
    pub item_type: String,
    pub base_uom: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A source system's own key for an internal item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ItemExternalKey {
    pub tenant_id: i64,
    pub item_id: i64,
    pub source_system_id: i64,
    pub external_item_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ChannelMapping {
    #[serde(rename = "channel_mapping_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub provider: Option<String>,
    pub source_channel_code: String,
    pub source_channel_name: Option<String>,
    pub normalized_channel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Employee {
    #[serde(rename = "employee_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub location_id: Option<i64>,
    pub external_key: Option<String>,
    pub full_name: String,
    pub role: Option<String>,
    pub is_active: bool,
}

// =============================================================================
// Business Day
// =============================================================================

/// A location-local accounting day.
///
/// `starts_at`/`ends_at` are fixed at creation and span exactly 86399 s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BusinessDay {
    #[serde(rename = "business_day_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub location_id: i64,
    pub business_date: NaiveDate,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub planned_open_at: Option<DateTime<Utc>>,
    pub planned_close_at: Option<DateTime<Utc>>,
    pub actual_open_at: Option<DateTime<Utc>>,
    pub actual_close_at: Option<DateTime<Utc>>,
    pub late_open: Option<bool>,
    pub early_close: Option<bool>,
}

/// The canonical business-day representation returned by resolve/ensure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessDayRef {
    pub business_day_id: i64,
    pub tenant_id: i64,
    pub location_id: i64,
    pub business_date: NaiveDate,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl From<&BusinessDay> for BusinessDayRef {
    fn from(day: &BusinessDay) -> Self {
        BusinessDayRef {
            business_day_id: day.id,
            tenant_id: day.tenant_id,
            location_id: day.location_id,
            business_date: day.business_date,
            starts_at: day.starts_at,
            ends_at: day.ends_at,
        }
    }
}

// =============================================================================
// Ledger & Dedup Map
// =============================================================================

/// An append-only raw fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LedgerEvent {
    #[serde(rename = "ledger_event_id")]
    pub id: i64,
    pub tenant_id: i64,
    /// Null only for master-data events submitted without a location.
    pub location_id: Option<i64>,
    pub business_day_id: Option<i64>,
    pub source_system_id: i64,
    pub domain: String,
    pub feed_type: String,
    pub source_event_id: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: Payload,
    pub ingested_at: DateTime<Utc>,
}

/// One row of the structured-entity dedup map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct IngestionMapping {
    #[serde(skip_serializing)]
    pub id: i64,
    pub tenant_id: i64,
    pub source_system_id: i64,
    pub source_event_id: String,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Tickets
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Ticket {
    #[serde(rename = "ticket_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub location_id: i64,
    pub business_day_id: Option<i64>,
    pub source_system_id: i64,
    pub external_ticket_id: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub status: String,
    pub covers: Option<i64>,
    pub channel_id: Option<i64>,
    pub gross_amount: Amount,
    pub discount_amount: Amount,
    pub tax_amount: Amount,
    pub net_amount: Amount,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TicketLineItem {
    #[serde(rename = "ticket_line_item_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub ticket_id: i64,
    pub external_line_id: Option<String>,
    pub item_id: Option<i64>,
    pub item_name_raw: Option<String>,
    pub qty: Quantity,
    pub uom: Option<String>,
    pub unit_price: Option<Amount>,
    pub gross_amount: Amount,
    pub discount_amount: Amount,
    pub tax_amount: Amount,
    pub net_amount: Amount,
    pub channel_id: Option<i64>,
    pub mapping_status: MappingStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TicketPayment {
    #[serde(rename = "ticket_payment_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub ticket_id: i64,
    pub tender_type: String,
    pub amount: Amount,
    pub paid_at: DateTime<Utc>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TicketDiscount {
    #[serde(rename = "ticket_discount_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub ticket_id: i64,
    pub amount: Amount,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TicketVoid {
    #[serde(rename = "ticket_void_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub ticket_id: i64,
    pub amount: Amount,
    pub reason: Option<String>,
    pub voided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TicketRefund {
    #[serde(rename = "ticket_refund_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub ticket_id: i64,
    pub amount: Amount,
    pub reason: Option<String>,
    pub refunded_at: DateTime<Utc>,
}

/// A ticket together with every child row it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub line_items: Vec<TicketLineItem>,
    pub payments: Vec<TicketPayment>,
    pub discounts: Vec<TicketDiscount>,
    pub voids: Vec<TicketVoid>,
    pub refunds: Vec<TicketRefund>,
}

// =============================================================================
// Operational Rows
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OpenCloseSignal {
    #[serde(rename = "open_close_signal_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub location_id: i64,
    pub business_day_id: Option<i64>,
    pub source_system_id: i64,
    pub signal_type: String,
    pub occurred_at: DateTime<Utc>,
    pub metadata: Option<Payload>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PosDowntimeEvent {
    #[serde(rename = "pos_downtime_event_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub location_id: i64,
    pub business_day_id: Option<i64>,
    pub source_system_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub metadata: Option<Payload>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LaborPunch {
    #[serde(rename = "labor_punch_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub location_id: i64,
    pub business_day_id: Option<i64>,
    pub source_system_id: i64,
    pub employee_id: i64,
    pub role: Option<String>,
    pub clock_in: DateTime<Utc>,
    pub clock_out: Option<DateTime<Utc>>,
    pub metadata: Option<Payload>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payout {
    #[serde(rename = "payout_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub location_id: Option<i64>,
    pub source_system_id: i64,
    pub provider: Option<String>,
    pub payout_reference: Option<String>,
    pub status: String,
    pub currency_code: String,
    pub amount: Amount,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub expected_payout_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub metadata: Option<Payload>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockoutEvent {
    #[serde(rename = "stockout_event_id")]
    pub id: i64,
    pub tenant_id: i64,
    pub location_id: i64,
    pub business_day_id: Option<i64>,
    pub source_system_id: i64,
    pub item_id: Option<i64>,
    pub item_name_raw: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub metadata: Option<Payload>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
