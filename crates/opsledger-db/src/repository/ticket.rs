//! # Ticket Repository
//!
//! Row-level writes for tickets and their children, and the ticket reads.
//!
//! ## Ticket Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tickets                                                                │
//! │  ├── ticket_line_items   item_id? + mapping_status + channel_id?        │
//! │  ├── ticket_payments     tender_type, amount, paid_at                   │
//! │  ├── ticket_discounts    amount, reason?                                │
//! │  ├── ticket_voids        amount, reason?, voided_at                     │
//! │  └── ticket_refunds      amount, reason?, refunded_at                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The insert functions only write rows. Dedup, channel and item resolution
//! live in [`crate::ingest`], which calls these inside its savepoints.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DbError, DbResult};
use opsledger_core::ingest::{
    TicketDiscountInput, TicketInput, TicketLineItemInput, TicketPaymentInput, TicketRefundInput,
    TicketVoidInput,
};
use opsledger_core::page::{Page, PageRequest};
use opsledger_core::{
    MappingStatus, Ticket, TicketDetail, TicketDiscount, TicketLineItem, TicketPayment,
    TicketRefund, TicketVoid,
};

const TICKET_COLUMNS: &str = "id, tenant_id, location_id, business_day_id, source_system_id, \
     external_ticket_id, opened_at, closed_at, status, covers, channel_id, \
     gross_amount, discount_amount, tax_amount, net_amount, created_at";

const LINE_ITEM_COLUMNS: &str = "id, tenant_id, ticket_id, external_line_id, item_id, \
     item_name_raw, qty, uom, unit_price, gross_amount, discount_amount, tax_amount, \
     net_amount, channel_id, mapping_status";

// =============================================================================
// Inserts
// =============================================================================

/// Where a ticket header lands.
#[derive(Debug, Clone, Copy)]
pub struct TicketPlacement {
    pub tenant_id: i64,
    pub location_id: i64,
    pub business_day_id: Option<i64>,
    pub source_system_id: i64,
    pub channel_id: Option<i64>,
}

/// Inserts the ticket header with the totals exactly as reported.
pub async fn insert_ticket(
    conn: &mut SqliteConnection,
    placement: &TicketPlacement,
    input: &TicketInput,
) -> DbResult<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO tickets (
            tenant_id, location_id, business_day_id, source_system_id,
            external_ticket_id, opened_at, closed_at, status, covers, channel_id,
            gross_amount, discount_amount, tax_amount, net_amount, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        RETURNING id
        "#,
    )
    .bind(placement.tenant_id)
    .bind(placement.location_id)
    .bind(placement.business_day_id)
    .bind(placement.source_system_id)
    .bind(input.external_ticket_id.as_deref())
    .bind(input.opened_at)
    .bind(input.closed_at)
    .bind(&input.status)
    .bind(input.covers)
    .bind(placement.channel_id)
    .bind(input.gross_amount)
    .bind(input.discount_amount)
    .bind(input.tax_amount)
    .bind(input.net_amount)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Inserts a line item with its resolved item and the ticket's channel.
pub async fn insert_line_item(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    ticket_id: i64,
    channel_id: Option<i64>,
    line: &TicketLineItemInput,
    item_id: Option<i64>,
    mapping_status: MappingStatus,
) -> DbResult<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO ticket_line_items (
            tenant_id, ticket_id, external_line_id, item_id, item_name_raw,
            qty, uom, unit_price, gross_amount, discount_amount, tax_amount,
            net_amount, channel_id, mapping_status
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        RETURNING id
        "#,
    )
    .bind(tenant_id)
    .bind(ticket_id)
    .bind(line.external_line_id.as_deref())
    .bind(item_id)
    .bind(line.item_name_raw.as_deref())
    .bind(line.qty)
    .bind(line.uom.as_deref())
    .bind(line.unit_price)
    .bind(line.gross_amount)
    .bind(line.discount_amount)
    .bind(line.tax_amount)
    .bind(line.net_amount)
    .bind(channel_id)
    .bind(mapping_status)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

pub async fn insert_payment(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    ticket_id: i64,
    payment: &TicketPaymentInput,
) -> DbResult<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO ticket_payments (tenant_id, ticket_id, tender_type, amount, paid_at, reference)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        RETURNING id
        "#,
    )
    .bind(tenant_id)
    .bind(ticket_id)
    .bind(&payment.tender_type)
    .bind(payment.amount)
    .bind(payment.paid_at)
    .bind(payment.reference.as_deref())
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

pub async fn insert_discount(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    ticket_id: i64,
    discount: &TicketDiscountInput,
) -> DbResult<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO ticket_discounts (tenant_id, ticket_id, amount, reason)
        VALUES (?1, ?2, ?3, ?4)
        RETURNING id
        "#,
    )
    .bind(tenant_id)
    .bind(ticket_id)
    .bind(discount.amount)
    .bind(discount.reason.as_deref())
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Voids carry no timestamp of their own; the caller stamps `voided_at`.
pub async fn insert_void(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    ticket_id: i64,
    void: &TicketVoidInput,
    voided_at: DateTime<Utc>,
) -> DbResult<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO ticket_voids (tenant_id, ticket_id, amount, reason, voided_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING id
        "#,
    )
    .bind(tenant_id)
    .bind(ticket_id)
    .bind(void.amount)
    .bind(void.reason.as_deref())
    .bind(voided_at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Uses the refund's own `refunded_at`, else `fallback`.
pub async fn insert_refund(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    ticket_id: i64,
    refund: &TicketRefundInput,
    fallback: DateTime<Utc>,
) -> DbResult<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO ticket_refunds (tenant_id, ticket_id, amount, reason, refunded_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING id
        "#,
    )
    .bind(tenant_id)
    .bind(ticket_id)
    .bind(refund.amount)
    .bind(refund.reason.as_deref())
    .bind(refund.refunded_at.unwrap_or(fallback))
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

// =============================================================================
// Reads
// =============================================================================

/// List filter for tickets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketFilter {
    pub tenant_id: Option<i64>,
    pub location_id: Option<i64>,
    pub business_day_id: Option<i64>,
    pub status: Option<String>,
    pub source_system_id: Option<i64>,
    pub channel_id: Option<i64>,
    pub opened_from: Option<DateTime<Utc>>,
    pub opened_to: Option<DateTime<Utc>>,
}

/// Read access to tickets and their children.
#[derive(Debug, Clone)]
pub struct TicketRepository {
    pool: SqlitePool,
}

impl TicketRepository {
    /// Creates a new TicketRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TicketRepository { pool }
    }

    /// Gets a ticket header, scoped to a tenant.
    pub async fn get_ticket(&self, tenant_id: i64, ticket_id: i64) -> DbResult<Ticket> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1 AND tenant_id = ?2");
        sqlx::query_as(&sql)
            .bind(ticket_id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Ticket", ticket_id))
    }

    /// Gets a ticket with every child row.
    pub async fn get(&self, tenant_id: i64, ticket_id: i64) -> DbResult<TicketDetail> {
        let ticket = self.get_ticket(tenant_id, ticket_id).await?;

        Ok(TicketDetail {
            line_items: self.line_items(tenant_id, ticket.id).await?,
            payments: self.payments(tenant_id, ticket.id).await?,
            discounts: self.discounts(tenant_id, ticket.id).await?,
            voids: self.voids(tenant_id, ticket.id).await?,
            refunds: self.refunds(tenant_id, ticket.id).await?,
            ticket,
        })
    }

    /// Lists ticket headers by ascending id.
    pub async fn list(&self, filter: &TicketFilter, page: &PageRequest) -> DbResult<Page<Ticket>> {
        let sql = format!(
            r#"
            SELECT {TICKET_COLUMNS} FROM tickets
            WHERE (?1 IS NULL OR tenant_id = ?1)
              AND (?2 IS NULL OR location_id = ?2)
              AND (?3 IS NULL OR business_day_id = ?3)
              AND (?4 IS NULL OR status = ?4)
              AND (?5 IS NULL OR source_system_id = ?5)
              AND (?6 IS NULL OR channel_id = ?6)
              AND (?7 IS NULL OR opened_at >= ?7)
              AND (?8 IS NULL OR opened_at <= ?8)
              AND (?9 IS NULL OR id > ?9)
            ORDER BY id
            LIMIT ?10
            "#
        );
        let rows: Vec<Ticket> = sqlx::query_as(&sql)
            .bind(filter.tenant_id)
            .bind(filter.location_id)
            .bind(filter.business_day_id)
            .bind(filter.status.as_deref())
            .bind(filter.source_system_id)
            .bind(filter.channel_id)
            .bind(filter.opened_from)
            .bind(filter.opened_to)
            .bind(page.cursor)
            .bind(page.fetch_limit())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::by_id(rows, page, |t| t.id))
    }

    pub async fn line_items(&self, tenant_id: i64, ticket_id: i64) -> DbResult<Vec<TicketLineItem>> {
        let sql = format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM ticket_line_items \
             WHERE tenant_id = ?1 AND ticket_id = ?2 ORDER BY id"
        );
        let rows = sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(ticket_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn payments(&self, tenant_id: i64, ticket_id: i64) -> DbResult<Vec<TicketPayment>> {
        let rows = sqlx::query_as(
            r#"
            SELECT id, tenant_id, ticket_id, tender_type, amount, paid_at, reference
            FROM ticket_payments
            WHERE tenant_id = ?1 AND ticket_id = ?2
            ORDER BY id
            "#,
        )
        .bind(tenant_id)
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn discounts(&self, tenant_id: i64, ticket_id: i64) -> DbResult<Vec<TicketDiscount>> {
        let rows = sqlx::query_as(
            r#"
            SELECT id, tenant_id, ticket_id, amount, reason
            FROM ticket_discounts
            WHERE tenant_id = ?1 AND ticket_id = ?2
            ORDER BY id
            "#,
        )
        .bind(tenant_id)
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn voids(&self, tenant_id: i64, ticket_id: i64) -> DbResult<Vec<TicketVoid>> {
        let rows = sqlx::query_as(
            r#"
            SELECT id, tenant_id, ticket_id, amount, reason, voided_at
            FROM ticket_voids
            WHERE tenant_id = ?1 AND ticket_id = ?2
            ORDER BY id
            "#,
        )
        .bind(tenant_id)
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn refunds(&self, tenant_id: i64, ticket_id: i64) -> DbResult<Vec<TicketRefund>> {
        let rows = sqlx::query_as(
            r#"
            SELECT id, tenant_id, ticket_id, amount, reason, refunded_at
            FROM ticket_refunds
            WHERE tenant_id = ?1 AND ticket_id = ?2
            ORDER BY id
            "#,
        )
        .bind(tenant_id)
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
