//! # Ticket Upsert
//!
//! ## One Ticket
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  any source_event_id empty ──► REJECTED missing_source_event_id         │
//! │  dedup(ticket) hit ──────────► UPDATED, resolved = {}                   │
//! │                                                                         │
//! │  SAVEPOINT                                                              │
//! │   1. channel  (tenant, provider, code) ──► channel_id | channel_not_mapped
//! │   2. ticket header, totals as reported                                  │
//! │   3. line items: item_id | external key | UNMAPPED + item_not_mapped    │
//! │      each line ──► dedup(ticket_line_item)                              │
//! │   4. payments, discounts, voids, refunds ──► dedup(<child type>)        │
//! │   5. dedup(ticket) last                                                 │
//! │  RELEASE ──────────────────────────────────► UPSERTED                   │
//! │                                                                         │
//! │  DedupConflict anywhere ──► ROLLBACK TO                                 │
//! │     dedup(ticket) now exists ──► UPDATED with the winner's id           │
//! │     otherwise ────────────────► REJECTED dedup_conflict                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use super::{savepoint, BatchScope, Ingestor};
use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use crate::repository::catalog;
use crate::repository::dedup;
use crate::repository::ticket::{self, TicketPlacement};
use opsledger_core::ingest::{
    BatchOutcome, IngestBatch, LineItemResolution, TicketInput, TicketLineItemInput,
    TicketResolution, TicketUpsertResult, UpsertStatus, WARN_CHANNEL_NOT_MAPPED,
    WARN_DEDUP_CONFLICT, WARN_ITEM_NOT_MAPPED, WARN_MISSING_SOURCE_EVENT_ID,
};
use opsledger_core::validation::ticket_event_ids_present;
use opsledger_core::{EntityType, MappingStatus};

impl Ingestor {
    /// Upserts a batch of POS tickets with all their children.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - location, source system or business day does
    ///   not belong to the tenant; nothing is written
    /// * any storage error; the whole batch is rolled back
    pub async fn bulk_upsert_tickets(
        &self,
        batch: &IngestBatch<TicketInput>,
    ) -> DbResult<BatchOutcome<TicketUpsertResult>> {
        let mut tx = begin_write(&self.pool).await?;
        let scope = BatchScope::load(
            &mut tx,
            batch.tenant_id,
            Some(batch.location_id),
            batch.source_system_id,
            batch.business_day_id,
        )
        .await?;

        let mut outcome = BatchOutcome::default();
        for input in &batch.items {
            outcome.push(upsert_ticket(&mut tx, &scope, batch.location_id, input).await?);
        }

        tx.commit().await?;
        info!(
            tenant_id = batch.tenant_id,
            location_id = batch.location_id,
            accepted = outcome.accepted,
            updated = outcome.updated,
            rejected = outcome.rejected,
            "Ticket batch upserted"
        );
        Ok(outcome)
    }
}

async fn upsert_ticket(
    conn: &mut SqliteConnection,
    scope: &BatchScope,
    location_id: i64,
    input: &TicketInput,
) -> DbResult<TicketUpsertResult> {
    if !ticket_event_ids_present(input) {
        debug!(source_event_id = %input.source_event_id, "Ticket rejected: missing event id");
        return Ok(TicketUpsertResult::rejected(
            &input.source_event_id,
            WARN_MISSING_SOURCE_EVENT_ID,
        ));
    }

    let key = scope.key(&input.source_event_id, EntityType::Ticket);
    if let Some(ticket_id) = dedup::lookup(conn, &key).await? {
        return Ok(TicketUpsertResult::updated(&input.source_event_id, ticket_id));
    }

    let mut item_tx = savepoint(conn).await?;
    match write_ticket(&mut item_tx, scope, location_id, input).await {
        Ok(result) => {
            item_tx.commit().await?;
            Ok(result)
        }
        Err(DbError::DedupConflict {
            entity_type,
            source_event_id,
            existing_entity_id,
        }) => {
            item_tx.rollback().await?;
            warn!(
                ticket = %input.source_event_id,
                %entity_type,
                conflicting_event = %source_event_id,
                existing_entity_id,
                "Ticket dedup conflict; savepoint rolled back"
            );
            match dedup::lookup(conn, &key).await? {
                Some(ticket_id) => Ok(TicketUpsertResult::updated(&input.source_event_id, ticket_id)),
                None => Ok(TicketUpsertResult::rejected(
                    &input.source_event_id,
                    WARN_DEDUP_CONFLICT,
                )),
            }
        }
        Err(err) => Err(err),
    }
}

/// Every write for one new ticket. Runs inside the ticket's savepoint.
async fn write_ticket(
    conn: &mut SqliteConnection,
    scope: &BatchScope,
    location_id: i64,
    input: &TicketInput,
) -> DbResult<TicketUpsertResult> {
    let tenant_id = scope.tenant_id;
    let mut warnings = Vec::new();

    let channel_id = match &input.channel {
        Some(channel) => {
            let found = catalog::channel_by_source_code(
                conn,
                tenant_id,
                channel.provider.as_deref(),
                &channel.source_channel_code,
            )
            .await?;
            if found.is_none() {
                warnings.push(WARN_CHANNEL_NOT_MAPPED.to_string());
            }
            found
        }
        None => None,
    };

    let totals = input.totals();
    if !totals.reconciles() {
        warn!(
            source_event_id = %input.source_event_id,
            gross = %totals.gross,
            drift = %totals.drift(),
            "Ticket totals do not reconcile; stored as reported"
        );
    }

    let placement = TicketPlacement {
        tenant_id,
        location_id,
        business_day_id: scope.business_day_id,
        source_system_id: scope.source_system_id,
        channel_id,
    };
    let ticket_id = ticket::insert_ticket(conn, &placement, input).await?;

    let mut line_items = Vec::with_capacity(input.line_items.len());
    for line in &input.line_items {
        let (item_id, mapping_status) = resolve_item(conn, scope, line).await?;
        if mapping_status == MappingStatus::Unmapped {
            warnings.push(WARN_ITEM_NOT_MAPPED.to_string());
        }
        let line_id = ticket::insert_line_item(
            conn,
            tenant_id,
            ticket_id,
            channel_id,
            line,
            item_id,
            mapping_status,
        )
        .await?;
        dedup::record(conn, &scope.key(&line.source_event_id, EntityType::TicketLineItem), line_id)
            .await?;

        line_items.push(LineItemResolution {
            source_event_id: line.source_event_id.clone(),
            ticket_line_item_id: line_id,
            item_id,
            mapping_status,
        });
    }

    let now = Utc::now();
    for payment in &input.payments {
        let id = ticket::insert_payment(conn, tenant_id, ticket_id, payment).await?;
        dedup::record(conn, &scope.key(&payment.source_event_id, EntityType::TicketPayment), id)
            .await?;
    }
    for discount in &input.discounts {
        let id = ticket::insert_discount(conn, tenant_id, ticket_id, discount).await?;
        dedup::record(conn, &scope.key(&discount.source_event_id, EntityType::TicketDiscount), id)
            .await?;
    }
    for void in &input.voids {
        let id = ticket::insert_void(conn, tenant_id, ticket_id, void, now).await?;
        dedup::record(conn, &scope.key(&void.source_event_id, EntityType::TicketVoid), id).await?;
    }
    for refund in &input.refunds {
        let id = ticket::insert_refund(conn, tenant_id, ticket_id, refund, now).await?;
        dedup::record(conn, &scope.key(&refund.source_event_id, EntityType::TicketRefund), id)
            .await?;
    }

    dedup::record(conn, &scope.key(&input.source_event_id, EntityType::Ticket), ticket_id).await?;

    Ok(TicketUpsertResult {
        source_event_id: input.source_event_id.clone(),
        ticket_id: Some(ticket_id),
        upsert_status: UpsertStatus::Upserted,
        resolved: Some(TicketResolution {
            business_day_id: scope.business_day_id,
            channel_id,
            line_items,
        }),
        warnings,
    })
}

/// A direct id of the tenant's own item wins; otherwise the source
/// system's external key. Another tenant's item id never maps.
async fn resolve_item(
    conn: &mut SqliteConnection,
    scope: &BatchScope,
    line: &TicketLineItemInput,
) -> DbResult<(Option<i64>, MappingStatus)> {
    if let Some(item_id) = line.item_id {
        if let Some(item_id) = catalog::item_for_tenant(conn, scope.tenant_id, item_id).await? {
            return Ok((Some(item_id), MappingStatus::Mapped));
        }
        debug!(item_id, tenant_id = scope.tenant_id, "Line item id not owned by tenant");
    }

    let Some(key) = line.external_item_key.as_deref() else {
        return Ok((None, MappingStatus::Unmapped));
    };

    let found =
        catalog::item_by_external_key(conn, scope.tenant_id, scope.source_system_id, key).await?;
    Ok(match found {
        Some(item_id) => (Some(item_id), MappingStatus::MappedByExternalItemKey),
        None => (None, MappingStatus::Unmapped),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
