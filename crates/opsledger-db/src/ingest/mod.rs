//! # Structured Ingestion
//!
//! Bulk upserts that turn external events into structured rows exactly once.
//!
//! ## Batch Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    BatchScope::load   location / source system / business day           │
//! │                       belong to the tenant, else NotFound (whole call)  │
//! │                                                                         │
//! │    for each item:                                                       │
//! │      empty source_event_id ──────────────► REJECTED                     │
//! │      dedup map hit ──────────────────────► UPDATED (no writes)          │
//! │      SAVEPOINT                                                          │
//! │        insert rows, record dedup entries                                │
//! │        ├── ok ─────────── RELEASE ───────► UPSERTED                     │
//! │        └── DedupConflict ─ ROLLBACK TO ──► UPDATED | REJECTED           │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A conflict means another writer recorded the same event first. It is
//! reported as a normal per-item outcome and never fails the batch. Any
//! other error aborts the whole batch and nothing is committed.

mod operations;
mod tickets;

use sqlx::{Connection, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::warn;

use crate::error::{DbError, DbResult};
use crate::repository::dedup::{self, DedupKey};
use crate::repository::{business_day, location, source_system};
use opsledger_core::ingest::{EntityUpsertResult, WARN_MISSING_SOURCE_EVENT_ID};
use opsledger_core::validation::has_source_event_id;
use opsledger_core::EntityType;

/// Entry point for every structured bulk upsert.
///
/// ## Example
/// ```rust,ignore
/// let outcome = db.ingest().bulk_upsert_tickets(&batch).await?;
/// println!("{} new, {} seen before", outcome.accepted, outcome.updated);
/// ```
#[derive(Debug, Clone)]
pub struct Ingestor {
    pool: SqlitePool,
}

impl Ingestor {
    /// Creates a new Ingestor.
    pub fn new(pool: SqlitePool) -> Self {
        Ingestor { pool }
    }
}

// =============================================================================
// Batch Scope
// =============================================================================

/// The validated placement shared by every item in a batch.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BatchScope {
    pub tenant_id: i64,
    pub location_id: Option<i64>,
    pub source_system_id: i64,
    pub business_day_id: Option<i64>,
}

impl BatchScope {
    /// Checks that every referenced row belongs to the tenant.
    pub async fn load(
        conn: &mut SqliteConnection,
        tenant_id: i64,
        location_id: Option<i64>,
        source_system_id: i64,
        business_day_id: Option<i64>,
    ) -> DbResult<Self> {
        if let Some(location_id) = location_id {
            location::find_for_tenant(conn, tenant_id, location_id).await?;
            if let Some(day_id) = business_day_id {
                business_day::find_for_location(conn, tenant_id, location_id, day_id).await?;
            }
        }
        source_system::find_for_tenant(conn, tenant_id, source_system_id).await?;

        Ok(BatchScope {
            tenant_id,
            location_id,
            source_system_id,
            business_day_id,
        })
    }

    pub fn key<'a>(&self, source_event_id: &'a str, entity_type: EntityType) -> DedupKey<'a> {
        DedupKey::new(self.tenant_id, self.source_system_id, source_event_id, entity_type)
    }
}

// =============================================================================
// Shared Item Steps
// =============================================================================

/// Opens a savepoint inside the batch transaction.
pub(crate) async fn savepoint(conn: &mut SqliteConnection) -> DbResult<Transaction<'_, Sqlite>> {
    Ok(conn.begin().await?)
}

/// Short-circuits items that need no writes.
///
/// ## Returns
/// * `Some(REJECTED)` - no `source_event_id`
/// * `Some(UPDATED)` - the event already produced an entity
/// * `None` - the item should be written
pub(crate) async fn precheck(
    conn: &mut SqliteConnection,
    key: &DedupKey<'_>,
) -> DbResult<Option<EntityUpsertResult>> {
    if !has_source_event_id(key.source_event_id) {
        return Ok(Some(EntityUpsertResult::rejected(
            key.source_event_id,
            WARN_MISSING_SOURCE_EVENT_ID,
        )));
    }

    let existing = dedup::lookup(conn, key).await?;
    Ok(existing.map(|entity_id| EntityUpsertResult::updated(key.source_event_id, entity_id)))
}

/// Records the dedup row for a freshly written entity and closes its savepoint.
pub(crate) async fn finish_entity(
    mut item_tx: Transaction<'_, Sqlite>,
    key: &DedupKey<'_>,
    written: DbResult<i64>,
) -> DbResult<EntityUpsertResult> {
    let recorded = match written {
        Ok(entity_id) => dedup::record(&mut item_tx, key, entity_id)
            .await
            .map(|()| entity_id),
        Err(err) => Err(err),
    };

    match recorded {
        Ok(entity_id) => {
            item_tx.commit().await?;
            Ok(EntityUpsertResult::upserted(key.source_event_id, entity_id))
        }
        Err(DbError::DedupConflict {
            existing_entity_id, ..
        }) => {
            item_tx.rollback().await?;
            warn!(
                entity_type = %key.entity_type,
                source_event_id = %key.source_event_id,
                existing_entity_id,
                "Lost dedup race; reporting existing entity"
            );
            Ok(EntityUpsertResult::updated(key.source_event_id, existing_entity_id))
        }
        Err(err) => Err(err),
    }
}
