//! # Dedup Map
//!
//! Records which internal entity each external event produced.
//!
//! ## Keyspace
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  (tenant_id, source_system_id, source_event_id, entity_type) UNIQUE    │
//! │                                                                         │
//! │  record(key, 42)   no row        → INSERT                    Ok         │
//! │  record(key, 42)   row → 42      → nothing                   Ok         │
//! │  record(key, 43)   row → 42      → nothing                   Conflict   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are never updated or deleted. The insert uses `ON CONFLICT DO
//! NOTHING`, so a racing writer cannot overwrite the winner: the loser reads
//! the winner's row back and compares ids.

use chrono::Utc;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use opsledger_core::page::{Page, PageRequest};
use opsledger_core::{EntityType, IngestionMapping};

/// Identity of one external event within one entity type.
#[derive(Debug, Clone, Copy)]
pub struct DedupKey<'a> {
    pub tenant_id: i64,
    pub source_system_id: i64,
    pub source_event_id: &'a str,
    pub entity_type: EntityType,
}

impl<'a> DedupKey<'a> {
    pub fn new(
        tenant_id: i64,
        source_system_id: i64,
        source_event_id: &'a str,
        entity_type: EntityType,
    ) -> Self {
        DedupKey {
            tenant_id,
            source_system_id,
            source_event_id,
            entity_type,
        }
    }
}

/// Returns the entity an event already produced, if any.
pub async fn lookup(conn: &mut SqliteConnection, key: &DedupKey<'_>) -> DbResult<Option<i64>> {
    let entity_id: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT entity_id FROM ingestion_event_map
        WHERE tenant_id = ?1 AND source_system_id = ?2
          AND source_event_id = ?3 AND entity_type = ?4
        "#,
    )
    .bind(key.tenant_id)
    .bind(key.source_system_id)
    .bind(key.source_event_id)
    .bind(key.entity_type)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(entity_id)
}

/// Records that an event produced `entity_id`.
///
/// ## Returns
/// * `Ok(())` - recorded now, or already recorded with the same id
/// * `Err(DbError::DedupConflict)` - already recorded with a different id
pub async fn record(
    conn: &mut SqliteConnection,
    key: &DedupKey<'_>,
    entity_id: i64,
) -> DbResult<()> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO ingestion_event_map (
            tenant_id, source_system_id, source_event_id, entity_type, entity_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(key.tenant_id)
    .bind(key.source_system_id)
    .bind(key.source_event_id)
    .bind(key.entity_type)
    .bind(entity_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted == 1 {
        debug!(
            entity_type = %key.entity_type,
            source_event_id = %key.source_event_id,
            entity_id,
            "Recorded dedup mapping"
        );
        return Ok(());
    }

    match lookup(conn, key).await? {
        Some(existing) if existing == entity_id => Ok(()),
        Some(existing) => Err(DbError::DedupConflict {
            entity_type: key.entity_type,
            source_event_id: key.source_event_id.to_string(),
            existing_entity_id: existing,
        }),
        None => Err(DbError::Internal(format!(
            "dedup insert for {} '{}' was ignored but no row exists",
            key.entity_type, key.source_event_id
        ))),
    }
}

// =============================================================================
// Reads
// =============================================================================

/// Filter for listing the dedup map. Equality matching only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DedupFilter {
    pub source_system_id: Option<i64>,
    pub entity_type: Option<EntityType>,
    pub source_event_id: Option<String>,
}

/// Read access to the dedup map.
#[derive(Debug, Clone)]
pub struct DedupRepository {
    pool: SqlitePool,
}

impl DedupRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DedupRepository { pool }
    }

    /// Single-event lookup outside a unit of work.
    pub async fn lookup(&self, key: &DedupKey<'_>) -> DbResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        lookup(&mut conn, key).await
    }

    /// Lists mappings for a tenant. Uses offset pagination.
    pub async fn list(
        &self,
        tenant_id: i64,
        filter: &DedupFilter,
        page: &PageRequest,
    ) -> DbResult<Page<IngestionMapping>> {
        let rows: Vec<IngestionMapping> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, source_system_id, source_event_id,
                   entity_type, entity_id, created_at
            FROM ingestion_event_map
            WHERE tenant_id = ?1
              AND (?2 IS NULL OR source_system_id = ?2)
              AND (?3 IS NULL OR entity_type = ?3)
              AND (?4 IS NULL OR source_event_id = ?4)
            ORDER BY id
            LIMIT ?5 OFFSET ?6
            "#,
        )
        .bind(tenant_id)
        .bind(filter.source_system_id)
        .bind(filter.entity_type)
        .bind(filter.source_event_id.as_deref())
        .bind(page.fetch_limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::by_offset(rows, page))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_source_system, seed_tenant};
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_record_then_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let source = seed_source_system(&db, tenant).await;
        let mut conn = db.pool().acquire().await.unwrap();

        let key = DedupKey::new(tenant, source, "T-1", EntityType::Ticket);
        assert_eq!(lookup(&mut conn, &key).await.unwrap(), None);

        record(&mut conn, &key, 42).await.unwrap();
        assert_eq!(lookup(&mut conn, &key).await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn test_same_id_is_noop_and_different_id_conflicts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let source = seed_source_system(&db, tenant).await;
        let mut conn = db.pool().acquire().await.unwrap();

        let key = DedupKey::new(tenant, source, "T-1", EntityType::Ticket);
        record(&mut conn, &key, 42).await.unwrap();
        record(&mut conn, &key, 42).await.unwrap();

        let err = record(&mut conn, &key, 43).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::DedupConflict { existing_entity_id: 42, .. }
        ));
        assert_eq!(lookup(&mut conn, &key).await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn test_entity_types_are_separate_keyspaces() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let source = seed_source_system(&db, tenant).await;
        let mut conn = db.pool().acquire().await.unwrap();

        let ticket = DedupKey::new(tenant, source, "E-1", EntityType::Ticket);
        let payout = DedupKey::new(tenant, source, "E-1", EntityType::Payout);
        record(&mut conn, &ticket, 1).await.unwrap();
        record(&mut conn, &payout, 2).await.unwrap();

        assert_eq!(lookup(&mut conn, &ticket).await.unwrap(), Some(1));
        assert_eq!(lookup(&mut conn, &payout).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_list_uses_offset_cursor() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let source = seed_source_system(&db, tenant).await;
        {
            let mut conn = db.pool().acquire().await.unwrap();
            for (i, id) in ["A", "B", "C"].iter().enumerate() {
                let key = DedupKey::new(tenant, source, id, EntityType::Payout);
                record(&mut conn, &key, i as i64 + 1).await.unwrap();
            }
        }

        let repo = db.dedup();
        let first = repo
            .list(tenant, &DedupFilter::default(), &PageRequest { limit: 2, cursor: None })
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next_cursor, Some(2));

        let second = repo
            .list(tenant, &DedupFilter::default(), &PageRequest { limit: 2, cursor: Some(2) })
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].source_event_id, "C");
        assert_eq!(second.next_cursor, None);
    }
}
