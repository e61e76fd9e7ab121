//! # Ledger Repository
//!
//! Append-only storage for raw external events.
//!
//! ## Append Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LedgerAppend { tenant, location?, route, source_system, day?, [..] }   │
//! │       │                                                                 │
//! │       ▼  one transaction for the whole batch                            │
//! │  for each event:                                                        │
//! │    no source_event_id ─────────► errors += "missing_source_event_id"    │
//! │    occurred_at = event_time > closed_at > ... > now                     │
//! │    INSERT ... ON CONFLICT DO NOTHING                                    │
//! │       ├── 1 row  ──────────────► inserted += 1                          │
//! │       └── 0 rows ──────────────► deduped  += 1                          │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ledger's dedup key is `(tenant, location, feed_type, domain,
//! source_event_id)`, enforced by a unique index on `ledger_events`. It is
//! independent of the structured-entity dedup map.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::DbResult;
use crate::pool::begin_write;
use crate::repository::{business_day, location, source_system};
use opsledger_core::ingest::WARN_MISSING_SOURCE_EVENT_ID;
use opsledger_core::ledger::{self, LedgerAppendOutcome, LedgerRoute};
use opsledger_core::page::{Page, PageRequest};
use opsledger_core::{LedgerEvent, Payload};

/// One ledger append request.
#[derive(Debug, Clone)]
pub struct LedgerAppend<'a> {
    pub tenant_id: i64,
    pub location_id: Option<i64>,
    pub route: &'a LedgerRoute,
    pub source_system_id: i64,
    pub business_day_id: Option<i64>,
    pub events: &'a [Value],
}

/// Appends a batch inside the caller's unit of work.
///
/// ## Errors
/// * `DbError::NotFound` - location, source system or business day does not
///   belong to the tenant
///
/// Per-event problems never fail the call; they land in `errors`.
pub async fn append(
    conn: &mut SqliteConnection,
    request: &LedgerAppend<'_>,
) -> DbResult<LedgerAppendOutcome> {
    if let Some(location_id) = request.location_id {
        location::find_for_tenant(conn, request.tenant_id, location_id).await?;
    }
    source_system::find_for_tenant(conn, request.tenant_id, request.source_system_id).await?;

    let business_day_id = match (request.route.carries_business_day(), request.business_day_id) {
        (true, Some(day_id)) => {
            if let Some(location_id) = request.location_id {
                business_day::find_for_location(conn, request.tenant_id, location_id, day_id)
                    .await?;
            }
            Some(day_id)
        }
        _ => None,
    };

    let mut outcome = LedgerAppendOutcome::new(request.route);
    let now = Utc::now();

    for event in request.events {
        let Some(fields) = event.as_object() else {
            outcome.errors.push(WARN_MISSING_SOURCE_EVENT_ID.to_string());
            continue;
        };
        let Some(source_event_id) = ledger::source_event_id(fields) else {
            outcome.errors.push(WARN_MISSING_SOURCE_EVENT_ID.to_string());
            continue;
        };

        let occurred_at = ledger::occurred_at(fields, now);
        let inserted = sqlx::query(
            r#"
            INSERT INTO ledger_events (
                tenant_id, location_id, business_day_id, source_system_id,
                domain, feed_type, source_event_id, occurred_at, payload, ingested_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(request.tenant_id)
        .bind(request.location_id)
        .bind(business_day_id)
        .bind(request.source_system_id)
        .bind(&request.route.domain)
        .bind(&request.route.feed_type)
        .bind(source_event_id)
        .bind(occurred_at)
        .bind(Payload(event.clone()))
        .bind(now)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if inserted == 1 {
            outcome.inserted += 1;
        } else {
            debug!(source_event_id, feed_type = %request.route.feed_type, "Ledger event deduped");
            outcome.deduped += 1;
        }
    }

    Ok(outcome)
}

// =============================================================================
// Repository
// =============================================================================

/// List filter for ledger rows.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerFilter {
    pub tenant_id: Option<i64>,
    pub location_id: Option<i64>,
    pub feed_type: Option<String>,
    pub domain: Option<String>,
    pub business_day_id: Option<i64>,
    pub occurred_from: Option<DateTime<Utc>>,
    pub occurred_to: Option<DateTime<Utc>>,
}

/// Repository for the raw-event ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Appends a batch in its own transaction. See [`append`].
    pub async fn append(&self, request: &LedgerAppend<'_>) -> DbResult<LedgerAppendOutcome> {
        let mut tx = begin_write(&self.pool).await?;
        let outcome = append(&mut tx, request).await?;
        tx.commit().await?;

        info!(
            tenant_id = request.tenant_id,
            ledger = %outcome.ledger,
            inserted = outcome.inserted,
            deduped = outcome.deduped,
            errors = outcome.errors.len(),
            "Ledger batch appended"
        );
        Ok(outcome)
    }

    /// Lists ledger rows by ascending id.
    pub async fn list(&self, filter: &LedgerFilter, page: &PageRequest) -> DbResult<Page<LedgerEvent>> {
        let rows: Vec<LedgerEvent> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, location_id, business_day_id, source_system_id,
                   domain, feed_type, source_event_id, occurred_at, payload, ingested_at
            FROM ledger_events
            WHERE (?1 IS NULL OR tenant_id = ?1)
              AND (?2 IS NULL OR location_id = ?2)
              AND (?3 IS NULL OR feed_type = ?3)
              AND (?4 IS NULL OR domain = ?4)
              AND (?5 IS NULL OR business_day_id = ?5)
              AND (?6 IS NULL OR occurred_at >= ?6)
              AND (?7 IS NULL OR occurred_at <= ?7)
              AND (?8 IS NULL OR id > ?8)
            ORDER BY id
            LIMIT ?9
            "#,
        )
        .bind(filter.tenant_id)
        .bind(filter.location_id)
        .bind(filter.feed_type.as_deref())
        .bind(filter.domain.as_deref())
        .bind(filter.business_day_id)
        .bind(filter.occurred_from)
        .bind(filter.occurred_to)
        .bind(page.cursor)
        .bind(page.fetch_limit())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::by_id(rows, page, |e| e.id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::testing::{seed_location, seed_source_system, seed_tenant};
    use crate::{Database, DbConfig};
    use serde_json::json;

    struct Fixture {
        db: Database,
        tenant: i64,
        location: i64,
        source: i64,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let location = seed_location(&db, tenant, "Asia/Karachi").await;
        let source = seed_source_system(&db, tenant).await;
        Fixture {
            db,
            tenant,
            location,
            source,
        }
    }

    fn request<'a>(f: &Fixture, route: &'a LedgerRoute, events: &'a [Value]) -> LedgerAppend<'a> {
        LedgerAppend {
            tenant_id: f.tenant,
            location_id: Some(f.location),
            route,
            source_system_id: f.source,
            business_day_id: None,
            events,
        }
    }

    #[tokio::test]
    async fn test_same_event_twice_is_deduped() {
        let f = fixture().await;
        let route = LedgerRoute::erp("sales");
        let events = vec![json!({"source_event_id": "S-1", "closed_at": "2026-01-15T12:40:00+05:00"})];

        let first = f.db.ledger().append(&request(&f, &route, &events)).await.unwrap();
        let second = f.db.ledger().append(&request(&f, &route, &events)).await.unwrap();

        assert_eq!((first.inserted, first.deduped), (1, 0));
        assert_eq!((second.inserted, second.deduped), (0, 1));
        assert_eq!(second.ledger, "ERP_SALES_LEDGER");

        let rows = f.db.ledger().list(&LedgerFilter::default(), &PageRequest::default()).await.unwrap();
        assert_eq!(rows.items.len(), 1);
        assert_eq!(rows.items[0].payload.as_value(), &events[0]);
    }

    #[tokio::test]
    async fn test_missing_event_id_does_not_abort_batch() {
        let f = fixture().await;
        let route = LedgerRoute::erp("payments-tender");
        let events = vec![
            json!({"source_event_id": "P-1"}),
            json!({"amount": "10.00"}),
            json!({"source_event_id": "P-3"}),
        ];

        let outcome = f.db.ledger().append(&request(&f, &route, &events)).await.unwrap();

        assert!(outcome.accepted);
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.errors, vec!["missing_source_event_id".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_inside_one_batch_counts_as_deduped() {
        let f = fixture().await;
        let route = LedgerRoute::erp("voids");
        let events = vec![json!({"source_event_id": "V-1"}), json!({"source_event_id": "V-1"})];

        let outcome = f.db.ledger().append(&request(&f, &route, &events)).await.unwrap();
        assert_eq!((outcome.inserted, outcome.deduped), (1, 1));
    }

    #[tokio::test]
    async fn test_feed_types_are_separate_keyspaces() {
        let f = fixture().await;
        let events = vec![json!({"source_event_id": "X-1"})];
        let sales = LedgerRoute::erp("sales");
        let refunds = LedgerRoute::erp("refunds");

        f.db.ledger().append(&request(&f, &sales, &events)).await.unwrap();
        let outcome = f.db.ledger().append(&request(&f, &refunds, &events)).await.unwrap();
        assert_eq!(outcome.inserted, 1);
    }

    #[tokio::test]
    async fn test_occurred_at_precedence_is_stored() {
        let f = fixture().await;
        let route = LedgerRoute::erp("sales");
        let events = vec![json!({
            "source_event_id": "S-9",
            "paid_at": "2026-01-15T12:41:00+05:00",
            "closed_at": "2026-01-15T12:40:00+05:00"
        })];

        f.db.ledger().append(&request(&f, &route, &events)).await.unwrap();
        let rows = f.db.ledger().list(&LedgerFilter::default(), &PageRequest::default()).await.unwrap();
        assert_eq!(
            rows.items[0].occurred_at,
            DateTime::parse_from_rfc3339("2026-01-15T07:40:00Z").unwrap().with_timezone(&Utc)
        );
    }

    #[tokio::test]
    async fn test_master_data_without_location_dedups() {
        let f = fixture().await;
        let route = LedgerRoute::master_data();
        let events = vec![json!({"source_event_id": "M-1", "item": "Chicken Pulao"})];
        let req = LedgerAppend {
            location_id: None,
            business_day_id: Some(12345),
            ..request(&f, &route, &events)
        };

        let first = f.db.ledger().append(&req).await.unwrap();
        let second = f.db.ledger().append(&req).await.unwrap();
        assert_eq!((first.inserted, second.deduped), (1, 1));

        let rows = f.db.ledger().list(&LedgerFilter::default(), &PageRequest::default()).await.unwrap();
        assert_eq!(rows.items[0].business_day_id, None);
        assert_eq!(rows.items[0].domain, "MASTER");
    }

    #[tokio::test]
    async fn test_foreign_location_is_not_found() {
        let f = fixture().await;
        let other_tenant = seed_tenant(&f.db).await;
        let route = LedgerRoute::erp("sales");
        let events = vec![json!({"source_event_id": "S-1"})];
        let req = LedgerAppend {
            tenant_id: other_tenant,
            ..request(&f, &route, &events)
        };

        let err = f.db.ledger().append(&req).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
