//! # Business Day Resolver
//!
//! Resolve-or-create of the canonical business day for a location.
//!
//! ## Resolution Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  resolve(tenant, location, instant)      ensure(tenant, location, date) │
//! │       │                                         │                       │
//! │       ▼                                         │                       │
//! │  location (tenant-scoped) → zone, cutover       │                       │
//! │       │                                         │                       │
//! │       ▼                                         ▼                       │
//! │  window_for_instant ──────────────────► window_for_date                 │
//! │                          │                                              │
//! │                          ▼                                              │
//! │         SELECT by (tenant, location, business_date)                     │
//! │                          │                                              │
//! │             found ───────┴──────── missing                              │
//! │               │                       │                                 │
//! │               │                       ▼                                 │
//! │               │        planned hours (exception > weekday row)          │
//! │               │        INSERT ... ON CONFLICT DO NOTHING                │
//! │               │        SELECT the single winner row                     │
//! │               ▼                       ▼                                 │
//! │          stored row, bounds never recomputed                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use crate::repository::location;
use opsledger_core::calendar::{
    parse_timezone, planned_window, window_for_date, window_for_instant, BusinessDayWindow,
};
use opsledger_core::page::{Page, PageRequest};
use opsledger_core::{BusinessDay, Location};

const COLUMNS: &str = "id, tenant_id, location_id, business_date, starts_at, ends_at, \
     planned_open_at, planned_close_at, actual_open_at, actual_close_at, late_open, early_close";

// =============================================================================
// Unit-of-work Operations
// =============================================================================

/// Business day containing `instant` at the location, created on first use.
///
/// ## Errors
/// * `DbError::NotFound` - location absent or owned by another tenant
pub async fn resolve(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    location_id: i64,
    instant: DateTime<Utc>,
) -> DbResult<BusinessDay> {
    let location = location::find_for_tenant(conn, tenant_id, location_id).await?;
    let tz = parse_timezone(&location.timezone)?;
    let cutover = location::cutover(conn, tenant_id, location_id).await?;
    let window = window_for_instant(instant, cutover, tz)?;

    debug!(
        location_id,
        instant = %instant,
        business_date = %window.business_date,
        "Resolved business date"
    );
    ensure_window(conn, &location, tz, window).await
}

/// Business day for an explicit date, created on first use.
pub async fn ensure(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    location_id: i64,
    business_date: NaiveDate,
) -> DbResult<BusinessDay> {
    let location = location::find_for_tenant(conn, tenant_id, location_id).await?;
    let tz = parse_timezone(&location.timezone)?;
    let cutover = location::cutover(conn, tenant_id, location_id).await?;
    let window = window_for_date(business_date, cutover, tz)?;

    ensure_window(conn, &location, tz, window).await
}

/// Loads a business day and checks it belongs to the tenant and location.
pub async fn find_for_location(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    location_id: i64,
    business_day_id: i64,
) -> DbResult<BusinessDay> {
    let sql = format!(
        "SELECT {COLUMNS} FROM business_days WHERE id = ?1 AND tenant_id = ?2 AND location_id = ?3"
    );
    sqlx::query_as(&sql)
        .bind(business_day_id)
        .bind(tenant_id)
        .bind(location_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("BusinessDay", business_day_id))
}

async fn find_by_date(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    location_id: i64,
    business_date: NaiveDate,
) -> DbResult<Option<BusinessDay>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM business_days \
         WHERE tenant_id = ?1 AND location_id = ?2 AND business_date = ?3"
    );
    let day = sqlx::query_as(&sql)
        .bind(tenant_id)
        .bind(location_id)
        .bind(business_date)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(day)
}

async fn ensure_window(
    conn: &mut SqliteConnection,
    location: &Location,
    tz: Tz,
    window: BusinessDayWindow,
) -> DbResult<BusinessDay> {
    if let Some(existing) =
        find_by_date(conn, location.tenant_id, location.id, window.business_date).await?
    {
        return Ok(existing);
    }

    let hours =
        location::hours_for_date(conn, location.tenant_id, location.id, window.business_date)
            .await?;
    let planned = planned_window(window.business_date, hours, tz)?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO business_days (
            tenant_id, location_id, business_date, starts_at, ends_at,
            planned_open_at, planned_close_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT (tenant_id, location_id, business_date) DO NOTHING
        "#,
    )
    .bind(location.tenant_id)
    .bind(location.id)
    .bind(window.business_date)
    .bind(window.starts_at)
    .bind(window.ends_at)
    .bind(planned.map(|(open, _)| open))
    .bind(planned.map(|(_, close)| close))
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted == 1 {
        info!(
            location_id = location.id,
            business_date = %window.business_date,
            starts_at = %window.starts_at,
            "Business day created"
        );
    }

    find_by_date(conn, location.tenant_id, location.id, window.business_date)
        .await?
        .ok_or_else(|| DbError::Internal("business day vanished after insert".to_string()))
}

// =============================================================================
// Repository
// =============================================================================

/// List filter for business days. Dates are inclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessDayFilter {
    pub tenant_id: Option<i64>,
    pub location_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Repository for business days.
#[derive(Debug, Clone)]
pub struct BusinessDayRepository {
    pool: SqlitePool,
}

impl BusinessDayRepository {
    /// Creates a new BusinessDayRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BusinessDayRepository { pool }
    }

    /// See [`resolve`].
    pub async fn resolve(
        &self,
        tenant_id: i64,
        location_id: i64,
        instant: DateTime<Utc>,
    ) -> DbResult<BusinessDay> {
        let mut tx = begin_write(&self.pool).await?;
        let day = resolve(&mut tx, tenant_id, location_id, instant).await?;
        tx.commit().await?;
        Ok(day)
    }

    /// See [`ensure`].
    pub async fn ensure(
        &self,
        tenant_id: i64,
        location_id: i64,
        business_date: NaiveDate,
    ) -> DbResult<BusinessDay> {
        let mut tx = begin_write(&self.pool).await?;
        let day = ensure(&mut tx, tenant_id, location_id, business_date).await?;
        tx.commit().await?;
        Ok(day)
    }

    /// Gets a business day by id.
    pub async fn get(&self, id: i64) -> DbResult<BusinessDay> {
        let sql = format!("SELECT {COLUMNS} FROM business_days WHERE id = ?1");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("BusinessDay", id))
    }

    /// Lists business days by ascending id.
    pub async fn list(
        &self,
        filter: &BusinessDayFilter,
        page: &PageRequest,
    ) -> DbResult<Page<BusinessDay>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM business_days \
             WHERE (?1 IS NULL OR tenant_id = ?1) \
               AND (?2 IS NULL OR location_id = ?2) \
               AND (?3 IS NULL OR business_date >= ?3) \
               AND (?4 IS NULL OR business_date <= ?4) \
               AND (?5 IS NULL OR id > ?5) \
             ORDER BY id LIMIT ?6"
        );
        let rows: Vec<BusinessDay> = sqlx::query_as(&sql)
            .bind(filter.tenant_id)
            .bind(filter.location_id)
            .bind(filter.from)
            .bind(filter.to)
            .bind(page.cursor)
            .bind(page.fetch_limit())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::by_id(rows, page, |d| d.id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_location, seed_tenant};
    use crate::{Database, DbConfig};
    use opsledger_core::calendar::BUSINESS_DAY_SPAN_SECONDS;
    use opsledger_core::reference::{DayHoursInput, LocationHoursInput};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_twice_returns_same_row() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let location = seed_location(&db, tenant, "Asia/Karachi").await;
        let at = utc("2026-01-15T12:10:00+05:00");

        let first = db.business_days().resolve(tenant, location, at).await.unwrap();
        let second = db.business_days().resolve(tenant, location, at).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.business_date, date(2026, 1, 15));
        assert_eq!(first.starts_at, utc("2026-01-15T00:00:00Z"));
        assert_eq!(first.ends_at, utc("2026-01-15T23:59:59Z"));
    }

    #[tokio::test]
    async fn test_cutover_boundary() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let location = seed_location(&db, tenant, "Asia/Karachi").await;
        let days = db.business_days();

        let late = days
            .resolve(tenant, location, utc("2026-01-16T04:59:00+05:00"))
            .await
            .unwrap();
        let early = days
            .resolve(tenant, location, utc("2026-01-16T05:00:00+05:00"))
            .await
            .unwrap();

        assert_eq!(late.business_date, date(2026, 1, 15));
        assert_eq!(early.business_date, date(2026, 1, 16));
        assert_ne!(late.id, early.id);
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent_and_spans_a_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let location = seed_location(&db, tenant, "Asia/Karachi").await;

        let first = db.business_days().ensure(tenant, location, date(2026, 1, 15)).await.unwrap();
        let second = db.business_days().ensure(tenant, location, date(2026, 1, 15)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(
            (first.ends_at - first.starts_at).num_seconds(),
            BUSINESS_DAY_SPAN_SECONDS
        );

        let resolved = db
            .business_days()
            .resolve(tenant, location, utc("2026-01-15T20:00:00+05:00"))
            .await
            .unwrap();
        assert_eq!(resolved.id, first.id);
    }

    #[tokio::test]
    async fn test_other_tenant_cannot_resolve_location() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let owner = seed_tenant(&db).await;
        let intruder = seed_tenant(&db).await;
        let location = seed_location(&db, owner, "Asia/Karachi").await;

        let err = db
            .business_days()
            .ensure(intruder, location, date(2026, 1, 15))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_planned_hours_filled_at_creation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let location = seed_location(&db, tenant, "Asia/Karachi").await;

        // Thursday 11:00 to 02:00 the next morning
        db.locations()
            .replace_hours(
                location,
                &LocationHoursInput {
                    tenant_id: tenant,
                    business_day_cutover_local: None,
                    days: vec![DayHoursInput {
                        day_of_week: 3,
                        open_local: Some("11:00".to_string()),
                        close_local: Some("02:00".to_string()),
                        is_closed: false,
                    }],
                },
            )
            .await
            .unwrap();

        let thursday = db.business_days().ensure(tenant, location, date(2026, 1, 15)).await.unwrap();
        assert_eq!(thursday.planned_open_at, Some(utc("2026-01-15T06:00:00Z")));
        assert_eq!(thursday.planned_close_at, Some(utc("2026-01-15T21:00:00Z")));
        assert_eq!(thursday.actual_open_at, None);

        // no Friday row
        let friday = db.business_days().ensure(tenant, location, date(2026, 1, 16)).await.unwrap();
        assert_eq!(friday.planned_open_at, None);
    }

    #[tokio::test]
    async fn test_list_filters_by_date_range() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let location = seed_location(&db, tenant, "UTC").await;
        for day in 10..15 {
            db.business_days().ensure(tenant, location, date(2026, 1, day)).await.unwrap();
        }

        let filter = BusinessDayFilter {
            tenant_id: Some(tenant),
            location_id: Some(location),
            from: Some(date(2026, 1, 11)),
            to: Some(date(2026, 1, 13)),
        };
        let page = db.business_days().list(&filter, &PageRequest::default()).await.unwrap();

        let dates: Vec<NaiveDate> = page.items.iter().map(|d| d.business_date).collect();
        assert_eq!(dates, vec![date(2026, 1, 11), date(2026, 1, 12), date(2026, 1, 13)]);
    }
}
