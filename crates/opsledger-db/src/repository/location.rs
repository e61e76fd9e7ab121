//! # Location Repository
//!
//! Locations, their weekly hours and dated exceptions.
//!
//! ## Hours Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  location_hours            one row per weekday (0 = Monday)             │
//! │  ├── open_local / close_local / is_closed                               │
//! │  └── business_day_cutover_local   same value on every row               │
//! │                                                                         │
//! │  location_hours_exceptions  at most one row per local date              │
//! │  └── overrides the weekday row for that date                            │
//! │                                                                         │
//! │  cutover lookup: first row by id, any weekday; 05:00 if none            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Functions taking `&mut SqliteConnection` run inside the caller's unit of
//! work; [`LocationRepository`] wraps them for standalone use.

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use opsledger_core::calendar::{
    default_cutover, effective_hours, weekday_index, HoursOverride, OpeningHours,
};
use opsledger_core::page::{Page, PageRequest};
use opsledger_core::reference::{LocationHoursInput, NewHoursException, NewLocation};
use opsledger_core::validation::{
    validate_currency_code, validate_hours_exception, validate_location_hours, validate_name,
    validate_timezone,
};
use opsledger_core::{Location, LocationHours, LocationHoursException};

const LOCATION_COLUMNS: &str =
    "id, tenant_id, name, timezone, currency_code, is_active, created_at";

// =============================================================================
// Unit-of-work Lookups
// =============================================================================

/// Loads a location, failing with `NotFound` unless it belongs to the tenant.
pub async fn find_for_tenant(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    location_id: i64,
) -> DbResult<Location> {
    let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?1 AND tenant_id = ?2");
    sqlx::query_as(&sql)
        .bind(location_id)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Location", location_id))
}

/// The location's business-day cutover (05:00 when no hours exist).
pub async fn cutover(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    location_id: i64,
) -> DbResult<NaiveTime> {
    let cutover: Option<NaiveTime> = sqlx::query_scalar(
        r#"
        SELECT business_day_cutover_local FROM location_hours
        WHERE tenant_id = ?1 AND location_id = ?2
        ORDER BY id
        LIMIT 1
        "#,
    )
    .bind(tenant_id)
    .bind(location_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(cutover.unwrap_or_else(default_cutover))
}

/// Effective opening hours for one local date: the exception if present,
/// merged over the weekday row.
pub async fn hours_for_date(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    location_id: i64,
    date: NaiveDate,
) -> DbResult<Option<OpeningHours>> {
    let weekly: Option<(NaiveTime, NaiveTime, bool)> = sqlx::query_as(
        r#"
        SELECT open_local, close_local, is_closed FROM location_hours
        WHERE tenant_id = ?1 AND location_id = ?2 AND day_of_week = ?3
        "#,
    )
    .bind(tenant_id)
    .bind(location_id)
    .bind(i64::from(weekday_index(date)))
    .fetch_optional(&mut *conn)
    .await?;

    let exception: Option<(Option<NaiveTime>, Option<NaiveTime>, bool)> = sqlx::query_as(
        r#"
        SELECT open_local, close_local, is_closed FROM location_hours_exceptions
        WHERE tenant_id = ?1 AND location_id = ?2 AND date_local = ?3
        "#,
    )
    .bind(tenant_id)
    .bind(location_id)
    .bind(date)
    .fetch_optional(&mut *conn)
    .await?;

    let weekly = weekly.map(|(open_local, close_local, is_closed)| OpeningHours {
        open_local,
        close_local,
        is_closed,
    });
    let exception = exception.map(|(open_local, close_local, is_closed)| HoursOverride {
        open_local,
        close_local,
        is_closed,
    });

    Ok(effective_hours(weekly, exception))
}

// =============================================================================
// Repository
// =============================================================================

/// List filter for locations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationFilter {
    pub tenant_id: Option<i64>,
    pub is_active: Option<bool>,
}

/// Repository for locations, hours and exceptions.
#[derive(Debug, Clone)]
pub struct LocationRepository {
    pool: SqlitePool,
}

impl LocationRepository {
    /// Creates a new LocationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LocationRepository { pool }
    }

    /// Creates a location after validating its zone and currency.
    ///
    /// ## Errors
    /// * `DbError::Core(UnknownTimezone)` - zone not in the tz database
    /// * `DbError::ForeignKeyViolation` - tenant does not exist
    pub async fn create(&self, input: &NewLocation) -> DbResult<Location> {
        let name = validate_name("name", &input.name)?;
        let tz = validate_timezone(&input.timezone)?;
        let currency = validate_currency_code(&input.currency_code)?;

        let sql = format!(
            "INSERT INTO locations (tenant_id, name, timezone, currency_code, is_active, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING {LOCATION_COLUMNS}"
        );
        let location: Location = sqlx::query_as(&sql)
            .bind(input.tenant_id)
            .bind(&name)
            .bind(tz.name())
            .bind(&currency)
            .bind(input.is_active)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        info!(
            location_id = location.id,
            tenant_id = location.tenant_id,
            timezone = %location.timezone,
            "Location created"
        );
        Ok(location)
    }

    /// Gets a location by id.
    pub async fn get(&self, id: i64) -> DbResult<Location> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?1");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Location", id))
    }

    /// Gets a location, scoped to a tenant.
    pub async fn get_for_tenant(&self, tenant_id: i64, location_id: i64) -> DbResult<Location> {
        let mut conn = self.pool.acquire().await?;
        find_for_tenant(&mut conn, tenant_id, location_id).await
    }

    /// Lists locations by ascending id.
    pub async fn list(&self, filter: &LocationFilter, page: &PageRequest) -> DbResult<Page<Location>> {
        let sql = format!(
            "SELECT {LOCATION_COLUMNS} FROM locations \
             WHERE (?1 IS NULL OR tenant_id = ?1) \
               AND (?2 IS NULL OR is_active = ?2) \
               AND (?3 IS NULL OR id > ?3) \
             ORDER BY id LIMIT ?4"
        );
        let rows: Vec<Location> = sqlx::query_as(&sql)
            .bind(filter.tenant_id)
            .bind(filter.is_active)
            .bind(page.cursor)
            .bind(page.fetch_limit())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::by_id(rows, page, |l| l.id))
    }

    // -------------------------------------------------------------------------
    // Hours
    // -------------------------------------------------------------------------

    /// Replaces every weekday row for the location in one transaction.
    pub async fn replace_hours(
        &self,
        location_id: i64,
        input: &LocationHoursInput,
    ) -> DbResult<Vec<LocationHours>> {
        let hours = validate_location_hours(input)?;

        let mut tx = begin_write(&self.pool).await?;
        find_for_tenant(&mut tx, input.tenant_id, location_id).await?;

        sqlx::query("DELETE FROM location_hours WHERE tenant_id = ?1 AND location_id = ?2")
            .bind(input.tenant_id)
            .bind(location_id)
            .execute(&mut *tx)
            .await?;

        for day in &hours.days {
            sqlx::query(
                r#"
                INSERT INTO location_hours (
                    tenant_id, location_id, day_of_week,
                    open_local, close_local, is_closed, business_day_cutover_local
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(input.tenant_id)
            .bind(location_id)
            .bind(day.day_of_week)
            .bind(day.open_local)
            .bind(day.close_local)
            .bind(day.is_closed)
            .bind(hours.cutover)
            .execute(&mut *tx)
            .await?;
        }

        let rows = select_hours(&mut tx, input.tenant_id, location_id).await?;
        tx.commit().await?;

        info!(location_id, days = rows.len(), "Location hours replaced");
        Ok(rows)
    }

    /// Weekly hours for a location, Monday first.
    pub async fn hours(&self, tenant_id: i64, location_id: i64) -> DbResult<Vec<LocationHours>> {
        let mut conn = self.pool.acquire().await?;
        find_for_tenant(&mut conn, tenant_id, location_id).await?;
        select_hours(&mut conn, tenant_id, location_id).await
    }

    /// Creates a dated exception.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - the date already has an exception
    pub async fn create_exception(
        &self,
        location_id: i64,
        input: &NewHoursException,
    ) -> DbResult<LocationHoursException> {
        let parsed = validate_hours_exception(input)?;

        let mut tx = begin_write(&self.pool).await?;
        find_for_tenant(&mut tx, input.tenant_id, location_id).await?;

        let inserted: Result<LocationHoursException, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO location_hours_exceptions (
                tenant_id, location_id, date_local, open_local, close_local, is_closed, reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING id, tenant_id, location_id, date_local,
                      open_local, close_local, is_closed, reason
            "#,
        )
        .bind(input.tenant_id)
        .bind(location_id)
        .bind(input.date_local)
        .bind(parsed.open_local)
        .bind(parsed.close_local)
        .bind(parsed.is_closed)
        .bind(input.reason.as_deref())
        .fetch_one(&mut *tx)
        .await;

        let exception = match inserted {
            Ok(row) => row,
            Err(err) => {
                return Err(match DbError::from(err) {
                    DbError::UniqueViolation { .. } => {
                        DbError::duplicate("date_local", input.date_local.to_string())
                    }
                    other => other,
                })
            }
        };
        tx.commit().await?;

        info!(location_id, date = %exception.date_local, "Hours exception created");
        Ok(exception)
    }

    /// Exceptions for a location, optionally within a date range.
    pub async fn exceptions(
        &self,
        tenant_id: i64,
        location_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> DbResult<Vec<LocationHoursException>> {
        let rows = sqlx::query_as(
            r#"
            SELECT id, tenant_id, location_id, date_local,
                   open_local, close_local, is_closed, reason
            FROM location_hours_exceptions
            WHERE tenant_id = ?1 AND location_id = ?2
              AND (?3 IS NULL OR date_local >= ?3)
              AND (?4 IS NULL OR date_local <= ?4)
            ORDER BY date_local
            "#,
        )
        .bind(tenant_id)
        .bind(location_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

async fn select_hours(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    location_id: i64,
) -> DbResult<Vec<LocationHours>> {
    let rows = sqlx::query_as(
        r#"
        SELECT id, tenant_id, location_id, day_of_week,
               open_local, close_local, is_closed, business_day_cutover_local
        FROM location_hours
        WHERE tenant_id = ?1 AND location_id = ?2
        ORDER BY day_of_week
        "#,
    )
    .bind(tenant_id)
    .bind(location_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_location, seed_tenant};
    use crate::{Database, DbConfig};
    use opsledger_core::reference::DayHoursInput;
    use opsledger_core::CoreError;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_timezone_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;

        let err = db
            .locations()
            .create(&NewLocation {
                tenant_id: tenant,
                name: "Clifton".to_string(),
                timezone: "Asia/Karachy".to_string(),
                currency_code: "PKR".to_string(),
                is_active: true,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Core(CoreError::UnknownTimezone(_))));
    }

    #[tokio::test]
    async fn test_tenant_mismatch_is_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant_a = seed_tenant(&db).await;
        let tenant_b = seed_tenant(&db).await;
        let location = seed_location(&db, tenant_a, "Asia/Karachi").await;

        assert!(db.locations().get_for_tenant(tenant_a, location).await.is_ok());
        let err = db.locations().get_for_tenant(tenant_b, location).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_cutover_defaults_then_follows_hours() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let location = seed_location(&db, tenant, "Asia/Karachi").await;

        {
            let mut conn = db.pool().acquire().await.unwrap();
            assert_eq!(cutover(&mut conn, tenant, location).await.unwrap(), hm(5, 0));
        }

        db.locations()
            .replace_hours(
                location,
                &LocationHoursInput {
                    tenant_id: tenant,
                    business_day_cutover_local: Some("04:00".to_string()),
                    days: vec![DayHoursInput {
                        day_of_week: 3,
                        open_local: Some("11:00".to_string()),
                        close_local: Some("23:00".to_string()),
                        is_closed: false,
                    }],
                },
            )
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(cutover(&mut conn, tenant, location).await.unwrap(), hm(4, 0));
    }

    #[tokio::test]
    async fn test_replace_hours_replaces_all_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let location = seed_location(&db, tenant, "Asia/Karachi").await;
        let day = |dow| DayHoursInput {
            day_of_week: dow,
            open_local: Some("10:00".to_string()),
            close_local: Some("22:00".to_string()),
            is_closed: false,
        };

        let input = LocationHoursInput {
            tenant_id: tenant,
            business_day_cutover_local: None,
            days: vec![day(0), day(1), day(2)],
        };
        assert_eq!(db.locations().replace_hours(location, &input).await.unwrap().len(), 3);

        let input = LocationHoursInput {
            days: vec![day(4)],
            ..input
        };
        let rows = db.locations().replace_hours(location, &input).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].day_of_week, 4);
        assert_eq!(db.locations().hours(tenant, location).await.unwrap(), rows);
    }

    #[tokio::test]
    async fn test_second_exception_for_date_conflicts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let location = seed_location(&db, tenant, "Asia/Karachi").await;
        let input = NewHoursException {
            tenant_id: tenant,
            date_local: NaiveDate::from_ymd_opt(2026, 3, 23).unwrap(),
            open_local: None,
            close_local: None,
            is_closed: true,
            reason: Some("Pakistan Day".to_string()),
        };

        let created = db.locations().create_exception(location, &input).await.unwrap();
        assert!(created.is_closed);

        let err = db.locations().create_exception(location, &input).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_hours_for_date_applies_exception() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = seed_tenant(&db).await;
        let location = seed_location(&db, tenant, "Asia/Karachi").await;
        // 2026-01-15 is a Thursday (index 3)
        let thursday = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();

        db.locations()
            .replace_hours(
                location,
                &LocationHoursInput {
                    tenant_id: tenant,
                    business_day_cutover_local: None,
                    days: vec![DayHoursInput {
                        day_of_week: 3,
                        open_local: Some("11:00".to_string()),
                        close_local: Some("23:30".to_string()),
                        is_closed: false,
                    }],
                },
            )
            .await
            .unwrap();

        {
            let mut conn = db.pool().acquire().await.unwrap();
            let hours = hours_for_date(&mut conn, tenant, location, thursday)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(hours.open_local, hm(11, 0));
            assert_eq!(hours.close_local, hm(23, 30));
        }

        db.locations()
            .create_exception(
                location,
                &NewHoursException {
                    tenant_id: tenant,
                    date_local: thursday,
                    open_local: Some("14:00".to_string()),
                    close_local: None,
                    is_closed: false,
                    reason: None,
                },
            )
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let hours = hours_for_date(&mut conn, tenant, location, thursday)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hours.open_local, hm(14, 0));
        assert_eq!(hours.close_local, hm(23, 30));
    }
}
