//! # Operational Rows
//!
//! Open/close signals, POS downtime, labor punches, payouts and stockouts.
//! Each table is written once per external event and read back in id order.

use chrono::Utc;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use opsledger_core::ingest::{
    DowntimeEventInput, LaborPunchInput, OpenCloseSignalInput, PayoutInput, StockoutInput,
};
use opsledger_core::page::{Page, PageRequest};
use opsledger_core::{
    LaborPunch, OpenCloseSignal, Payload, Payout, PosDowntimeEvent, StockoutEvent,
};

/// Where a location-bound operational row lands.
#[derive(Debug, Clone, Copy)]
pub struct RowPlacement {
    pub tenant_id: i64,
    pub location_id: i64,
    pub business_day_id: Option<i64>,
    pub source_system_id: i64,
}

fn metadata(value: &Option<serde_json::Value>) -> Option<Payload> {
    value.clone().map(Payload)
}

// =============================================================================
// Inserts
// =============================================================================

pub async fn insert_signal(
    conn: &mut SqliteConnection,
    at: &RowPlacement,
    input: &OpenCloseSignalInput,
) -> DbResult<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO open_close_signals (
            tenant_id, location_id, business_day_id, source_system_id,
            signal_type, occurred_at, metadata, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        RETURNING id
        "#,
    )
    .bind(at.tenant_id)
    .bind(at.location_id)
    .bind(at.business_day_id)
    .bind(at.source_system_id)
    .bind(&input.signal_type)
    .bind(input.occurred_at)
    .bind(metadata(&input.metadata))
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

pub async fn insert_downtime(
    conn: &mut SqliteConnection,
    at: &RowPlacement,
    input: &DowntimeEventInput,
) -> DbResult<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO pos_downtime_events (
            tenant_id, location_id, business_day_id, source_system_id,
            started_at, ended_at, reason, metadata, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        RETURNING id
        "#,
    )
    .bind(at.tenant_id)
    .bind(at.location_id)
    .bind(at.business_day_id)
    .bind(at.source_system_id)
    .bind(input.started_at)
    .bind(input.ended_at)
    .bind(input.reason.as_deref())
    .bind(metadata(&input.metadata))
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// `employee_id` has already been resolved by the caller.
pub async fn insert_labor_punch(
    conn: &mut SqliteConnection,
    at: &RowPlacement,
    employee_id: i64,
    input: &LaborPunchInput,
) -> DbResult<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO labor_punches (
            tenant_id, location_id, business_day_id, source_system_id,
            employee_id, role, clock_in, clock_out, metadata, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        RETURNING id
        "#,
    )
    .bind(at.tenant_id)
    .bind(at.location_id)
    .bind(at.business_day_id)
    .bind(at.source_system_id)
    .bind(employee_id)
    .bind(input.role.as_deref())
    .bind(input.clock_in)
    .bind(input.clock_out)
    .bind(metadata(&input.metadata))
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Payouts settle across days, so they carry no business day.
pub async fn insert_payout(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    location_id: Option<i64>,
    source_system_id: i64,
    input: &PayoutInput,
) -> DbResult<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO payouts (
            tenant_id, location_id, source_system_id, provider, payout_reference,
            status, currency_code, amount, period_start, period_end,
            expected_payout_at, paid_at, metadata, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        RETURNING id
        "#,
    )
    .bind(tenant_id)
    .bind(location_id)
    .bind(source_system_id)
    .bind(input.provider.as_deref())
    .bind(input.payout_reference.as_deref())
    .bind(&input.status)
    .bind(input.currency_code.trim().to_uppercase())
    .bind(input.amount)
    .bind(input.period_start)
    .bind(input.period_end)
    .bind(input.expected_payout_at)
    .bind(input.paid_at)
    .bind(metadata(&input.metadata))
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

pub async fn insert_stockout(
    conn: &mut SqliteConnection,
    at: &RowPlacement,
    input: &StockoutInput,
) -> DbResult<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO stockout_events (
            tenant_id, location_id, business_day_id, source_system_id,
            item_id, item_name_raw, started_at, ended_at, reason, metadata, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        RETURNING id
        "#,
    )
    .bind(at.tenant_id)
    .bind(at.location_id)
    .bind(at.business_day_id)
    .bind(at.source_system_id)
    .bind(input.item_id)
    .bind(input.item_name_raw.as_deref())
    .bind(input.started_at)
    .bind(input.ended_at)
    .bind(input.reason.as_deref())
    .bind(metadata(&input.metadata))
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

// =============================================================================
// Reads
// =============================================================================

/// Filter shared by the location-bound operational lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationalFilter {
    pub tenant_id: Option<i64>,
    pub location_id: Option<i64>,
    pub business_day_id: Option<i64>,
    pub source_system_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayoutFilter {
    pub tenant_id: Option<i64>,
    pub location_id: Option<i64>,
    pub source_system_id: Option<i64>,
    pub status: Option<String>,
}

/// Read-only lists of the operational tables.
#[derive(Debug, Clone)]
pub struct OperationsRepository {
    pool: SqlitePool,
}

impl OperationsRepository {
    /// Creates a new OperationsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OperationsRepository { pool }
    }

    pub async fn signals(
        &self,
        filter: &OperationalFilter,
        page: &PageRequest,
    ) -> DbResult<Page<OpenCloseSignal>> {
        let rows: Vec<OpenCloseSignal> = self
            .list_located(
                "id, tenant_id, location_id, business_day_id, source_system_id, \
                 signal_type, occurred_at, metadata, created_at",
                "open_close_signals",
                filter,
                page,
            )
            .await?;
        Ok(Page::by_id(rows, page, |r| r.id))
    }

    pub async fn downtime_events(
        &self,
        filter: &OperationalFilter,
        page: &PageRequest,
    ) -> DbResult<Page<PosDowntimeEvent>> {
        let rows: Vec<PosDowntimeEvent> = self
            .list_located(
                "id, tenant_id, location_id, business_day_id, source_system_id, \
                 started_at, ended_at, reason, metadata, created_at",
                "pos_downtime_events",
                filter,
                page,
            )
            .await?;
        Ok(Page::by_id(rows, page, |r| r.id))
    }

    pub async fn labor_punches(
        &self,
        filter: &OperationalFilter,
        page: &PageRequest,
    ) -> DbResult<Page<LaborPunch>> {
        let rows: Vec<LaborPunch> = self
            .list_located(
                "id, tenant_id, location_id, business_day_id, source_system_id, \
                 employee_id, role, clock_in, clock_out, metadata, created_at",
                "labor_punches",
                filter,
                page,
            )
            .await?;
        Ok(Page::by_id(rows, page, |r| r.id))
    }

    pub async fn stockouts(
        &self,
        filter: &OperationalFilter,
        page: &PageRequest,
    ) -> DbResult<Page<StockoutEvent>> {
        let rows: Vec<StockoutEvent> = self
            .list_located(
                "id, tenant_id, location_id, business_day_id, source_system_id, \
                 item_id, item_name_raw, started_at, ended_at, reason, metadata, created_at",
                "stockout_events",
                filter,
                page,
            )
            .await?;
        Ok(Page::by_id(rows, page, |r| r.id))
    }

    pub async fn payouts(&self, filter: &PayoutFilter, page: &PageRequest) -> DbResult<Page<Payout>> {
        let rows: Vec<Payout> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, location_id, source_system_id, provider, payout_reference,
                   status, currency_code, amount, period_start, period_end,
                   expected_payout_at, paid_at, metadata, created_at
            FROM payouts
            WHERE (?1 IS NULL OR tenant_id = ?1)
              AND (?2 IS NULL OR location_id = ?2)
              AND (?3 IS NULL OR source_system_id = ?3)
              AND (?4 IS NULL OR status = ?4)
              AND (?5 IS NULL OR id > ?5)
            ORDER BY id
            LIMIT ?6
            "#,
        )
        .bind(filter.tenant_id)
        .bind(filter.location_id)
        .bind(filter.source_system_id)
        .bind(filter.status.as_deref())
        .bind(page.cursor)
        .bind(page.fetch_limit())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::by_id(rows, page, |r| r.id))
    }

    async fn list_located<T>(
        &self,
        columns: &str,
        table: &str,
        filter: &OperationalFilter,
        page: &PageRequest,
    ) -> DbResult<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin,
    {
        let sql = format!(
            r#"
            SELECT {columns} FROM {table}
            WHERE (?1 IS NULL OR tenant_id = ?1)
              AND (?2 IS NULL OR location_id = ?2)
              AND (?3 IS NULL OR business_day_id = ?3)
              AND (?4 IS NULL OR source_system_id = ?4)
              AND (?5 IS NULL OR id > ?5)
            ORDER BY id
            LIMIT ?6
            "#
        );
        let rows = sqlx::query_as::<_, T>(&sql)
            .bind(filter.tenant_id)
            .bind(filter.location_id)
            .bind(filter.business_day_id)
            .bind(filter.source_system_id)
            .bind(page.cursor)
            .bind(page.fetch_limit())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
