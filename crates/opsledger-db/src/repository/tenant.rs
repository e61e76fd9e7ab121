//! # Tenant Repository
//!
//! Tenants are the isolation boundary. Every other row carries a
//! `tenant_id`, and every lookup by id in this crate also checks it.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use opsledger_core::page::{Page, PageRequest};
use opsledger_core::reference::NewTenant;
use opsledger_core::validation::validate_name;
use opsledger_core::Tenant;

/// Repository for tenant database operations.
#[derive(Debug, Clone)]
pub struct TenantRepository {
    pool: SqlitePool,
}

impl TenantRepository {
    /// Creates a new TenantRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TenantRepository { pool }
    }

    /// Creates a tenant.
    pub async fn create(&self, input: &NewTenant) -> DbResult<Tenant> {
        let name = validate_name("name", &input.name)?;
        let status = validate_name("status", &input.status)?;

        let tenant: Tenant = sqlx::query_as(
            r#"
            INSERT INTO tenants (name, status, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING id, name, status, created_at
            "#,
        )
        .bind(&name)
        .bind(&status)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        info!(tenant_id = tenant.id, name = %tenant.name, "Tenant created");
        Ok(tenant)
    }

    /// Gets a tenant by id.
    pub async fn get(&self, id: i64) -> DbResult<Tenant> {
        sqlx::query_as("SELECT id, name, status, created_at FROM tenants WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Tenant", id))
    }

    /// Lists tenants by ascending id.
    pub async fn list(&self, page: &PageRequest) -> DbResult<Page<Tenant>> {
        let rows: Vec<Tenant> = sqlx::query_as(
            r#"
            SELECT id, name, status, created_at FROM tenants
            WHERE (?1 IS NULL OR id > ?1)
            ORDER BY id
            LIMIT ?2
            "#,
        )
        .bind(page.cursor)
        .bind(page.fetch_limit())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::by_id(rows, page, |t| t.id))
    }
}
