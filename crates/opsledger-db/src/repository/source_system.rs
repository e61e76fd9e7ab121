//! # Source System Repository
//!
//! A source system is one upstream feed (a POS, an ERP export, a delivery
//! aggregator). Every ingested row carries the id of the system it came from.

use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use opsledger_core::page::{Page, PageRequest};
use opsledger_core::reference::NewSourceSystem;
use opsledger_core::validation::validate_name;
use opsledger_core::SourceSystem;

const SOURCE_SYSTEM_COLUMNS: &str = "id, tenant_id, system_type, provider, name, is_active";

/// Loads a source system, failing with `NotFound` unless it belongs to the tenant.
pub async fn find_for_tenant(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    source_system_id: i64,
) -> DbResult<SourceSystem> {
    let sql = format!(
        "SELECT {SOURCE_SYSTEM_COLUMNS} FROM source_systems WHERE id = ?1 AND tenant_id = ?2"
    );
    sqlx::query_as(&sql)
        .bind(source_system_id)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("SourceSystem", source_system_id))
}

/// List filter for source systems.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceSystemFilter {
    pub tenant_id: Option<i64>,
    #[serde(rename = "type")]
    pub system_type: Option<String>,
}

/// Repository for source systems.
#[derive(Debug, Clone)]
pub struct SourceSystemRepository {
    pool: SqlitePool,
}

impl SourceSystemRepository {
    /// Creates a new SourceSystemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SourceSystemRepository { pool }
    }

    /// Registers a source system for a tenant.
    pub async fn create(&self, input: &NewSourceSystem) -> DbResult<SourceSystem> {
        let system_type = validate_name("type", &input.system_type)?;
        let name = validate_name("name", &input.name)?;

        let sql = format!(
            r#"
            INSERT INTO source_systems (tenant_id, system_type, provider, name, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING {SOURCE_SYSTEM_COLUMNS}
            "#
        );
        let system: SourceSystem = sqlx::query_as(&sql)
            .bind(input.tenant_id)
            .bind(&system_type)
            .bind(input.provider.as_deref())
            .bind(&name)
            .bind(input.is_active)
            .fetch_one(&self.pool)
            .await?;

        info!(
            source_system_id = system.id,
            tenant_id = system.tenant_id,
            system_type = %system.system_type,
            "Source system created"
        );
        Ok(system)
    }

    /// Gets a source system by id.
    pub async fn get(&self, id: i64) -> DbResult<SourceSystem> {
        let sql = format!("SELECT {SOURCE_SYSTEM_COLUMNS} FROM source_systems WHERE id = ?1");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("SourceSystem", id))
    }

    /// Lists source systems by ascending id.
    pub async fn list(
        &self,
        filter: &SourceSystemFilter,
        page: &PageRequest,
    ) -> DbResult<Page<SourceSystem>> {
        let sql = format!(
            r#"
            SELECT {SOURCE_SYSTEM_COLUMNS} FROM source_systems
            WHERE (?1 IS NULL OR tenant_id = ?1)
              AND (?2 IS NULL OR system_type = ?2)
              AND (?3 IS NULL OR id > ?3)
            ORDER BY id
            LIMIT ?4
            "#
        );
        let rows: Vec<SourceSystem> = sqlx::query_as(&sql)
            .bind(filter.tenant_id)
            .bind(filter.system_type.as_deref())
            .bind(page.cursor)
            .bind(page.fetch_limit())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::by_id(rows, page, |s| s.id))
    }
}
