//! # Catalog Repository
//!
//! Items, the per-source keys that point at them, and the channel
//! normalization table.
//!
//! ## Resolution
//! ```text
//! line item { item_id: 17 }                ──► item 17        MAPPED
//! line item { external_item_key: "CP-01" } ──► item_external_keys
//!                                              (tenant, source, key)
//!                                              ├── hit  ──► MAPPED_BY_EXTERNAL_ITEM_KEY
//!                                              └── miss ──► UNMAPPED
//!
//! channel { provider?, source_channel_code } ──► channel_mappings
//!                                                (tenant, provider IS ?, code)
//! ```
//!
//! A null provider is a distinct key: `(NULL, "DINE_IN")` and
//! `("Foodpanda", "DINE_IN")` are different mappings.

use chrono::Utc;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use opsledger_core::page::{Page, PageRequest};
use opsledger_core::reference::{NewChannelMapping, NewItem, NewItemExternalKey};
use opsledger_core::validation::validate_name;
use opsledger_core::{ChannelMapping, Item, ItemExternalKey};

const ITEM_COLUMNS: &str = "id, tenant_id, item_name, item_type, base_uom, is_active, created_at";

const CHANNEL_COLUMNS: &str =
    "id, tenant_id, provider, source_channel_code, source_channel_name, normalized_channel";

// =============================================================================
// Unit-of-work Lookups
// =============================================================================

/// Returns `item_id` when the item belongs to the tenant.
pub async fn item_for_tenant(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    item_id: i64,
) -> DbResult<Option<i64>> {
    let found = sqlx::query_scalar("SELECT id FROM items WHERE id = ?1 AND tenant_id = ?2")
        .bind(item_id)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(found)
}

/// Resolves a source system's item key to an internal item id.
pub async fn item_by_external_key(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    source_system_id: i64,
    external_item_key: &str,
) -> DbResult<Option<i64>> {
    let item_id = sqlx::query_scalar(
        r#"
        SELECT item_id FROM item_external_keys
        WHERE tenant_id = ?1 AND source_system_id = ?2 AND external_item_key = ?3
        "#,
    )
    .bind(tenant_id)
    .bind(source_system_id)
    .bind(external_item_key)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(item_id)
}

/// Resolves a source channel code to its mapping id.
pub async fn channel_by_source_code(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    provider: Option<&str>,
    source_channel_code: &str,
) -> DbResult<Option<i64>> {
    let channel_id = sqlx::query_scalar(
        r#"
        SELECT id FROM channel_mappings
        WHERE tenant_id = ?1 AND provider IS ?2 AND source_channel_code = ?3
        "#,
    )
    .bind(tenant_id)
    .bind(provider)
    .bind(source_channel_code)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(channel_id)
}

// =============================================================================
// Repository
// =============================================================================

/// List filter for item external keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemKeyFilter {
    pub tenant_id: Option<i64>,
    pub item_id: Option<i64>,
    pub source_system_id: Option<i64>,
}

/// List filter for channel mappings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelFilter {
    pub tenant_id: Option<i64>,
    pub provider: Option<String>,
}

/// Repository for items, item keys and channel mappings.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------------

    /// Creates an item.
    pub async fn create_item(&self, input: &NewItem) -> DbResult<Item> {
        let item_name = validate_name("item_name", &input.item_name)?;
        let item_type = validate_name("item_type", &input.item_type)?;

        let sql = format!(
            r#"
            INSERT INTO items (tenant_id, item_name, item_type, base_uom, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING {ITEM_COLUMNS}
            "#
        );
        let item: Item = sqlx::query_as(&sql)
            .bind(input.tenant_id)
            .bind(&item_name)
            .bind(&item_type)
            .bind(input.base_uom.as_deref())
            .bind(input.is_active)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        info!(item_id = item.id, tenant_id = item.tenant_id, name = %item.item_name, "Item created");
        Ok(item)
    }

    /// Gets an item by id.
    pub async fn get_item(&self, id: i64) -> DbResult<Item> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))
    }

    // -------------------------------------------------------------------------
    // Item external keys
    // -------------------------------------------------------------------------

    /// Maps a source system's key to an item.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - the item does not belong to the tenant
    /// * `DbError::UniqueViolation` - the key is already mapped for that source
    pub async fn create_item_key(&self, input: &NewItemExternalKey) -> DbResult<ItemExternalKey> {
        let key = validate_name("external_item_key", &input.external_item_key)?;

        let mut tx = begin_write(&self.pool).await?;
        let owned: Option<i64> =
            sqlx::query_scalar("SELECT id FROM items WHERE id = ?1 AND tenant_id = ?2")
                .bind(input.item_id)
                .bind(input.tenant_id)
                .fetch_optional(&mut *tx)
                .await?;
        if owned.is_none() {
            return Err(DbError::not_found("Item", input.item_id));
        }

        let inserted: Result<ItemExternalKey, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO item_external_keys (tenant_id, item_id, source_system_id, external_item_key)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING tenant_id, item_id, source_system_id, external_item_key
            "#,
        )
        .bind(input.tenant_id)
        .bind(input.item_id)
        .bind(input.source_system_id)
        .bind(&key)
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(err) => {
                return Err(match DbError::from(err) {
                    DbError::UniqueViolation { .. } => DbError::duplicate("external_item_key", &key),
                    other => other,
                })
            }
        };
        tx.commit().await?;

        info!(item_id = row.item_id, key = %row.external_item_key, "Item key mapped");
        Ok(row)
    }

    /// Lists item keys. Uses offset pagination.
    pub async fn list_item_keys(
        &self,
        filter: &ItemKeyFilter,
        page: &PageRequest,
    ) -> DbResult<Page<ItemExternalKey>> {
        let rows: Vec<ItemExternalKey> = sqlx::query_as(
            r#"
            SELECT tenant_id, item_id, source_system_id, external_item_key
            FROM item_external_keys
            WHERE (?1 IS NULL OR tenant_id = ?1)
              AND (?2 IS NULL OR item_id = ?2)
              AND (?3 IS NULL OR source_system_id = ?3)
            ORDER BY rowid
            LIMIT ?4 OFFSET ?5
            "#,
        )
        .bind(filter.tenant_id)
        .bind(filter.item_id)
        .bind(filter.source_system_id)
        .bind(page.fetch_limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::by_offset(rows, page))
    }

    // -------------------------------------------------------------------------
    // Channel mappings
    // -------------------------------------------------------------------------

    /// Creates a channel mapping.
    pub async fn create_channel(&self, input: &NewChannelMapping) -> DbResult<ChannelMapping> {
        let code = validate_name("source_channel_code", &input.source_channel_code)?;
        let normalized = validate_name("normalized_channel", &input.normalized_channel)?;

        let sql = format!(
            r#"
            INSERT INTO channel_mappings (
                tenant_id, provider, source_channel_code, source_channel_name, normalized_channel
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING {CHANNEL_COLUMNS}
            "#
        );
        let inserted: Result<ChannelMapping, sqlx::Error> = sqlx::query_as(&sql)
            .bind(input.tenant_id)
            .bind(input.provider.as_deref())
            .bind(&code)
            .bind(input.source_channel_name.as_deref())
            .bind(&normalized)
            .fetch_one(&self.pool)
            .await;

        let channel = match inserted {
            Ok(row) => row,
            Err(err) => {
                return Err(match DbError::from(err) {
                    DbError::UniqueViolation { .. } => DbError::duplicate("source_channel_code", &code),
                    other => other,
                })
            }
        };

        info!(
            channel_mapping_id = channel.id,
            code = %channel.source_channel_code,
            normalized = %channel.normalized_channel,
            "Channel mapping created"
        );
        Ok(channel)
    }

    /// Lists channel mappings by ascending id.
    pub async fn list_channels(
        &self,
        filter: &ChannelFilter,
        page: &PageRequest,
    ) -> DbResult<Page<ChannelMapping>> {
        let sql = format!(
            r#"
            SELECT {CHANNEL_COLUMNS} FROM channel_mappings
            WHERE (?1 IS NULL OR tenant_id = ?1)
              AND (?2 IS NULL OR provider = ?2)
              AND (?3 IS NULL OR id > ?3)
            ORDER BY id
            LIMIT ?4
            "#
        );
        let rows: Vec<ChannelMapping> = sqlx::query_as(&sql)
            .bind(filter.tenant_id)
            .bind(filter.provider.as_deref())
            .bind(page.cursor)
            .bind(page.fetch_limit())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::by_id(rows, page, |c| c.id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
