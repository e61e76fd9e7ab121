//! # Employee Repository
//!
//! Employees are tenant-scoped and optionally pinned to a location. Labor
//! feeds name them either by internal id or by a location-local external key.

use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::DbResult;
use crate::pool::begin_write;
use crate::repository::location;
use opsledger_core::page::{Page, PageRequest};
use opsledger_core::reference::NewEmployee;
use opsledger_core::validation::validate_name;
use opsledger_core::Employee;

const EMPLOYEE_COLUMNS: &str =
    "id, tenant_id, location_id, external_key, full_name, role, is_active";

/// Returns the id if the employee exists for the tenant.
pub async fn employee_for_tenant(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    employee_id: i64,
) -> DbResult<Option<i64>> {
    let id = sqlx::query_scalar("SELECT id FROM employees WHERE id = ?1 AND tenant_id = ?2")
        .bind(employee_id)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(id)
}

/// Resolves a location's external employee key. Lowest id wins when a key
/// was registered twice.
pub async fn employee_by_external_key(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    location_id: i64,
    external_key: &str,
) -> DbResult<Option<i64>> {
    let id = sqlx::query_scalar(
        r#"
        SELECT id FROM employees
        WHERE tenant_id = ?1 AND location_id = ?2 AND external_key = ?3
        ORDER BY id
        LIMIT 1
        "#,
    )
    .bind(tenant_id)
    .bind(location_id)
    .bind(external_key)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(id)
}

/// List filter for employees.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeFilter {
    pub tenant_id: Option<i64>,
    pub location_id: Option<i64>,
    pub is_active: Option<bool>,
}

/// Repository for employees.
#[derive(Debug, Clone)]
pub struct EmployeeRepository {
    pool: SqlitePool,
}

impl EmployeeRepository {
    /// Creates a new EmployeeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        EmployeeRepository { pool }
    }

    /// Creates an employee. A given location must belong to the tenant.
    pub async fn create(&self, input: &NewEmployee) -> DbResult<Employee> {
        let full_name = validate_name("full_name", &input.full_name)?;

        let mut tx = begin_write(&self.pool).await?;
        if let Some(location_id) = input.location_id {
            location::find_for_tenant(&mut tx, input.tenant_id, location_id).await?;
        }

        let sql = format!(
            r#"
            INSERT INTO employees (tenant_id, location_id, external_key, full_name, role, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING {EMPLOYEE_COLUMNS}
            "#
        );
        let employee: Employee = sqlx::query_as(&sql)
            .bind(input.tenant_id)
            .bind(input.location_id)
            .bind(input.external_key.as_deref())
            .bind(&full_name)
            .bind(input.role.as_deref())
            .bind(input.is_active)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(employee_id = employee.id, tenant_id = employee.tenant_id, "Employee created");
        Ok(employee)
    }

    /// Lists employees by ascending id.
    pub async fn list(&self, filter: &EmployeeFilter, page: &PageRequest) -> DbResult<Page<Employee>> {
        let sql = format!(
            r#"
            SELECT {EMPLOYEE_COLUMNS} FROM employees
            WHERE (?1 IS NULL OR tenant_id = ?1)
              AND (?2 IS NULL OR location_id = ?2)
              AND (?3 IS NULL OR is_active = ?3)
              AND (?4 IS NULL OR id > ?4)
            ORDER BY id
            LIMIT ?5
            "#
        );
        let rows: Vec<Employee> = sqlx::query_as(&sql)
            .bind(filter.tenant_id)
            .bind(filter.location_id)
            .bind(filter.is_active)
            .bind(page.cursor)
            .bind(page.fetch_limit())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::by_id(rows, page, |e| e.id))
    }
}
