//! Reference data: thin create/get/list handlers over the repositories.

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, PageParams, TenantParam};
use crate::state::AppState;
use opsledger_core::reference::{
    LocationHoursInput, NewChannelMapping, NewEmployee, NewHoursException, NewItem,
    NewItemExternalKey, NewLocation, NewSourceSystem, NewTenant,
};
use opsledger_core::{
    ChannelMapping, Employee, Item, ItemExternalKey, Location, LocationHours,
    LocationHoursException, SourceSystem, Tenant,
};
use opsledger_db::repository::catalog::{ChannelFilter, ItemKeyFilter};
use opsledger_db::repository::employee::EmployeeFilter;
use opsledger_db::repository::location::LocationFilter;
use opsledger_db::repository::source_system::SourceSystemFilter;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/tenants", post(create_tenant).get(list_tenants))
        .route("/api/v1/tenants/{tenant_id}", get(get_tenant))
        .route("/api/v1/locations", post(create_location).get(list_locations))
        .route("/api/v1/locations/{location_id}", get(get_location))
        .route(
            "/api/v1/locations/{location_id}/hours",
            get(get_hours).put(replace_hours),
        )
        .route(
            "/api/v1/locations/{location_id}/hours-exceptions",
            post(create_exception).get(list_exceptions),
        )
        .route("/api/v1/source-systems", post(create_source_system).get(list_source_systems))
        .route("/api/v1/items", post(create_item))
        .route("/api/v1/items/{item_id}", get(get_item))
        .route("/api/v1/item-external-keys", post(create_item_key).get(list_item_keys))
        .route("/api/v1/channel-mappings", post(create_channel).get(list_channels))
        .route("/api/v1/employees", post(create_employee).get(list_employees))
}

// =============================================================================
// Tenants
// =============================================================================

async fn create_tenant(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewTenant>,
) -> ApiResult<Envelope<Tenant>> {
    Ok(Envelope::ok(state.db.tenants().create(&input).await?))
}

async fn get_tenant(
    State(state): State<AppState>,
    ApiPath(tenant_id): ApiPath<i64>,
) -> ApiResult<Envelope<Tenant>> {
    Ok(Envelope::ok(state.db.tenants().get(tenant_id).await?))
}

async fn list_tenants(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<Envelope<Vec<Tenant>>> {
    let page = page.resolve(&state)?;
    let rows = state.db.tenants().list(&page).await?;
    Ok(Envelope::page(rows, &page))
}

// =============================================================================
// Locations, Hours and Exceptions
// =============================================================================

async fn create_location(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewLocation>,
) -> ApiResult<Envelope<Location>> {
    Ok(Envelope::ok(state.db.locations().create(&input).await?))
}

async fn get_location(
    State(state): State<AppState>,
    ApiPath(location_id): ApiPath<i64>,
) -> ApiResult<Envelope<Location>> {
    Ok(Envelope::ok(state.db.locations().get(location_id).await?))
}

async fn list_locations(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<LocationFilter>,
) -> ApiResult<Envelope<Vec<Location>>> {
    let page = page.resolve(&state)?;
    let rows = state.db.locations().list(&filter, &page).await?;
    Ok(Envelope::page(rows, &page))
}

/// `PUT /api/v1/locations/{id}/hours` replaces the whole week.
async fn replace_hours(
    State(state): State<AppState>,
    ApiPath(location_id): ApiPath<i64>,
    ApiJson(input): ApiJson<LocationHoursInput>,
) -> ApiResult<Envelope<Vec<LocationHours>>> {
    let rows = state.db.locations().replace_hours(location_id, &input).await?;
    Ok(Envelope::ok(rows))
}

async fn get_hours(
    State(state): State<AppState>,
    ApiPath(location_id): ApiPath<i64>,
    ApiQuery(tenant): ApiQuery<TenantParam>,
) -> ApiResult<Envelope<Vec<LocationHours>>> {
    let rows = state.db.locations().hours(tenant.tenant_id, location_id).await?;
    Ok(Envelope::ok(rows))
}

async fn create_exception(
    State(state): State<AppState>,
    ApiPath(location_id): ApiPath<i64>,
    ApiJson(input): ApiJson<NewHoursException>,
) -> ApiResult<Envelope<LocationHoursException>> {
    let row = state.db.locations().create_exception(location_id, &input).await?;
    Ok(Envelope::ok(row))
}

#[derive(Debug, Deserialize)]
pub struct ExceptionQuery {
    pub tenant_id: i64,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

async fn list_exceptions(
    State(state): State<AppState>,
    ApiPath(location_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<ExceptionQuery>,
) -> ApiResult<Envelope<Vec<LocationHoursException>>> {
    let rows = state
        .db
        .locations()
        .exceptions(query.tenant_id, location_id, query.from, query.to)
        .await?;
    Ok(Envelope::ok(rows))
}

// =============================================================================
// Source Systems
// =============================================================================

async fn create_source_system(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewSourceSystem>,
) -> ApiResult<Envelope<SourceSystem>> {
    Ok(Envelope::ok(state.db.source_systems().create(&input).await?))
}

async fn list_source_systems(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<SourceSystemFilter>,
) -> ApiResult<Envelope<Vec<SourceSystem>>> {
    let page = page.resolve(&state)?;
    let rows = state.db.source_systems().list(&filter, &page).await?;
    Ok(Envelope::page(rows, &page))
}

// =============================================================================
// Catalog
// =============================================================================

async fn create_item(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewItem>,
) -> ApiResult<Envelope<Item>> {
    Ok(Envelope::ok(state.db.catalog().create_item(&input).await?))
}

async fn get_item(
    State(state): State<AppState>,
    ApiPath(item_id): ApiPath<i64>,
) -> ApiResult<Envelope<Item>> {
    Ok(Envelope::ok(state.db.catalog().get_item(item_id).await?))
}

async fn create_item_key(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewItemExternalKey>,
) -> ApiResult<Envelope<ItemExternalKey>> {
    Ok(Envelope::ok(state.db.catalog().create_item_key(&input).await?))
}

/// Offset cursor: `cursor` is the number of rows to skip.
async fn list_item_keys(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<ItemKeyFilter>,
) -> ApiResult<Envelope<Vec<ItemExternalKey>>> {
    let page = page.resolve(&state)?;
    let rows = state.db.catalog().list_item_keys(&filter, &page).await?;
    Ok(Envelope::page(rows, &page))
}

async fn create_channel(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewChannelMapping>,
) -> ApiResult<Envelope<ChannelMapping>> {
    Ok(Envelope::ok(state.db.catalog().create_channel(&input).await?))
}

async fn list_channels(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<ChannelFilter>,
) -> ApiResult<Envelope<Vec<ChannelMapping>>> {
    let page = page.resolve(&state)?;
    let rows = state.db.catalog().list_channels(&filter, &page).await?;
    Ok(Envelope::page(rows, &page))
}

// =============================================================================
// Employees
// =============================================================================

async fn create_employee(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewEmployee>,
) -> ApiResult<Envelope<Employee>> {
    Ok(Envelope::ok(state.db.employees().create(&input).await?))
}

async fn list_employees(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<EmployeeFilter>,
) -> ApiResult<Envelope<Vec<Employee>>> {
    let page = page.resolve(&state)?;
    let rows = state.db.employees().list(&filter, &page).await?;
    Ok(Envelope::page(rows, &page))
}
