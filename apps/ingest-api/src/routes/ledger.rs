//! Raw-event ledger: ERP feed append, master-data append and listing.
//!
//! ```text
//! POST /v1/tenants/{tenant_id}/locations/{location_id}/erp-ledger/{feed}:append
//! POST /v1/tenants/{tenant_id}/master-data-ledger:append?location_id=
//! GET  /api/v1/ledger-events
//! ```

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::envelope::Envelope;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, PageParams};
use crate::state::AppState;
use opsledger_core::ledger::{LedgerAppendOutcome, LedgerRoute};
use opsledger_core::LedgerEvent;
use opsledger_db::repository::ledger::LedgerFilter;
use opsledger_db::LedgerAppend;

const APPEND_SUFFIX: &str = ":append";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/tenants/{tenant_id}/locations/{location_id}/erp-ledger/{ledger_action}",
            post(append_erp),
        )
        .route("/v1/tenants/{tenant_id}/master-data-ledger:append", post(append_master_data))
        .route("/api/v1/ledger-events", get(list_events))
}

/// ERP append body. Feeds name their event array after themselves.
#[derive(Debug, Deserialize)]
pub struct ErpAppendBody {
    pub source_system_id: i64,
    #[serde(default)]
    pub business_day_id: Option<i64>,
    #[serde(
        default,
        alias = "sales",
        alias = "tickets",
        alias = "discounts",
        alias = "voids",
        alias = "refunds",
        alias = "payouts",
        alias = "cash_variances",
        alias = "labor",
        alias = "stockouts",
        alias = "payments",
        alias = "signals"
    )]
    pub events: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct MasterDataBody {
    pub source_system_id: i64,
    #[serde(default)]
    pub events: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct MasterDataQuery {
    pub location_id: Option<i64>,
}

/// `sales:append` → `sales`. Anything without the suffix is not a route.
fn feed_token(ledger_action: &str) -> ApiResult<&str> {
    ledger_action
        .strip_suffix(APPEND_SUFFIX)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::NotFound(format!("no ledger action '{ledger_action}'")))
}

async fn append_erp(
    State(state): State<AppState>,
    ApiPath((tenant_id, location_id, ledger_action)): ApiPath<(i64, i64, String)>,
    ApiJson(body): ApiJson<ErpAppendBody>,
) -> ApiResult<Envelope<LedgerAppendOutcome>> {
    let route = LedgerRoute::erp(feed_token(&ledger_action)?);
    debug!(tenant_id, location_id, feed_type = %route.feed_type, events = body.events.len(), "ERP append");

    let outcome = state
        .db
        .ledger()
        .append(&LedgerAppend {
            tenant_id,
            location_id: Some(location_id),
            route: &route,
            source_system_id: body.source_system_id,
            business_day_id: body.business_day_id,
            events: &body.events,
        })
        .await?;
    Ok(Envelope::ok(outcome))
}

async fn append_master_data(
    State(state): State<AppState>,
    ApiPath(tenant_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<MasterDataQuery>,
    ApiJson(body): ApiJson<MasterDataBody>,
) -> ApiResult<Envelope<LedgerAppendOutcome>> {
    let route = LedgerRoute::master_data();
    let outcome = state
        .db
        .ledger()
        .append(&LedgerAppend {
            tenant_id,
            location_id: query.location_id,
            route: &route,
            source_system_id: body.source_system_id,
            business_day_id: None,
            events: &body.events,
        })
        .await?;
    Ok(Envelope::ok(outcome))
}

async fn list_events(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<LedgerFilter>,
) -> ApiResult<Envelope<Vec<LedgerEvent>>> {
    let page = page.resolve(&state)?;
    let rows = state.db.ledger().list(&filter, &page).await?;
    Ok(Envelope::page(rows, &page))
}
