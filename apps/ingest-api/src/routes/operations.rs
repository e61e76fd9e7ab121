//! Read-only lists of the operational tables and the external id map.

use axum::extract::State;
use axum::routing::get;
use axum::Router;

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::extract::{ApiQuery, PageParams, TenantParam};
use crate::state::AppState;
use opsledger_core::{
    IngestionMapping, LaborPunch, OpenCloseSignal, Payout, PosDowntimeEvent, StockoutEvent,
};
use opsledger_db::repository::dedup::DedupFilter;
use opsledger_db::repository::operations::{OperationalFilter, PayoutFilter};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/external-id-map", get(external_id_map))
        .route("/api/v1/labor-punches", get(labor_punches))
        .route("/api/v1/payouts", get(payouts))
        .route("/api/v1/stockout-events", get(stockout_events))
        .route("/api/v1/open-close-signals", get(open_close_signals))
        .route("/api/v1/pos-downtime-events", get(pos_downtime_events))
}

/// `GET /api/v1/external-id-map?tenant_id=` (offset cursor).
async fn external_id_map(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(tenant): ApiQuery<TenantParam>,
    ApiQuery(filter): ApiQuery<DedupFilter>,
) -> ApiResult<Envelope<Vec<IngestionMapping>>> {
    let page = page.resolve(&state)?;
    let rows = state.db.dedup().list(tenant.tenant_id, &filter, &page).await?;
    Ok(Envelope::page(rows, &page))
}

async fn labor_punches(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<OperationalFilter>,
) -> ApiResult<Envelope<Vec<LaborPunch>>> {
    let page = page.resolve(&state)?;
    let rows = state.db.operations().labor_punches(&filter, &page).await?;
    Ok(Envelope::page(rows, &page))
}

async fn payouts(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<PayoutFilter>,
) -> ApiResult<Envelope<Vec<Payout>>> {
    let page = page.resolve(&state)?;
    let rows = state.db.operations().payouts(&filter, &page).await?;
    Ok(Envelope::page(rows, &page))
}

async fn stockout_events(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<OperationalFilter>,
) -> ApiResult<Envelope<Vec<StockoutEvent>>> {
    let page = page.resolve(&state)?;
    let rows = state.db.operations().stockouts(&filter, &page).await?;
    Ok(Envelope::page(rows, &page))
}

async fn open_close_signals(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<OperationalFilter>,
) -> ApiResult<Envelope<Vec<OpenCloseSignal>>> {
    let page = page.resolve(&state)?;
    let rows = state.db.operations().signals(&filter, &page).await?;
    Ok(Envelope::page(rows, &page))
}

async fn pos_downtime_events(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<OperationalFilter>,
) -> ApiResult<Envelope<Vec<PosDowntimeEvent>>> {
    let page = page.resolve(&state)?;
    let rows = state.db.operations().downtime_events(&filter, &page).await?;
    Ok(Envelope::page(rows, &page))
}
