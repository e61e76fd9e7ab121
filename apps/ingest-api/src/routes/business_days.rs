//! Business-day resolution and reads.

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, PageParams};
use crate::state::AppState;
use opsledger_core::{BusinessDay, BusinessDayRef};
use opsledger_db::repository::business_day::BusinessDayFilter;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/business-days/resolve", get(resolve))
        .route("/api/v1/business-days:ensure", post(ensure))
        .route("/api/v1/business-days/{business_day_id}", get(get_business_day))
        .route("/api/v1/business-days", get(list_business_days))
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub tenant_id: i64,
    pub location_id: i64,
    /// Any RFC 3339 instant; offsets are normalized to UTC.
    pub at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct EnsureBody {
    pub tenant_id: i64,
    pub location_id: i64,
    pub business_date: NaiveDate,
}

/// `GET /api/v1/business-days/resolve?tenant_id&location_id&at`
async fn resolve(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ResolveQuery>,
) -> ApiResult<Envelope<BusinessDayRef>> {
    let day = state
        .db
        .business_days()
        .resolve(query.tenant_id, query.location_id, query.at)
        .await?;
    Ok(Envelope::ok(BusinessDayRef::from(&day)))
}

/// `POST /api/v1/business-days:ensure`
async fn ensure(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EnsureBody>,
) -> ApiResult<Envelope<BusinessDayRef>> {
    let day = state
        .db
        .business_days()
        .ensure(body.tenant_id, body.location_id, body.business_date)
        .await?;
    Ok(Envelope::ok(BusinessDayRef::from(&day)))
}

async fn get_business_day(
    State(state): State<AppState>,
    ApiPath(business_day_id): ApiPath<i64>,
) -> ApiResult<Envelope<BusinessDay>> {
    let day = state.db.business_days().get(business_day_id).await?;
    Ok(Envelope::ok(day))
}

async fn list_business_days(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<BusinessDayFilter>,
) -> ApiResult<Envelope<Vec<BusinessDay>>> {
    let page = page.resolve(&state)?;
    let days = state.db.business_days().list(&filter, &page).await?;
    Ok(Envelope::page(days, &page))
}
