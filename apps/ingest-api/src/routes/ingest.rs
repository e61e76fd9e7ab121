//! Structured bulk upserts.
//!
//! Each endpoint answers `{accepted, updated, rejected, results[]}`. A bad
//! item only affects its own result; the call fails as a whole only when the
//! batch references a tenant-foreign location, source system or business day.

use axum::extract::State;
use axum::routing::post;
use axum::Router;

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::state::AppState;
use opsledger_core::ingest::{
    BatchOutcome, DowntimeEventInput, EntityUpsertResult, IngestBatch, LaborPunchInput,
    OpenCloseSignalInput, PayoutBatch, StockoutInput, TicketInput, TicketUpsertResult,
};

type EntityOutcome = Envelope<BatchOutcome<EntityUpsertResult>>;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/ingest/pos/tickets:bulkUpsert", post(tickets))
        .route("/api/v1/ingest/pos/open-close-signals:bulkUpsert", post(open_close_signals))
        .route("/api/v1/ingest/pos/downtime-events:bulkUpsert", post(downtime_events))
        .route("/api/v1/ingest/labor/punches:bulkUpsert", post(labor_punches))
        .route("/api/v1/ingest/finance/payouts:bulkUpsert", post(payouts))
        .route("/api/v1/ingest/inventory/stockouts:bulkUpsert", post(stockouts))
}

/// `POST /api/v1/ingest/pos/tickets:bulkUpsert`
async fn tickets(
    State(state): State<AppState>,
    ApiJson(batch): ApiJson<IngestBatch<TicketInput>>,
) -> ApiResult<Envelope<BatchOutcome<TicketUpsertResult>>> {
    let outcome = state.db.ingest().bulk_upsert_tickets(&batch).await?;
    Ok(Envelope::ok(outcome))
}

async fn open_close_signals(
    State(state): State<AppState>,
    ApiJson(batch): ApiJson<IngestBatch<OpenCloseSignalInput>>,
) -> ApiResult<EntityOutcome> {
    let outcome = state.db.ingest().open_close_signals(&batch).await?;
    Ok(Envelope::ok(outcome))
}

async fn downtime_events(
    State(state): State<AppState>,
    ApiJson(batch): ApiJson<IngestBatch<DowntimeEventInput>>,
) -> ApiResult<EntityOutcome> {
    let outcome = state.db.ingest().downtime_events(&batch).await?;
    Ok(Envelope::ok(outcome))
}

async fn labor_punches(
    State(state): State<AppState>,
    ApiJson(batch): ApiJson<IngestBatch<LaborPunchInput>>,
) -> ApiResult<EntityOutcome> {
    let outcome = state.db.ingest().labor_punches(&batch).await?;
    Ok(Envelope::ok(outcome))
}

/// `POST /api/v1/ingest/finance/payouts:bulkUpsert`, location optional.
async fn payouts(
    State(state): State<AppState>,
    ApiJson(batch): ApiJson<PayoutBatch>,
) -> ApiResult<EntityOutcome> {
    let outcome = state.db.ingest().payouts(&batch).await?;
    Ok(Envelope::ok(outcome))
}

async fn stockouts(
    State(state): State<AppState>,
    ApiJson(batch): ApiJson<IngestBatch<StockoutInput>>,
) -> ApiResult<EntityOutcome> {
    let outcome = state.db.ingest().stockouts(&batch).await?;
    Ok(Envelope::ok(outcome))
}
