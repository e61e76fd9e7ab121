//! Ticket reads. Every lookup is scoped by `tenant_id`; child lists of a
//! ticket the tenant does not own are a 404, not an empty list.

use axum::extract::State;
use axum::routing::get;
use axum::Router;

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::extract::{ApiPath, ApiQuery, PageParams, TenantParam};
use crate::state::AppState;
use opsledger_core::{
    Ticket, TicketDetail, TicketDiscount, TicketLineItem, TicketPayment, TicketRefund, TicketVoid,
};
use opsledger_db::repository::ticket::TicketFilter;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/tickets", get(list_tickets))
        .route("/api/v1/tickets/{ticket_id}", get(get_ticket))
        .route("/api/v1/tickets/{ticket_id}/line-items", get(line_items))
        .route("/api/v1/tickets/{ticket_id}/payments", get(payments))
        .route("/api/v1/tickets/{ticket_id}/discounts", get(discounts))
        .route("/api/v1/tickets/{ticket_id}/voids", get(voids))
        .route("/api/v1/tickets/{ticket_id}/refunds", get(refunds))
}

/// `GET /api/v1/tickets/{id}?tenant_id=` with every child collection.
async fn get_ticket(
    State(state): State<AppState>,
    ApiPath(ticket_id): ApiPath<i64>,
    ApiQuery(tenant): ApiQuery<TenantParam>,
) -> ApiResult<Envelope<TicketDetail>> {
    let detail = state.db.tickets().get(tenant.tenant_id, ticket_id).await?;
    Ok(Envelope::ok(detail))
}

async fn list_tickets(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<TicketFilter>,
) -> ApiResult<Envelope<Vec<Ticket>>> {
    let page = page.resolve(&state)?;
    let tickets = state.db.tickets().list(&filter, &page).await?;
    Ok(Envelope::page(tickets, &page))
}

async fn line_items(
    State(state): State<AppState>,
    ApiPath(ticket_id): ApiPath<i64>,
    ApiQuery(tenant): ApiQuery<TenantParam>,
) -> ApiResult<Envelope<Vec<TicketLineItem>>> {
    state.db.tickets().get_ticket(tenant.tenant_id, ticket_id).await?;
    let rows = state.db.tickets().line_items(tenant.tenant_id, ticket_id).await?;
    Ok(Envelope::ok(rows))
}

async fn payments(
    State(state): State<AppState>,
    ApiPath(ticket_id): ApiPath<i64>,
    ApiQuery(tenant): ApiQuery<TenantParam>,
) -> ApiResult<Envelope<Vec<TicketPayment>>> {
    state.db.tickets().get_ticket(tenant.tenant_id, ticket_id).await?;
    let rows = state.db.tickets().payments(tenant.tenant_id, ticket_id).await?;
    Ok(Envelope::ok(rows))
}

async fn discounts(
    State(state): State<AppState>,
    ApiPath(ticket_id): ApiPath<i64>,
    ApiQuery(tenant): ApiQuery<TenantParam>,
) -> ApiResult<Envelope<Vec<TicketDiscount>>> {
    state.db.tickets().get_ticket(tenant.tenant_id, ticket_id).await?;
    let rows = state.db.tickets().discounts(tenant.tenant_id, ticket_id).await?;
    Ok(Envelope::ok(rows))
}

async fn voids(
    State(state): State<AppState>,
    ApiPath(ticket_id): ApiPath<i64>,
    ApiQuery(tenant): ApiQuery<TenantParam>,
) -> ApiResult<Envelope<Vec<TicketVoid>>> {
    state.db.tickets().get_ticket(tenant.tenant_id, ticket_id).await?;
    let rows = state.db.tickets().voids(tenant.tenant_id, ticket_id).await?;
    Ok(Envelope::ok(rows))
}

async fn refunds(
    State(state): State<AppState>,
    ApiPath(ticket_id): ApiPath<i64>,
    ApiQuery(tenant): ApiQuery<TenantParam>,
) -> ApiResult<Envelope<Vec<TicketRefund>>> {
    state.db.tickets().get_ticket(tenant.tenant_id, ticket_id).await?;
    let rows = state.db.tickets().refunds(tenant.tenant_id, ticket_id).await?;
    Ok(Envelope::ok(rows))
}
