//! Route groups and router assembly.

pub mod business_days;
pub mod health;
pub mod ingest;
pub mod ledger;
pub mod operations;
pub mod reference;
pub mod tickets;

use axum::extract::OriginalUri;
use axum::{middleware, Router};
use tower::ServiceBuilder;

use crate::context::request_context;
use crate::error::ApiError;
use crate::state::AppState;

/// Builds the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(ingest::routes())
        .merge(ledger::routes())
        .merge(business_days::routes())
        .merge(tickets::routes())
        .merge(reference::routes())
        .merge(operations::routes())
        .merge(health::routes())
        .fallback(not_found)
        .layer(ServiceBuilder::new().layer(middleware::from_fn(request_context)))
        .with_state(state)
}

async fn not_found(uri: OriginalUri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.0.path()))
}
