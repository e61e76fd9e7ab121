//! # Opsledger Ingest API
//!
//! HTTP surface for feed ingestion, business days and reference data.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Ingest API Routes                               │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  ingest        │  │  ledger        │  │  business_days             ││
//! │  │                │  │                │  │                            ││
//! │  │ • tickets      │  │ • erp append   │  │ • resolve                  ││
//! │  │ • signals      │  │ • master data  │  │ • ensure                   ││
//! │  │ • downtime     │  │ • list events  │  │ • get / list               ││
//! │  │ • punches      │  └────────────────┘  └────────────────────────────┘│
//! │  │ • payouts      │                                                    │
//! │  │ • stockouts    │  ┌────────────────┐  ┌────────────────────────────┐│
//! │  └────────────────┘  │  tickets       │  │  reference / operations    ││
//! │                      │ • get / list   │  │ • tenants, locations, ...  ││
//! │                      │ • children     │  │ • external-id-map          ││
//! │                      └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  request_context middleware: x-request-id in, span, x-request-id out   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! `opsledger.toml` and `OPSLEDGER_*` environment variables, see [`config`].

pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

// Re-exports
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;
