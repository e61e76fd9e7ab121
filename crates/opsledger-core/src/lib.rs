//! # opsledger-core: Pure Domain Logic for Opsledger
//!
//! Business-day arithmetic, ledger routing rules, exact money, and the
//! ingestion wire types. No I/O lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Opsledger Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    ingest-api (axum)                            │   │
//! │  │    bulk upserts ──► ledger append ──► business days ──► CRUD   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               opsledger-db (sqlx / SQLite)                      │   │
//! │  │    repositories, dedup map, ingestion orchestrators             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ opsledger-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │ calendar │ │  ledger  │ │  money   │ │  ingest  │          │   │
//! │  │   │ cutover  │ │ feeds    │ │ Amount   │ │ payloads │          │   │
//! │  │   │ DST      │ │ occurred │ │ totals   │ │ outcomes │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`calendar`] - Business-day windows, cutover, DST handling
//! - [`ledger`] - Feed-type routing and `occurred_at` precedence
//! - [`money`] - Exact decimal amounts
//! - [`types`] - Persisted entities
//! - [`ingest`] - Bulk-upsert payloads and outcomes
//! - [`reference`] - Reference-data create requests
//! - [`page`] - Cursor pagination
//! - [`validation`] - Input checks
//! - [`error`] - Domain error types
//!
//! ## Features
//!
//! - `sqlx`: implements `sqlx` encode/decode for [`money::Amount`] and
//!   [`types::Payload`] and derives `FromRow` on the entity types.
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{DateTime, Utc};
//! use opsledger_core::calendar::{default_cutover, parse_timezone, window_for_instant};
//!
//! let tz = parse_timezone("Asia/Karachi").unwrap();
//! let sale: DateTime<Utc> = "2026-01-16T01:30:00+05:00".parse().unwrap();
//!
//! // 01:30 local is before the 05:00 cutover, so it belongs to the 15th
//! let window = window_for_instant(sale, default_cutover(), tz).unwrap();
//! assert_eq!(window.business_date.to_string(), "2026-01-15");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod calendar;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod money;
pub mod page;
pub mod reference;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Amount, Quantity};
pub use types::*;
