//! # opsledger-db: Storage and Ingestion for Opsledger
//!
//! SQLite persistence via sqlx, plus the transactional workflows that turn
//! external feeds into ledger rows and structured entities.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Opsledger Data Flow                              │
//! │                                                                         │
//! │  ingest-api handler (POST tickets:bulkUpsert)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                   opsledger-db (THIS CRATE)                     │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │    │
//! │  │   │   Database    │    │   ingest      │    │  Migrations  │    │    │
//! │  │   │   (pool.rs)   │    │  Ingestor     │    │  (embedded)  │    │    │
//! │  │   │               │    │               │    │              │    │    │
//! │  │   │ SqlitePool    │◄───│ repository::* │    │ 001_initial  │    │    │
//! │  │   │ accessors     │    │ dedup, ledger │    │              │    │    │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘    │    │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     SQLite Database                             │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Per-table repositories and unit-of-work functions
//! - [`ingest`] - Structured bulk upserts (tickets and operational feeds)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use opsledger_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./opsledger.db")).await?;
//!
//! let day = db.business_days().resolve(tenant_id, location_id, Utc::now()).await?;
//! let outcome = db.ingest().bulk_upsert_tickets(&batch).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ingest;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use ingest::Ingestor;
pub use pool::{Database, DbConfig};

pub use repository::business_day::BusinessDayRepository;
pub use repository::ledger::{LedgerAppend, LedgerRepository};
pub use repository::ticket::TicketRepository;
