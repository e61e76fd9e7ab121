//! # Repository Module
//!
//! Database repository implementations for Opsledger.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Standalone (reads, reference data)                                     │
//! │                                                                         │
//! │    db.locations().create(&input)                                        │
//! │         │  acquires its own connection / transaction                    │
//! │         ▼                                                               │
//! │    LocationRepository ──► SQL ──► SQLite                                │
//! │                                                                         │
//! │  Unit of work (ingestion)                                               │
//! │                                                                         │
//! │    let mut tx = pool.begin().await?;                                    │
//! │    location::find_for_tenant(&mut tx, ..)                               │
//! │    business_day::resolve(&mut tx, ..)                                   │
//! │    dedup::record(&mut tx, ..)                                           │
//! │    tx.commit().await?;                                                  │
//! │                                                                         │
//! │  Free functions take `&mut SqliteConnection` and never open their own   │
//! │  transaction; the caller owns atomicity.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`tenant::TenantRepository`] - Tenants
//! - [`location::LocationRepository`] - Locations, weekly hours, exceptions
//! - [`business_day::BusinessDayRepository`] - Resolve/ensure business days
//! - [`source_system::SourceSystemRepository`] - Upstream feeds
//! - [`catalog::CatalogRepository`] - Items, item keys, channel mappings
//! - [`employee::EmployeeRepository`] - Employees
//! - [`ledger::LedgerRepository`] - Raw-event ledger
//! - [`dedup::DedupRepository`] - Structured-entity dedup map
//! - [`ticket::TicketRepository`] - Ticket reads
//! - [`operations::OperationsRepository`] - Operational row reads

pub mod business_day;
pub mod catalog;
pub mod dedup;
pub mod employee;
pub mod ledger;
pub mod location;
pub mod operations;
pub mod source_system;
pub mod tenant;
pub mod ticket;
