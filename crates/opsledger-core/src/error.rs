//! # Error Types
//!
//! Domain-specific error types for opsledger-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  opsledger-core errors (this file)                                     │
//! │  ├── CoreError        - Calendar / domain rule failures                │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  opsledger-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  HTTP errors (in ingest-api)                                           │
//! │  └── ApiError         - What clients see (status + code)               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Per-event problems inside a batch (a missing `source_event_id`, an
//! unmapped item) are NOT errors at this level. They travel as warning
//! strings inside the batch outcome. These types cover the cases that stop
//! a whole operation.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Domain rule failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The IANA timezone name is not in the zone database.
    ///
    /// ## When This Occurs
    /// - Creating a location with a misspelled zone ("Asia/Karachy")
    /// - A stored location row carrying a zone removed from tzdata
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// A local wall-clock time could not be placed on the timeline.
    ///
    /// Only reachable for zones whose transitions skip more than the
    /// search window in [`crate::calendar::localize`].
    #[error("Local time {date} {time} does not exist in {timezone}")]
    UnresolvableLocalTime {
        date: NaiveDate,
        time: NaiveTime,
        timezone: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before any storage work runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., unparsable clock time, bad currency code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value inside one request (e.g., two hours rows for Monday).
    #[error("{field} '{value}' is duplicated")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::InvalidFormat`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
