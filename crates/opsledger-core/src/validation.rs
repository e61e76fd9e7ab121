//! # Validation Module
//!
//! Input checks that run before any storage work.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: HTTP extractors (ingest-api)                                  │
//! │  └── JSON shape, required fields, types                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── reference data: names, zones, currency codes, hours                │
//! │  └── ingestion: per-item source_event_id presence                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                        │
//! │  ├── UNIQUE indexes (dedup keys, business-day identity)                 │
//! │  └── FOREIGN KEY constraints                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ingestion checks return `bool` because a failure is a per-item warning,
//! not an error. Reference-data checks return [`ValidationResult`].

use chrono::NaiveTime;
use chrono_tz::Tz;
use std::collections::HashSet;

use crate::calendar::{default_cutover, parse_local_time, parse_timezone, HoursOverride};
use crate::error::{CoreResult, ValidationError};
use crate::ingest::TicketInput;
use crate::reference::{LocationHoursInput, NewHoursException};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted display name.
pub const MAX_NAME_LEN: usize = 200;

// =============================================================================
// Ingestion Checks
// =============================================================================

/// True when an idempotency token is present.
pub fn has_source_event_id(source_event_id: &str) -> bool {
    !source_event_id.trim().is_empty()
}

/// True when the ticket and every child carry a `source_event_id`.
///
/// ## Example
/// ```rust
/// use opsledger_core::ingest::TicketInput;
/// use opsledger_core::validation::ticket_event_ids_present;
///
/// let ticket: TicketInput = serde_json::from_value(serde_json::json!({
///     "source_event_id": "T-1",
///     "opened_at": "2026-01-15T07:00:00Z",
///     "gross_amount": 10, "net_amount": 10,
///     "payments": [{"tender_type": "CASH", "amount": 10, "paid_at": "2026-01-15T07:05:00Z"}]
/// })).unwrap();
/// assert!(!ticket_event_ids_present(&ticket));
/// ```
pub fn ticket_event_ids_present(ticket: &TicketInput) -> bool {
    has_source_event_id(&ticket.source_event_id)
        && ticket.child_event_ids().all(has_source_event_id)
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name and returns it trimmed.
pub fn validate_name(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(value.to_string())
}

/// Validates an ISO 4217 style code and returns it upper-cased.
///
/// ## Example
/// ```rust
/// use opsledger_core::validation::validate_currency_code;
///
/// assert_eq!(validate_currency_code("pkr").unwrap(), "PKR");
/// assert!(validate_currency_code("RUPEES").is_err());
/// ```
pub fn validate_currency_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::required("currency_code"));
    }

    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::invalid(
            "currency_code",
            "must be three letters",
        ));
    }

    Ok(code.to_ascii_uppercase())
}

/// Validates an IANA zone name. Unknown zones are a [`crate::CoreError`].
pub fn validate_timezone(name: &str) -> CoreResult<Tz> {
    if name.trim().is_empty() {
        return Err(ValidationError::required("timezone").into());
    }
    parse_timezone(name)
}

// =============================================================================
// Hours Validators
// =============================================================================

/// Validates a weekday index (Monday = 0 ... Sunday = 6).
pub fn validate_day_of_week(day_of_week: i64) -> ValidationResult<()> {
    if !(0..=6).contains(&day_of_week) {
        return Err(ValidationError::OutOfRange {
            field: "day_of_week".to_string(),
            min: 0,
            max: 6,
        });
    }
    Ok(())
}

/// One weekday row, parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidDayHours {
    pub day_of_week: i64,
    pub open_local: NaiveTime,
    pub close_local: NaiveTime,
    pub is_closed: bool,
}

/// A full weekly schedule, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidHours {
    pub cutover: NaiveTime,
    pub days: Vec<ValidDayHours>,
}

/// Validates a replace-all hours request.
///
/// ## Rules
/// - `day_of_week` in 0..=6, each at most once
/// - open days need both `open_local` and `close_local`
/// - closed days may omit times (stored as 00:00)
/// - cutover defaults to 05:00
pub fn validate_location_hours(input: &LocationHoursInput) -> ValidationResult<ValidHours> {
    let cutover = match input.business_day_cutover_local.as_deref() {
        Some(raw) => parse_local_time("business_day_cutover_local", raw)?,
        None => default_cutover(),
    };

    let mut seen = HashSet::new();
    let mut days = Vec::with_capacity(input.days.len());

    for day in &input.days {
        validate_day_of_week(day.day_of_week)?;
        if !seen.insert(day.day_of_week) {
            return Err(ValidationError::Duplicate {
                field: "day_of_week".to_string(),
                value: day.day_of_week.to_string(),
            });
        }

        let open = optional_time("open_local", day.open_local.as_deref())?;
        let close = optional_time("close_local", day.close_local.as_deref())?;

        let (open_local, close_local) = match (open, close, day.is_closed) {
            (Some(open), Some(close), _) => (open, close),
            (open, close, true) => (
                open.unwrap_or(NaiveTime::MIN),
                close.unwrap_or(NaiveTime::MIN),
            ),
            (None, _, false) => return Err(ValidationError::required("open_local")),
            (_, None, false) => return Err(ValidationError::required("close_local")),
        };

        days.push(ValidDayHours {
            day_of_week: day.day_of_week,
            open_local,
            close_local,
            is_closed: day.is_closed,
        });
    }

    days.sort_by_key(|d| d.day_of_week);
    Ok(ValidHours { cutover, days })
}

/// Validates a dated exception and returns its parsed override.
pub fn validate_hours_exception(input: &NewHoursException) -> ValidationResult<HoursOverride> {
    Ok(HoursOverride {
        open_local: optional_time("open_local", input.open_local.as_deref())?,
        close_local: optional_time("close_local", input.close_local.as_deref())?,
        is_closed: input.is_closed,
    })
}

fn optional_time(field: &str, raw: Option<&str>) -> ValidationResult<Option<NaiveTime>> {
    raw.map(|value| parse_local_time(field, value)).transpose()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::reference::DayHoursInput;

    fn day(dow: i64, open: Option<&str>, close: Option<&str>, closed: bool) -> DayHoursInput {
        DayHoursInput {
            day_of_week: dow,
            open_local: open.map(str::to_string),
            close_local: close.map(str::to_string),
            is_closed: closed,
        }
    }

    #[test]
    fn test_has_source_event_id() {
        assert!(has_source_event_id("T-1"));
        assert!(!has_source_event_id(""));
        assert!(!has_source_event_id("   "));
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("name", "  Clifton  ").unwrap(), "Clifton");
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_timezone() {
        assert!(validate_timezone("Asia/Karachi").is_ok());
        assert!(matches!(
            validate_timezone("Asia/Karachy"),
            Err(CoreError::UnknownTimezone(_))
        ));
        assert!(matches!(validate_timezone(""), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_validate_day_of_week() {
        assert!(validate_day_of_week(0).is_ok());
        assert!(validate_day_of_week(6).is_ok());
        assert!(validate_day_of_week(7).is_err());
        assert!(validate_day_of_week(-1).is_err());
    }

    #[test]
    fn test_location_hours_defaults_and_sorting() {
        let input = LocationHoursInput {
            tenant_id: 1,
            business_day_cutover_local: None,
            days: vec![
                day(6, None, None, true),
                day(0, Some("11:00"), Some("02:00"), false),
            ],
        };
        let hours = validate_location_hours(&input).unwrap();

        assert_eq!(hours.cutover, default_cutover());
        assert_eq!(hours.days[0].day_of_week, 0);
        assert_eq!(hours.days[1].open_local, NaiveTime::MIN);
        assert!(hours.days[1].is_closed);
    }

    #[test]
    fn test_location_hours_rejects_duplicates_and_missing_times() {
        let dup = LocationHoursInput {
            tenant_id: 1,
            business_day_cutover_local: Some("04:00".to_string()),
            days: vec![
                day(1, Some("09:00"), Some("17:00"), false),
                day(1, Some("10:00"), Some("18:00"), false),
            ],
        };
        assert!(matches!(
            validate_location_hours(&dup),
            Err(ValidationError::Duplicate { .. })
        ));

        let missing = LocationHoursInput {
            tenant_id: 1,
            business_day_cutover_local: None,
            days: vec![day(2, Some("09:00"), None, false)],
        };
        assert!(matches!(
            validate_location_hours(&missing),
            Err(ValidationError::Required { .. })
        ));
    }
}
