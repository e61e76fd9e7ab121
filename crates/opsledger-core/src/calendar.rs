//! # Calendar Module
//!
//! Timezone-aware business-day arithmetic. Pure functions, no storage.
//!
//! ## Business Day Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │            Business date 2026-01-15, cutover 05:00, Asia/Karachi        │
//! │                                                                         │
//! │  local   01-15 05:00 ─────────────── 01-16 04:59:59 │ 01-16 05:00 ...   │
//! │  utc     01-15 00:00 ─────────────── 01-15 23:59:59 │ 01-16 00:00 ...   │
//! │          ▲ starts_at                  ▲ ends_at      ▲ next day starts  │
//! │                                                                         │
//! │  A sale rung up at 02:00 local on the 16th still belongs to the 15th:  │
//! │  local clock < cutover → business date is the previous calendar day.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## DST
//! `starts_at` is `business_date + cutover` placed in the zone:
//! - ambiguous (fall back): the earliest instant wins
//! - nonexistent (spring forward): the first valid local minute after the gap
//!
//! `ends_at` is always `starts_at + 86399s`. The bounds never stretch or shrink
//! with DST.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};

/// Hour of the default cutover when a location has no hours configured.
pub const DEFAULT_CUTOVER_HOUR: u32 = 5;

/// `ends_at - starts_at` for every business day.
pub const BUSINESS_DAY_SPAN_SECONDS: i64 = 86_399;

/// How far past a DST gap [`localize`] searches for the first valid minute.
const GAP_SEARCH_MINUTES: i64 = 48 * 60;

/// Returns the 05:00 cutover used when a location has no hours rows.
pub fn default_cutover() -> NaiveTime {
    NaiveTime::from_hms_opt(DEFAULT_CUTOVER_HOUR, 0, 0).unwrap_or(NaiveTime::MIN)
}

// =============================================================================
// Zones and Clock Times
// =============================================================================

/// Parses an IANA zone name such as `Asia/Karachi`.
pub fn parse_timezone(name: &str) -> CoreResult<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| CoreError::UnknownTimezone(name.to_string()))
}

/// Parses a local clock time written as `HH:MM` or `HH:MM:SS`.
pub fn parse_local_time(field: &str, value: &str) -> Result<NaiveTime, ValidationError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ValidationError::invalid(field, format!("'{value}' is not HH:MM")))
}

/// Formats a local clock time as `HH:MM`.
pub fn format_local_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Day-of-week index used by location hours: Monday = 0 ... Sunday = 6.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

/// Places a local wall-clock time on the UTC timeline.
///
/// ## Example
/// ```rust
/// use chrono::{NaiveDate, NaiveTime};
/// use opsledger_core::calendar::{localize, parse_timezone};
///
/// let tz = parse_timezone("Asia/Karachi").unwrap();
/// let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
/// let five = NaiveTime::from_hms_opt(5, 0, 0).unwrap();
/// assert_eq!(localize(tz, date, five).unwrap().to_rfc3339(), "2026-01-15T00:00:00+00:00");
/// ```
pub fn localize(tz: Tz, date: NaiveDate, time: NaiveTime) -> CoreResult<DateTime<Utc>> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => first_after_gap(tz, naive).ok_or_else(|| {
            CoreError::UnresolvableLocalTime {
                date,
                time,
                timezone: tz.name().to_string(),
            }
        }),
    }
}

fn first_after_gap(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    // Transitions land on minute boundaries; snap to the minute first.
    let base = naive.date().and_hms_opt(naive.hour(), naive.minute(), 0)?;
    (1..=GAP_SEARCH_MINUTES).find_map(|step| {
        tz.from_local_datetime(&(base + Duration::minutes(step)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

// =============================================================================
// Business Day Window
// =============================================================================

/// The canonical identity and bounds of one business day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessDayWindow {
    pub business_date: NaiveDate,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Business date for a local wall-clock reading.
///
/// Readings before the cutover count toward the previous calendar day.
pub fn business_date_for(local: NaiveDateTime, cutover: NaiveTime) -> NaiveDate {
    let date = local.date();
    if local.time() < cutover {
        date.pred_opt().unwrap_or(date)
    } else {
        date
    }
}

/// Window for an explicit business date.
pub fn window_for_date(
    business_date: NaiveDate,
    cutover: NaiveTime,
    tz: Tz,
) -> CoreResult<BusinessDayWindow> {
    let starts_at = localize(tz, business_date, cutover)?;
    let ends_at = starts_at + Duration::seconds(BUSINESS_DAY_SPAN_SECONDS);
    Ok(BusinessDayWindow {
        business_date,
        starts_at,
        ends_at,
    })
}

/// Window containing an instant, as seen from the location's zone.
pub fn window_for_instant(
    instant: DateTime<Utc>,
    cutover: NaiveTime,
    tz: Tz,
) -> CoreResult<BusinessDayWindow> {
    let local = instant.with_timezone(&tz).naive_local();
    window_for_date(business_date_for(local, cutover), cutover, tz)
}

// =============================================================================
// Planned Hours
// =============================================================================

/// Open/close clock times for one local date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningHours {
    pub open_local: NaiveTime,
    pub close_local: NaiveTime,
    pub is_closed: bool,
}

/// A dated exception. Missing times fall back to the weekly row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoursOverride {
    pub open_local: Option<NaiveTime>,
    pub close_local: Option<NaiveTime>,
    pub is_closed: bool,
}

/// Merges the weekly row for a date with that date's exception, if any.
pub fn effective_hours(
    weekly: Option<OpeningHours>,
    exception: Option<HoursOverride>,
) -> Option<OpeningHours> {
    match exception {
        None => weekly,
        Some(ex) if ex.is_closed => Some(OpeningHours {
            open_local: ex.open_local.unwrap_or(NaiveTime::MIN),
            close_local: ex.close_local.unwrap_or(NaiveTime::MIN),
            is_closed: true,
        }),
        Some(ex) => {
            let open = ex.open_local.or(weekly.map(|w| w.open_local))?;
            let close = ex.close_local.or(weekly.map(|w| w.close_local))?;
            Some(OpeningHours {
                open_local: open,
                close_local: close,
                is_closed: false,
            })
        }
    }
}

/// Planned open/close instants for a business date.
///
/// A close at or before the open time means trading runs past midnight, so
/// the close lands on the next calendar day.
pub fn planned_window(
    business_date: NaiveDate,
    hours: Option<OpeningHours>,
    tz: Tz,
) -> CoreResult<Option<(DateTime<Utc>, DateTime<Utc>)>> {
    let Some(hours) = hours.filter(|h| !h.is_closed) else {
        return Ok(None);
    };
    let open = localize(tz, business_date, hours.open_local)?;
    let close_date = if hours.close_local <= hours.open_local {
        business_date.succ_opt().unwrap_or(business_date)
    } else {
        business_date
    };
    let close = localize(tz, close_date, hours.close_local)?;
    Ok(Some((open, close)))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_cutover_boundary() {
        let tz = parse_timezone("Asia/Karachi").unwrap();

        // 04:59 local on the 16th is still the 15th
        let before = window_for_instant(utc("2026-01-16T04:59:00+05:00"), default_cutover(), tz)
            .unwrap();
        assert_eq!(before.business_date, date(2026, 1, 15));

        // 05:00 local starts the 16th
        let at = window_for_instant(utc("2026-01-16T05:00:00+05:00"), default_cutover(), tz)
            .unwrap();
        assert_eq!(at.business_date, date(2026, 1, 16));
    }

    #[test]
    fn test_window_bounds_in_utc() {
        let tz = parse_timezone("Asia/Karachi").unwrap();
        let window = window_for_date(date(2026, 1, 15), default_cutover(), tz).unwrap();

        assert_eq!(window.starts_at, utc("2026-01-15T00:00:00Z"));
        assert_eq!(window.ends_at, utc("2026-01-15T23:59:59Z"));
        assert_eq!(
            (window.ends_at - window.starts_at).num_seconds(),
            BUSINESS_DAY_SPAN_SECONDS
        );
    }

    #[test]
    fn test_span_is_fixed_across_dst() {
        let tz = parse_timezone("America/New_York").unwrap();
        for d in [date(2026, 3, 8), date(2026, 11, 1), date(2026, 7, 4)] {
            let window = window_for_date(d, default_cutover(), tz).unwrap();
            assert_eq!((window.ends_at - window.starts_at).num_seconds(), 86_399);
        }
    }

    #[test]
    fn test_spring_forward_gap_moves_to_first_valid_minute() {
        let tz = parse_timezone("America/New_York").unwrap();
        // 02:30 does not exist on 2026-03-08; clocks jump 02:00 EST → 03:00 EDT
        let starts = localize(tz, date(2026, 3, 8), hm(2, 30)).unwrap();
        assert_eq!(starts, utc("2026-03-08T07:00:00Z"));
    }

    #[test]
    fn test_fall_back_overlap_takes_earliest() {
        let tz = parse_timezone("America/New_York").unwrap();
        // 01:30 happens twice on 2026-11-01; the EDT reading comes first
        let starts = localize(tz, date(2026, 11, 1), hm(1, 30)).unwrap();
        assert_eq!(starts, utc("2026-11-01T05:30:00Z"));
    }

    #[test]
    fn test_unknown_timezone() {
        assert!(matches!(
            parse_timezone("Asia/Karachy"),
            Err(CoreError::UnknownTimezone(_))
        ));
    }

    #[test]
    fn test_parse_local_time_formats() {
        assert_eq!(parse_local_time("cutover", "05:00").unwrap(), hm(5, 0));
        assert_eq!(parse_local_time("cutover", "23:15:00").unwrap(), hm(23, 15));
        assert!(parse_local_time("cutover", "5am").is_err());
        assert_eq!(format_local_time(hm(5, 0)), "05:00");
    }

    #[test]
    fn test_weekday_index_starts_monday() {
        // 2026-01-12 is a Monday
        assert_eq!(weekday_index(date(2026, 1, 12)), 0);
        assert_eq!(weekday_index(date(2026, 1, 18)), 6);
    }

    #[test]
    fn test_planned_window_overnight_close() {
        let tz = parse_timezone("Asia/Karachi").unwrap();
        let hours = OpeningHours {
            open_local: hm(10, 0),
            close_local: hm(2, 0),
            is_closed: false,
        };
        let (open, close) = planned_window(date(2026, 1, 15), Some(hours), tz)
            .unwrap()
            .unwrap();
        assert_eq!(open, utc("2026-01-15T05:00:00Z"));
        assert_eq!(close, utc("2026-01-15T21:00:00Z"));
    }

    #[test]
    fn test_closed_exception_clears_planned_window() {
        let tz = parse_timezone("Asia/Karachi").unwrap();
        let weekly = OpeningHours {
            open_local: hm(10, 0),
            close_local: hm(23, 0),
            is_closed: false,
        };
        let closed = HoursOverride {
            open_local: None,
            close_local: None,
            is_closed: true,
        };
        let hours = effective_hours(Some(weekly), Some(closed));
        assert!(planned_window(date(2026, 1, 15), hours, tz).unwrap().is_none());
    }

    #[test]
    fn test_exception_overrides_only_given_times() {
        let weekly = OpeningHours {
            open_local: hm(10, 0),
            close_local: hm(23, 0),
            is_closed: false,
        };
        let late_open = HoursOverride {
            open_local: Some(hm(14, 0)),
            close_local: None,
            is_closed: false,
        };
        let merged = effective_hours(Some(weekly), Some(late_open)).unwrap();
        assert_eq!(merged.open_local, hm(14, 0));
        assert_eq!(merged.close_local, hm(23, 0));
    }
}
