//src/time.rs
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};

use crate::db::DbError;

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z, the store's reference date.
pub const STORE_EPOCH_UNIX_OFFSET_SECONDS: f64 = 978_307_200.0;

const CALENDAR_DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive bounds in store-native epoch seconds. `None` leaves that side open.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DateRange {
    pub from: Option<f64>,
    pub to: Option<f64>,
}

impl DateRange {
    pub const fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

/// Converts a store-native timestamp to a UTC datetime.
pub fn store_seconds_to_datetime(value: f64) -> Option<DateTime<Utc>> {
    let unix_millis = ((value + STORE_EPOCH_UNIX_OFFSET_SECONDS) * 1000.0).floor();
    if !unix_millis.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(unix_millis as i64)
}

/// Converts a store-native timestamp into an ISO-8601 string (`2023-03-08T20:28:20.000Z`).
pub fn epoch_seconds_to_iso(value: Option<f64>) -> Option<String> {
    value
        .and_then(store_seconds_to_datetime)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub fn datetime_to_store_seconds<Tz: TimeZone>(value: &DateTime<Tz>) -> f64 {
    value.timestamp_millis() as f64 / 1000.0 - STORE_EPOCH_UNIX_OFFSET_SECONDS
}

/// Parses a strict `YYYY-MM-DD` string. Anything that does not format back to the
/// same text (e.g. `2026-1-5`, `2026-02-30`) is rejected.
pub fn parse_calendar_date(value: &str) -> Result<NaiveDate, DbError> {
    let date = NaiveDate::parse_from_str(value, CALENDAR_DATE_FORMAT)
        .map_err(|_| DbError::InvalidDate(value.to_string()))?;
    if date.format(CALENDAR_DATE_FORMAT).to_string() != value {
        return Err(DbError::InvalidDate(value.to_string()));
    }
    Ok(date)
}

fn local_to_store_seconds(naive: NaiveDateTime) -> f64 {
    // Nonexistent local times (DST gaps) fall back to reading the wall clock as UTC.
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&naive));
    datetime_to_store_seconds(&local)
}

fn start_of_day(date: NaiveDate) -> f64 {
    local_to_store_seconds(date.and_time(NaiveTime::MIN))
}

fn end_of_day(date: NaiveDate) -> f64 {
    let last_millisecond =
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    local_to_store_seconds(date.and_time(last_millisecond))
}

/// Returns the `[startOfDay, endOfDay]` pair for one local calendar day.
pub fn calendar_date_to_epoch_range(value: &str) -> Result<(f64, f64), DbError> {
    let date = parse_calendar_date(value)?;
    Ok((start_of_day(date), end_of_day(date)))
}

/// Combines the day filters of a query into one range.
///
/// `on` covers exactly one day and cannot be combined with `from`/`to`. Otherwise each
/// side is parsed on its own; `from` after `to` is rejected.
pub fn resolve_date_range(
    from: Option<&str>,
    to: Option<&str>,
    on: Option<&str>,
) -> Result<DateRange, DbError> {
    if let Some(day) = on {
        if from.is_some() || to.is_some() {
            return Err(DbError::MutuallyExclusiveFilters(
                "a single day (on) cannot be combined with from/to".to_string(),
            ));
        }
        let (start, end) = calendar_date_to_epoch_range(day)?;
        return Ok(DateRange {
            from: Some(start),
            to: Some(end),
        });
    }

    let range = DateRange {
        from: from.map(calendar_date_to_epoch_range).transpose()?.map(|(start, _)| start),
        to: to.map(calendar_date_to_epoch_range).transpose()?.map(|(_, end)| end),
    };

    if let (Some(start), Some(end)) = (range.from, range.to) {
        if start > end {
            return Err(DbError::InvalidDateRange);
        }
    }
    Ok(range)
}
