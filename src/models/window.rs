// src/models/window.rs

//! Date window normalization.
//!
//! Callers give calendar dates as `YYYY-MM-DD` in their own zone. Both bounds
//! become the local midnight of that date in the reference zone, held as UTC
//! instants so they compare directly against any source timestamp.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};

use crate::error::{AppError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const MIN_YEAR: i32 = 1970;

/// Where a timestamp falls relative to a [`TimeWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    /// Strictly after `end`. Skip it, newer listings may still precede older ones.
    After,
    /// Between `start` and `end`, both inclusive.
    Inside,
    /// Strictly before `start`. Listings are newest-first, so nothing later qualifies.
    Before,
}

/// A normalized harvest window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    reference: FixedOffset,
}

impl TimeWindow {
    /// Parse two `YYYY-MM-DD` strings interpreted in `reference`.
    pub fn parse(start: &str, end: &str, reference: FixedOffset) -> Result<Self> {
        let start = parse_date(start)?;
        let end = parse_date(end)?;
        Self::from_dates(start, end, reference)
    }

    /// Build a window from calendar dates interpreted in `reference`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate, reference: FixedOffset) -> Result<Self> {
        if start > end {
            return Err(AppError::invalid_window(format!(
                "start {start} is after end {end}"
            )));
        }

        Ok(Self {
            start: local_midnight(start, reference)?,
            end: local_midnight(end, reference)?,
            reference,
        })
    }

    /// Build a window with the reference zone given as whole hours east of UTC.
    pub fn parse_with_offset_hours(start: &str, end: &str, offset_hours: i32) -> Result<Self> {
        Self::parse(start, end, offset_from_hours(offset_hours)?)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn reference(&self) -> FixedOffset {
        self.reference
    }

    /// Classify a timestamp against the window.
    pub fn position<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> WindowPosition {
        let ts = timestamp.with_timezone(&Utc);
        if ts > self.end {
            WindowPosition::After
        } else if ts < self.start {
            WindowPosition::Before
        } else {
            WindowPosition::Inside
        }
    }

    /// Calendar date of `timestamp` as seen in the reference zone.
    pub fn local_date<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> NaiveDate {
        timestamp.with_timezone(&self.reference).date_naive()
    }

    /// Lower bound in the `YYYY-MM-DDTHH:MM:SSZ` form REST filters expect.
    pub fn start_rfc3339(&self) -> String {
        self.start.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    /// Upper bound in the `YYYY-MM-DDTHH:MM:SSZ` form REST filters expect.
    pub fn end_rfc3339(&self) -> String {
        self.end.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

/// Fixed offset for a whole number of hours east of UTC.
pub fn offset_from_hours(hours: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(hours * 3600)
        .ok_or_else(|| AppError::invalid_window(format!("UTC offset {hours}h is out of range")))
}

/// Parse a source timestamp (RFC 3339, `Z` or numeric offset).
///
/// Returns `None` for malformed input and for instants before 1970.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let parsed = DateTime::parse_from_rfc3339(raw.trim()).ok()?;
    (parsed.timestamp() >= 0).then_some(parsed)
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|e| {
        AppError::invalid_window(format!("'{raw}' is not a YYYY-MM-DD date: {e}"))
    })?;
    if date.year() < MIN_YEAR {
        return Err(AppError::invalid_window(format!(
            "'{raw}' precedes {MIN_YEAR}"
        )));
    }
    Ok(date)
}

fn local_midnight(date: NaiveDate, reference: FixedOffset) -> Result<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .and_then(|naive| reference.from_local_datetime(&naive).single())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| AppError::invalid_window(format!("no local midnight for {date}")))
}
