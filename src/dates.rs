//! Date normalization.
//!
//! Legacy documents record dates in whatever shape the producing system
//! preferred. [`DateNormalizer`] accepts the common ones, pins the time of
//! day to noon (so a timezone shift can never move the calendar date), and
//! renders the configured output format. Directory modification times are
//! pushed through the same path so fallback dates look identical to mapped
//! ones.

use std::sync::OnceLock;
use std::time::SystemTime;

use anyhow::{bail, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

/// Datetime layouts tried after RFC 3339 / RFC 2822.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%b %d %H:%M:%S %Y",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%B %d %Y %I:%M%p",
    "%B %d %Y %I:%M %p",
    "%b %d %Y %I:%M%p",
    "%b %d %Y %I:%M %p",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
    "%B %d %Y %H:%M",
    "%b %d %Y %H:%M",
    "%Y%m%d%H%M%S",
];

/// Datetime layouts carrying a UTC offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%b %d %H:%M:%S %z %Y",
];

/// Date-only layouts.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%m-%d-%Y",
    "%Y%m%d",
    "%d %B %Y",
    "%d %b %Y",
    "%d-%b-%Y",
    "%d, %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
];

/// Month-and-year layouts; the day is pinned to the 1st.
const MONTH_FORMATS: &[&str] = &["%d %B %Y", "%d %b %Y", "%d %Y-%m"];

fn weekday_re() -> &'static Regex {
    static WEEKDAY_RE: OnceLock<Regex> = OnceLock::new();
    WEEKDAY_RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+")
            .expect("valid weekday regex")
    })
}

fn ordinal_re() -> &'static Regex {
    static ORDINAL_RE: OnceLock<Regex> = OnceLock::new();
    ORDINAL_RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").expect("valid ordinal regex")
    })
}

fn zone_name_re() -> &'static Regex {
    static ZONE_NAME_RE: OnceLock<Regex> = OnceLock::new();
    ZONE_NAME_RE.get_or_init(|| Regex::new(r"(?i)\s+(?:utc|gmt|z)$").expect("valid zone regex"))
}

/// Drop the parts of a date string that carry no calendar information:
/// a leading weekday name, ordinal suffixes, a trailing UTC/GMT zone name,
/// and repeated whitespace.
fn clean(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let no_weekday = weekday_re().replace(&collapsed, "");
    let no_ordinal = ordinal_re().replace_all(&no_weekday, "$1");
    zone_name_re().replace(&no_ordinal, "").into_owned()
}

/// Years chrono reads from one or two digits under `%Y` are misparses.
fn plausible(date: NaiveDate) -> Option<NaiveDate> {
    (1000..=9999).contains(&date.year()).then_some(date)
}

#[derive(Debug, Clone)]
pub struct DateNormalizer {
    format: String,
}

impl DateNormalizer {
    /// Build a normalizer rendering dates with a chrono strftime `format`.
    ///
    /// Fails if the format string contains an unknown specifier.
    pub fn new(format: &str) -> Result<Self> {
        if format.trim().is_empty() {
            bail!("date format must not be empty");
        }
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            bail!("invalid date format: '{}'", format);
        }
        Ok(Self {
            format: format.to_string(),
        })
    }

    /// Parse a loosely formatted date string and render it canonically.
    pub fn normalize(&self, raw: &str) -> Result<String> {
        let date = self.parse_date(raw.trim())?;
        let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default());
        Ok(noon.format(&self.format).to_string())
    }

    /// Render a filesystem modification time.
    ///
    /// The timestamp is converted to a local datetime string first and then
    /// parsed by [`normalize`](Self::normalize), so both paths share one
    /// canonicalization.
    pub fn normalize_timestamp(&self, mtime: SystemTime) -> Result<String> {
        let local: DateTime<Local> = mtime.into();
        let raw = local.format("%Y-%m-%d %H:%M:%S%.f").to_string();
        self.normalize(&raw)
    }

    fn parse_date(&self, raw: &str) -> Result<NaiveDate> {
        if raw.is_empty() {
            bail!("empty date string");
        }

        // Our own output always parses back to the same date.
        if let Some(d) = NaiveDate::parse_from_str(raw, &self.format).ok().and_then(plausible) {
            return Ok(d);
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.naive_local().date());
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
            return Ok(dt.naive_local().date());
        }

        let cleaned = clean(raw);
        let text = cleaned.as_str();
        for fmt in OFFSET_FORMATS {
            if let Some(d) = DateTime::parse_from_str(text, fmt)
                .ok()
                .and_then(|dt| plausible(dt.naive_local().date()))
            {
                return Ok(d);
            }
        }
        for fmt in DATETIME_FORMATS {
            if let Some(d) = NaiveDateTime::parse_from_str(text, fmt)
                .ok()
                .and_then(|dt| plausible(dt.date()))
            {
                return Ok(d);
            }
        }
        for fmt in DATE_FORMATS {
            if let Some(d) = NaiveDate::parse_from_str(text, fmt).ok().and_then(plausible) {
                return Ok(d);
            }
        }
        let first_of_month = format!("1 {}", text);
        for fmt in MONTH_FORMATS {
            if let Some(d) = NaiveDate::parse_from_str(&first_of_month, fmt)
                .ok()
                .and_then(plausible)
            {
                return Ok(d);
            }
        }

        bail!("unrecognized date: '{}'", raw)
    }
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self {
            format: "%Y-%m-%d".to_string(),
        }
    }
}
