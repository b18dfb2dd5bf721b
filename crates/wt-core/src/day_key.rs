//! Canonical day keys.
//!
//! Every aggregate is keyed by the local calendar date of the time it
//! covers, formatted as zero-padded ISO `YYYY-MM-DD`. The format is fixed and
//! locale-independent, so lexicographic order matches chronological order.
//!
//! Earlier releases stored locale-formatted keys. [`DayKey::parse_legacy`]
//! reads those so they can be migrated once at startup.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, Instant};
use crate::error::TrackError;

const CANONICAL_FORMAT: &str = "%Y-%m-%d";

/// A calendar day identifying one aggregate bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// Key for the clock's current local date.
    pub fn today(clock: &impl Clock) -> Self {
        Self::key_for(&clock.now())
    }

    /// Key for the local calendar date of `instant`.
    pub fn key_for(instant: &Instant) -> Self {
        Self(instant.date_naive())
    }

    pub const fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    pub const fn date(self) -> NaiveDate {
        self.0
    }

    /// Parses a canonical key. Anything else is an [`TrackError::InvalidDateKey`].
    pub fn parse(key: &str) -> Result<Self, TrackError> {
        // `%Y` alone would accept unpadded or signed years; insist on the exact shape.
        let well_formed = key.len() == 10
            && key
                .bytes()
                .enumerate()
                .all(|(i, b)| if i == 4 || i == 7 { b == b'-' } else { b.is_ascii_digit() });
        if !well_formed {
            return Err(invalid(key));
        }
        NaiveDate::parse_from_str(key, CANONICAL_FORMAT)
            .map(Self)
            .map_err(|_| invalid(key))
    }

    /// Parses a canonical key or one written by an older release.
    ///
    /// Accepted legacy shapes:
    /// - `DD/MM/YYYY`, both fields zero-padded (the fixed dashboard format)
    /// - `M/D/YYYY`, any field unpadded (en-US locale date strings)
    ///
    /// A padded key that is not a valid day-first date is read month-first.
    pub fn parse_legacy(key: &str) -> Result<Self, TrackError> {
        if let Ok(parsed) = Self::parse(key) {
            return Ok(parsed);
        }

        let parts: Vec<&str> = key.split('/').collect();
        let [first, second, year] = parts.as_slice() else {
            return Err(invalid(key));
        };
        if year.len() != 4 || first.is_empty() || second.is_empty() {
            return Err(invalid(key));
        }
        let number = |s: &str| s.parse::<u32>().map_err(|_| invalid(key));
        let (a, b) = (number(first)?, number(second)?);
        let year = year.parse::<i32>().map_err(|_| invalid(key))?;

        let padded = first.len() == 2 && second.len() == 2;
        let day_first = NaiveDate::from_ymd_opt(year, b, a);
        let month_first = NaiveDate::from_ymd_opt(year, a, b);
        let date = if padded {
            day_first.or(month_first)
        } else {
            month_first
        };
        date.map(Self).ok_or_else(|| invalid(key))
    }

    /// True when this key is strictly older than `days` days before `relative_to`.
    ///
    /// A key exactly `days` old is kept; one `days + 1` old is not.
    pub fn is_older_than(self, days: u32, relative_to: &Instant) -> bool {
        let boundary = relative_to.date_naive() - Duration::days(i64::from(days));
        self.0 < boundary
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    pub fn month(self) -> u32 {
        self.0.month()
    }
}

fn invalid(key: &str) -> TrackError {
    TrackError::InvalidDateKey {
        key: key.to_string(),
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DayKey {
    type Error = TrackError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DayKey> for String {
    fn from(key: DayKey) -> Self {
        key.to_string()
    }
}
