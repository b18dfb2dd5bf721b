//! Read-only views over an [`Aggregates`] snapshot for the dashboard.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::aggregate::{Aggregates, DayBucket};
use crate::category::CategoryResolver;
use crate::day_key::DayKey;
use crate::error::TrackError;
use crate::types::{CategoryKey, SiteId};

static EMPTY_DAY: DayBucket = DayBucket::EMPTY;

/// Sites ordered by time spent, longest first. Ties are ordered by name.
pub fn sorted_sites(total: &BTreeMap<SiteId, u64>) -> Vec<(&SiteId, u64)> {
    let mut sites: Vec<(&SiteId, u64)> = total.iter().map(|(site, ms)| (site, *ms)).collect();
    sites.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    sites
}

/// Time per category, longest first. Categories with no time are omitted.
pub fn category_totals(
    total: &BTreeMap<SiteId, u64>,
    resolver: &CategoryResolver,
) -> Vec<(CategoryKey, u64)> {
    let mut by_category: BTreeMap<CategoryKey, u64> = BTreeMap::new();
    for (site, ms) in total {
        *by_category.entry(resolver.category_for(site)).or_default() += ms;
    }
    let mut totals: Vec<(CategoryKey, u64)> =
        by_category.into_iter().filter(|(_, ms)| *ms > 0).collect();
    totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    totals
}

/// The bucket for `key`, or an empty one if nothing was recorded that day.
pub fn lookup_day(aggregates: &Aggregates, key: DayKey) -> &DayBucket {
    aggregates.bucket(key).unwrap_or(&EMPTY_DAY)
}

/// One day cell of a month view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub day: DayKey,
    pub total_ms: u64,
    pub is_today: bool,
}

/// A month laid out for a Sunday-first calendar grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCalendar {
    pub year: i32,
    pub month: u32,
    /// Blank cells before the 1st (0 when the month starts on a Sunday).
    pub leading_blanks: u32,
    pub days: Vec<CalendarDay>,
}

pub fn month_calendar(
    aggregates: &Aggregates,
    year: i32,
    month: u32,
    today: DayKey,
) -> Result<MonthCalendar, TrackError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| TrackError::InvalidDateKey {
        key: format!("{year:04}-{month:02}"),
    })?;

    let days = first
        .iter_days()
        .take_while(|date| date.month() == month)
        .map(|date| {
            let day = DayKey::from_date(date);
            CalendarDay {
                day,
                total_ms: lookup_day(aggregates, day).day_total(),
                is_today: day == today,
            }
        })
        .collect();

    Ok(MonthCalendar {
        year,
        month,
        leading_blanks: first.weekday().num_days_from_sunday(),
        days,
    })
}

/// Formats a duration the way the dashboard shows it: `2h 5m`, `4m 30s`, `12s`.
pub fn format_duration(ms: u64) -> String {
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    if hours > 0 {
        format!("{hours}h {}m", minutes % 60)
    } else if minutes > 0 {
        format!("{minutes}m {}s", seconds % 60)
    } else {
        format!("{seconds}s")
    }
}
