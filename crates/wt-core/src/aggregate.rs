//! Daily and historical time aggregates.
//!
//! # Model
//!
//! [`Aggregates`] holds two maps keyed by [`DayKey`]:
//! - `current`: open days, normally only today
//! - `historical`: closed days, trimmed to a retention window
//!
//! Each [`DayBucket`] keeps per-site milliseconds for the whole day and per
//! local hour. `total[site]` always equals the sum of `hourly[*][site]`;
//! [`DayBucket::add`] is the only write path and updates both together.
//!
//! # Day boundaries
//!
//! An interval that crosses local midnight is split there and each part is
//! credited to its own day. Within a day, time is filed under the hour that
//! contains the interval's last millisecond.
//!
//! # Persistence
//!
//! [`AggregateStore`] wraps a [`KeyValueStore`] and performs every mutation as
//! one load, modify and save cycle with no suspension point in between.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::{DateTime, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::Instant;
use crate::day_key::DayKey;
use crate::error::{DiscardReason, TrackError};
use crate::store::{CURRENT_DATE, DAILY_DATA, HISTORICAL_DATA, KeyValueStore};
use crate::types::SiteId;

/// Longest interval accepted; anything longer is a clock jump or sleep.
pub const MAX_INTERVAL_MS: i64 = 24 * 60 * 60 * 1000;

/// Days of history kept by default.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Per-site time for a single day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredBucket")]
pub struct DayBucket {
    total: BTreeMap<SiteId, u64>,
    hourly: BTreeMap<u8, BTreeMap<SiteId, u64>>,
}

impl DayBucket {
    /// A day with no recorded time.
    pub const EMPTY: Self = Self {
        total: BTreeMap::new(),
        hourly: BTreeMap::new(),
    };

    /// Milliseconds per site over the whole day.
    pub const fn total(&self) -> &BTreeMap<SiteId, u64> {
        &self.total
    }

    /// Milliseconds per site, grouped by local hour (0-23).
    pub const fn hourly(&self) -> &BTreeMap<u8, BTreeMap<SiteId, u64>> {
        &self.hourly
    }

    pub fn site_total(&self, site: &SiteId) -> u64 {
        self.total.get(site).copied().unwrap_or(0)
    }

    pub fn hour_total(&self, hour: u8, site: &SiteId) -> u64 {
        self.hourly
            .get(&hour)
            .and_then(|sites| sites.get(site))
            .copied()
            .unwrap_or(0)
    }

    /// Sum over all sites.
    pub fn day_total(&self) -> u64 {
        self.total.values().sum()
    }

    /// Milliseconds per hour over all sites, indexed by hour.
    pub fn hour_totals(&self) -> [u64; 24] {
        let mut hours = [0u64; 24];
        for (hour, sites) in &self.hourly {
            if let Some(slot) = hours.get_mut(usize::from(*hour)) {
                *slot += sites.values().sum::<u64>();
            }
        }
        hours
    }

    pub fn is_empty(&self) -> bool {
        self.total.is_empty()
    }

    /// Checks the `total == Σ hourly` invariant for every site.
    pub fn is_consistent(&self) -> bool {
        let mut summed: BTreeMap<&SiteId, u64> = BTreeMap::new();
        for sites in self.hourly.values() {
            for (site, ms) in sites {
                *summed.entry(site).or_default() += ms;
            }
        }
        summed.len() == self.total.len()
            && self
                .total
                .iter()
                .all(|(site, ms)| summed.get(site) == Some(ms))
    }

    /// Credits `ms` to `site` in `hour`, creating nested entries as needed.
    pub(crate) fn add(&mut self, site: &SiteId, hour: u8, ms: u64) {
        *self.total.entry(site.clone()).or_default() += ms;
        *self
            .hourly
            .entry(hour)
            .or_default()
            .entry(site.clone())
            .or_default() += ms;
    }

    /// Adds every entry of `other` into this bucket.
    pub(crate) fn merge(&mut self, other: Self) {
        for (hour, sites) in other.hourly {
            for (site, ms) in sites {
                self.add(&site, hour, ms);
            }
        }
    }

    /// Restores the invariant on a bucket read from storage.
    ///
    /// Time present in `total` but missing from `hourly` is filed under hour 0;
    /// hourly time missing from `total` is added to it.
    fn heal(mut self) -> Self {
        self.hourly.retain(|hour, sites| *hour < 24 && !sites.is_empty());
        let mut summed: BTreeMap<SiteId, u64> = BTreeMap::new();
        for sites in self.hourly.values() {
            for (site, ms) in sites {
                *summed.entry(site.clone()).or_default() += ms;
            }
        }
        for (site, total) in &self.total {
            let hourly = summed.get(site).copied().unwrap_or(0);
            if *total > hourly {
                *self
                    .hourly
                    .entry(0)
                    .or_default()
                    .entry(site.clone())
                    .or_default() += total - hourly;
            }
        }
        for (site, hourly) in summed {
            let total = self.total.entry(site).or_default();
            if hourly > *total {
                *total = hourly;
            }
        }
        self
    }
}

/// On-disk bucket shapes, current and legacy.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredBucket {
    Structured(StructuredBucket),
    /// Releases before hourly tracking stored `{site: ms}` directly.
    Flat(StoredSites),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StructuredBucket {
    #[serde(default)]
    total: StoredSites,
    #[serde(default)]
    hourly: BTreeMap<u8, StoredSites>,
}

type StoredSites = BTreeMap<SiteId, StoredMs>;

/// A stored millisecond count. Older releases could persist negative or
/// fractional values; negatives read as zero and fractions are truncated.
#[derive(Deserialize)]
#[serde(from = "serde_json::Number")]
struct StoredMs(u64);

impl From<serde_json::Number> for StoredMs {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from(number: serde_json::Number) -> Self {
        let ms = number.as_u64().unwrap_or_else(|| {
            number
                .as_f64()
                .filter(|ms| ms.is_finite() && *ms > 0.0)
                .map_or(0, |ms| ms as u64)
        });
        Self(ms)
    }
}

/// Keeps the sites with time on them.
fn stored_sites(sites: StoredSites) -> BTreeMap<SiteId, u64> {
    sites
        .into_iter()
        .filter(|(_, ms)| ms.0 > 0)
        .map(|(site, ms)| (site, ms.0))
        .collect()
}

impl From<StoredBucket> for DayBucket {
    fn from(stored: StoredBucket) -> Self {
        let bucket = match stored {
            StoredBucket::Structured(StructuredBucket { total, hourly }) => Self {
                total: stored_sites(total),
                hourly: hourly
                    .into_iter()
                    .map(|(hour, sites)| (hour, stored_sites(sites)))
                    .collect(),
            },
            StoredBucket::Flat(total) => Self {
                total: stored_sites(total),
                hourly: BTreeMap::new(),
            },
        };
        bucket.heal()
    }
}

/// Snapshot of all aggregates, as handed to the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Aggregates {
    pub current: BTreeMap<DayKey, DayBucket>,
    pub historical: BTreeMap<DayKey, DayBucket>,
}

impl Aggregates {
    /// The bucket for `key`, preferring `current`. Absent days read as `None`.
    pub fn bucket(&self, key: DayKey) -> Option<&DayBucket> {
        self.current.get(&key).or_else(|| self.historical.get(&key))
    }

    /// Validates and credits one interval, splitting it at local midnight.
    ///
    /// Returns the milliseconds credited.
    pub(crate) fn accumulate(
        &mut self,
        site: &SiteId,
        start: &Instant,
        end: &Instant,
    ) -> Result<u64, TrackError> {
        let duration_ms = checked_duration_ms(site, start, end)?;
        let start_ms = start.timestamp_millis();
        let end_ms = end.timestamp_millis();

        let offset = end.timezone();
        let closing_day = DayKey::key_for(end);
        let mut piece_start_ms = start_ms;
        while piece_start_ms < end_ms {
            let piece_start = local_instant(&offset, piece_start_ms);
            let piece_end_ms = next_midnight_ms(&piece_start).map_or(end_ms, |m| m.min(end_ms));
            let last_ms = local_instant(&offset, piece_end_ms - 1);

            let key = DayKey::key_for(&last_ms);
            let hour = u8::try_from(last_ms.hour()).unwrap_or(0);
            let ms = u64::try_from(piece_end_ms - piece_start_ms).unwrap_or(0);
            self.bucket_mut(key, key == closing_day).add(site, hour, ms);

            piece_start_ms = piece_end_ms;
        }

        Ok(u64::try_from(duration_ms).unwrap_or(0))
    }

    /// Chooses where a day's time is written.
    ///
    /// Earlier days that were already closed are updated in place in
    /// `historical`. The closing day always lives in `current`; a stray
    /// historical copy is moved back.
    fn bucket_mut(&mut self, key: DayKey, closing_day: bool) -> &mut DayBucket {
        let in_current = self.current.contains_key(&key);
        if !closing_day && !in_current && self.historical.contains_key(&key) {
            return self.historical.entry(key).or_default();
        }
        if let Some(stale) = self.historical.remove(&key) {
            self.current.entry(key).or_insert(stale);
        }
        self.current.entry(key).or_default()
    }

    /// Moves every `current` day other than `today` into `historical`.
    ///
    /// The moved bucket replaces any historical entry for the same key. Empty
    /// buckets are dropped instead of archived. Returns true if anything
    /// changed.
    pub(crate) fn rollover(&mut self, today: DayKey) -> bool {
        let stale: Vec<DayKey> = self
            .current
            .keys()
            .filter(|key| **key != today)
            .copied()
            .collect();
        let mut changed = !stale.is_empty();

        for key in stale {
            if let Some(bucket) = self.current.remove(&key) {
                if bucket.is_empty() {
                    continue;
                }
                tracing::info!(day = %key, total_ms = bucket.day_total(), "closing day");
                self.historical.insert(key, bucket);
            }
        }

        if let Some(bucket) = self.historical.remove(&today) {
            self.current.entry(today).or_insert(bucket);
            changed = true;
        }
        if !self.current.contains_key(&today) {
            self.current.insert(today, DayBucket::default());
            changed = true;
        }
        changed
    }

    /// Drops historical days older than the retention window. Returns how many.
    pub(crate) fn trim(&mut self, now: &Instant, retention_days: u32) -> usize {
        let before = self.historical.len();
        self.historical
            .retain(|key, _| !key.is_older_than(retention_days, now));
        before - self.historical.len()
    }
}

/// Length of `start..end` in milliseconds, if it is an acceptable interval.
fn checked_duration_ms(site: &SiteId, start: &Instant, end: &Instant) -> Result<i64, TrackError> {
    let duration_ms = end.timestamp_millis() - start.timestamp_millis();
    let reason = if duration_ms <= 0 {
        DiscardReason::NotPositive
    } else if duration_ms > MAX_INTERVAL_MS {
        DiscardReason::TooLong
    } else {
        return Ok(duration_ms);
    };
    Err(TrackError::DiscardedInterval {
        site: site.to_string(),
        duration_ms,
        reason,
    })
}

fn local_instant(offset: &chrono::FixedOffset, ms: i64) -> Instant {
    DateTime::from_timestamp_millis(ms)
        .unwrap_or_default()
        .with_timezone(offset)
}

/// Milliseconds timestamp of the local midnight following `instant`.
fn next_midnight_ms(instant: &Instant) -> Option<i64> {
    let tomorrow = instant.date_naive().succ_opt()?;
    let midnight = instant
        .timezone()
        .from_local_datetime(&tomorrow.and_time(NaiveTime::MIN))
        .single()?;
    Some(midnight.timestamp_millis())
}

/// What a lenient load had to repair.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Entries stored under a non-canonical day key.
    pub rekeyed: usize,
    /// Entries whose key or bucket could not be read at all.
    pub dropped: usize,
    /// Days present in both maps; the `current` copy was kept.
    pub duplicates: usize,
}

impl LoadReport {
    pub const fn needs_rewrite(&self) -> bool {
        self.rekeyed > 0 || self.dropped > 0 || self.duplicates > 0
    }
}

/// Aggregates persisted in a [`KeyValueStore`].
#[derive(Debug)]
pub struct AggregateStore<S> {
    kv: S,
}

impl<S: KeyValueStore> AggregateStore<S> {
    pub const fn new(kv: S) -> Self {
        Self { kv }
    }

    pub const fn kv(&self) -> &S {
        &self.kv
    }

    pub(crate) const fn kv_mut(&mut self) -> &mut S {
        &mut self.kv
    }

    pub fn into_inner(self) -> S {
        self.kv
    }

    /// Read-only snapshot for the dashboard. Missing or unreadable data reads as empty.
    pub fn read_aggregates(&self) -> Result<Aggregates, TrackError> {
        self.load().map(|(aggregates, _)| aggregates)
    }

    /// Credits an interval to `site`.
    ///
    /// Invalid intervals are rejected with [`TrackError::DiscardedInterval`]
    /// before storage is touched.
    pub fn record_interval(
        &mut self,
        site: &SiteId,
        start: &Instant,
        end: &Instant,
    ) -> Result<u64, TrackError> {
        checked_duration_ms(site, start, end)?;

        let (mut aggregates, _) = self.load()?;
        let credited = aggregates.accumulate(site, start, end)?;
        self.save(&aggregates, None)?;
        tracing::debug!(%site, credited_ms = credited, "recorded interval");
        Ok(credited)
    }

    /// Closes every open day other than today's. Idempotent.
    pub fn rollover_if_needed(&mut self, now: &Instant) -> Result<bool, TrackError> {
        let today = DayKey::key_for(now);
        let (mut aggregates, _) = self.load()?;
        if !aggregates.rollover(today) {
            return Ok(false);
        }
        self.save(&aggregates, Some(today))?;
        Ok(true)
    }

    /// Deletes historical days older than `retention_days`. Idempotent.
    pub fn trim_historical(
        &mut self,
        now: &Instant,
        retention_days: u32,
    ) -> Result<usize, TrackError> {
        let (mut aggregates, _) = self.load()?;
        let removed = aggregates.trim(now, retention_days);
        if removed > 0 {
            tracing::info!(removed, retention_days, "trimmed historical days");
            self.save(&aggregates, None)?;
        }
        Ok(removed)
    }

    /// Drops today's bucket; history is untouched.
    pub fn reset_today(&mut self, now: &Instant) -> Result<(), TrackError> {
        let today = DayKey::key_for(now);
        let (mut aggregates, _) = self.load()?;
        aggregates.current.insert(today, DayBucket::default());
        self.save(&aggregates, Some(today))
    }

    /// Removes everything in the underlying store.
    pub fn reset_all_data(&mut self) -> Result<(), TrackError> {
        self.kv
            .clear()
            .map_err(|e| TrackError::storage("clear all data", e))
    }

    /// Rewrites legacy-format keys and repairs stored state once.
    pub fn migrate_keys(&mut self) -> Result<LoadReport, TrackError> {
        let (aggregates, report) = self.load()?;
        if report.needs_rewrite() {
            tracing::info!(
                rekeyed = report.rekeyed,
                dropped = report.dropped,
                duplicates = report.duplicates,
                "migrated stored aggregates"
            );
            self.save(&aggregates, None)?;
        }
        Ok(report)
    }

    fn load(&self) -> Result<(Aggregates, LoadReport), TrackError> {
        let mut values = self
            .kv
            .get(&[DAILY_DATA, HISTORICAL_DATA])
            .map_err(|e| TrackError::storage("load aggregates", e))?;

        let mut report = LoadReport::default();
        let current = parse_day_map(values.remove(DAILY_DATA), DAILY_DATA, &mut report);
        let mut historical =
            parse_day_map(values.remove(HISTORICAL_DATA), HISTORICAL_DATA, &mut report);

        let duplicated: Vec<DayKey> = historical
            .keys()
            .filter(|key| current.contains_key(key))
            .copied()
            .collect();
        for key in duplicated {
            historical.remove(&key);
            report.duplicates += 1;
        }

        Ok((Aggregates { current, historical }, report))
    }

    fn save(
        &mut self,
        aggregates: &Aggregates,
        current_date: Option<DayKey>,
    ) -> Result<(), TrackError> {
        let encode = |map: &BTreeMap<DayKey, DayBucket>| {
            serde_json::to_value(map).map_err(|e| TrackError::storage("encode aggregates", e))
        };
        let mut entries = BTreeMap::from([
            (DAILY_DATA.to_string(), encode(&aggregates.current)?),
            (HISTORICAL_DATA.to_string(), encode(&aggregates.historical)?),
        ]);
        if let Some(day) = current_date {
            entries.insert(CURRENT_DATE.to_string(), Value::String(day.to_string()));
        }
        self.kv
            .set(entries)
            .map_err(|e| TrackError::storage("save aggregates", e))
    }
}

/// Reads one stored day map, tolerating legacy keys and corrupt entries.
fn parse_day_map(
    value: Option<Value>,
    name: &str,
    report: &mut LoadReport,
) -> BTreeMap<DayKey, DayBucket> {
    let mut days = BTreeMap::new();
    let Some(value) = value else {
        return days;
    };
    let Value::Object(entries) = value else {
        tracing::warn!(key = name, "stored aggregates are not a map, ignoring");
        report.dropped += 1;
        return days;
    };

    for (raw_key, raw_bucket) in entries {
        let Ok(key) = DayKey::parse_legacy(&raw_key) else {
            tracing::warn!(key = name, day = %raw_key, "dropping entry with unreadable day key");
            report.dropped += 1;
            continue;
        };
        let bucket = match serde_json::from_value::<DayBucket>(raw_bucket) {
            Ok(bucket) => bucket,
            Err(error) => {
                tracing::warn!(key = name, day = %raw_key, %error, "dropping unreadable bucket");
                report.dropped += 1;
                continue;
            }
        };
        if key.to_string() != raw_key {
            report.rekeyed += 1;
        }
        match days.entry(key) {
            Entry::Occupied(mut existing) => existing.get_mut().merge(bucket),
            Entry::Vacant(slot) => {
                slot.insert(bucket);
            }
        }
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, FixedOffset};
    use serde_json::json;

    use crate::store::MemoryStore;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Instant {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, s)
            .unwrap()
    }

    fn ms(instant: Instant, ms: i64) -> Instant {
        instant + Duration::milliseconds(ms)
    }

    fn site(name: &str) -> SiteId {
        SiteId::new(name).unwrap()
    }

    fn day(key: &str) -> DayKey {
        DayKey::parse(key).unwrap()
    }

    #[test]
    fn valid_interval_credits_total_and_hour() {
        let mut aggregates = Aggregates::default();
        let t0 = at(2025, 1, 15, 9, 10, 0);

        let credited = aggregates.accumulate(&site("a.com"), &t0, &ms(t0, 5000)).unwrap();

        assert_eq!(credited, 5000);
        let bucket = aggregates.bucket(day("2025-01-15")).unwrap();
        assert_eq!(bucket.site_total(&site("a.com")), 5000);
        assert_eq!(bucket.hour_total(9, &site("a.com")), 5000);
        assert!(bucket.is_consistent());
    }

    #[test]
    fn repeated_intervals_accumulate() {
        let mut aggregates = Aggregates::default();
        let t0 = at(2025, 1, 15, 9, 59, 0);
        let durations = [1, 999, 60_000, 3_600_000];
        let mut start = t0;
        for duration in durations {
            let end = ms(start, duration);
            aggregates.accumulate(&site("a.com"), &start, &end).unwrap();
            start = end;
        }

        let bucket = aggregates.bucket(day("2025-01-15")).unwrap();
        assert_eq!(bucket.site_total(&site("a.com")), 3_661_000);
        assert!(bucket.is_consistent());
    }

    #[test]
    fn invalid_intervals_are_discarded_without_change() {
        let t0 = at(2025, 1, 15, 9, 0, 0);
        let cases = [
            (t0, t0, DiscardReason::NotPositive),
            (t0, ms(t0, -1000), DiscardReason::NotPositive),
            (t0, ms(t0, MAX_INTERVAL_MS + 1), DiscardReason::TooLong),
        ];
        for (start, end, expected) in cases {
            let mut aggregates = Aggregates::default();
            let result = aggregates.accumulate(&site("a.com"), &start, &end);
            match result {
                Err(TrackError::DiscardedInterval { reason, .. }) => assert_eq!(reason, expected),
                other => panic!("expected discard, got {other:?}"),
            }
            assert_eq!(aggregates, Aggregates::default());
        }
    }

    #[test]
    fn full_day_interval_is_accepted() {
        let mut aggregates = Aggregates::default();
        let start = at(2025, 1, 15, 0, 0, 0);
        let end = ms(start, MAX_INTERVAL_MS);

        aggregates.accumulate(&site("a.com"), &start, &end).unwrap();

        let bucket = aggregates.bucket(day("2025-01-15")).unwrap();
        assert_eq!(bucket.site_total(&site("a.com")), 86_400_000);
        assert_eq!(bucket.hour_total(23, &site("a.com")), 86_400_000);
        assert!(aggregates.bucket(day("2025-01-16")).is_none());
    }

    #[test]
    fn interval_across_midnight_is_split() {
        let mut aggregates = Aggregates::default();
        let start = at(2025, 1, 15, 23, 59, 50);
        let end = at(2025, 1, 16, 0, 0, 10);

        aggregates.accumulate(&site("a.com"), &start, &end).unwrap();

        let before = aggregates.bucket(day("2025-01-15")).unwrap();
        let after = aggregates.bucket(day("2025-01-16")).unwrap();
        assert_eq!(before.site_total(&site("a.com")), 10_000);
        assert_eq!(before.hour_total(23, &site("a.com")), 10_000);
        assert_eq!(after.site_total(&site("a.com")), 10_000);
        assert_eq!(after.hour_total(0, &site("a.com")), 10_000);
    }

    #[test]
    fn split_part_for_closed_day_updates_history_in_place() {
        let mut aggregates = Aggregates::default();
        aggregates
            .historical
            .insert(day("2025-01-15"), DayBucket::default());

        aggregates
            .accumulate(
                &site("a.com"),
                &at(2025, 1, 15, 23, 59, 59),
                &at(2025, 1, 16, 0, 0, 1),
            )
            .unwrap();

        assert_eq!(aggregates.historical[&day("2025-01-15")].day_total(), 1000);
        assert!(!aggregates.current.contains_key(&day("2025-01-15")));
        assert_eq!(aggregates.current[&day("2025-01-16")].day_total(), 1000);
    }

    #[test]
    fn rollover_moves_stale_days_and_is_idempotent() {
        let mut aggregates = Aggregates::default();
        let t0 = at(2025, 1, 15, 12, 0, 0);
        aggregates.accumulate(&site("a.com"), &t0, &ms(t0, 4000)).unwrap();

        let today = day("2025-01-16");
        assert!(aggregates.rollover(today));
        let once = aggregates.clone();
        assert!(!aggregates.rollover(today));

        assert_eq!(aggregates, once);
        assert_eq!(aggregates.current.len(), 1);
        assert!(aggregates.current[&today].is_empty());
        assert_eq!(
            aggregates.historical[&day("2025-01-15")].site_total(&site("a.com")),
            4000
        );
    }

    #[test]
    fn rollover_current_wins_over_historical() {
        let mut aggregates = Aggregates::default();
        let mut stale = DayBucket::default();
        stale.add(&site("old.com"), 3, 1);
        aggregates.historical.insert(day("2025-01-15"), stale);
        let mut fresh = DayBucket::default();
        fresh.add(&site("a.com"), 12, 7);
        aggregates.current.insert(day("2025-01-15"), fresh);

        aggregates.rollover(day("2025-01-16"));

        let closed = &aggregates.historical[&day("2025-01-15")];
        assert_eq!(closed.site_total(&site("a.com")), 7);
        assert_eq!(closed.site_total(&site("old.com")), 0);
    }

    #[test]
    fn rollover_pulls_today_out_of_history() {
        let mut aggregates = Aggregates::default();
        let mut bucket = DayBucket::default();
        bucket.add(&site("a.com"), 8, 500);
        aggregates.historical.insert(day("2025-01-16"), bucket);

        aggregates.rollover(day("2025-01-16"));

        assert!(aggregates.historical.is_empty());
        assert_eq!(aggregates.current[&day("2025-01-16")].day_total(), 500);
    }

    #[test]
    fn trim_respects_retention_boundary() {
        let now = at(2025, 3, 31, 12, 0, 0);
        for retention in [0u32, 1, 7, 30, 90] {
            let mut aggregates = Aggregates::default();
            let boundary = now.date_naive() - Duration::days(i64::from(retention));
            let keep = DayKey::from_date(boundary);
            let drop = DayKey::from_date(boundary - Duration::days(1));
            let ancient =
                DayKey::from_date(now.date_naive() - Duration::days(31 + i64::from(retention)));
            for key in [keep, drop, ancient] {
                let mut bucket = DayBucket::default();
                bucket.add(&site("a.com"), 1, 1);
                aggregates.historical.insert(key, bucket);
            }

            let removed = aggregates.trim(&now, retention);

            assert_eq!(removed, 2, "retention {retention}");
            assert!(aggregates.historical.contains_key(&keep));
            assert_eq!(aggregates.trim(&now, retention), 0);
        }
    }

    #[test]
    fn legacy_flat_bucket_is_healed_into_hour_zero() {
        let bucket: DayBucket = serde_json::from_value(json!({"github.com": 1200})).unwrap();
        assert_eq!(bucket.site_total(&site("github.com")), 1200);
        assert_eq!(bucket.hour_total(0, &site("github.com")), 1200);
        assert!(bucket.is_consistent());
    }

    #[test]
    fn negative_legacy_time_keeps_the_rest_of_the_day() {
        let bucket: DayBucket = serde_json::from_value(json!({
            "github.com": 1200,
            "a.com": -350,
            "b.com": 40.9
        }))
        .unwrap();
        assert_eq!(bucket.site_total(&site("github.com")), 1200);
        assert_eq!(bucket.site_total(&site("b.com")), 40);
        assert!(!bucket.total().contains_key(&site("a.com")));
        assert!(bucket.is_consistent());

        let bucket: DayBucket = serde_json::from_value(json!({
            "total": {"a.com": -5, "c.com": 10},
            "hourly": {"9": {"a.com": -5, "c.com": 10}}
        }))
        .unwrap();
        assert_eq!(bucket.total().len(), 1);
        assert_eq!(bucket.hour_total(9, &site("c.com")), 10);
    }

    #[test]
    fn inconsistent_bucket_is_healed() {
        let bucket: DayBucket = serde_json::from_value(json!({
            "total": {"a.com": 100, "b.com": 5},
            "hourly": {"9": {"a.com": 60, "b.com": 10}}
        }))
        .unwrap();
        assert_eq!(bucket.hour_total(0, &site("a.com")), 40);
        assert_eq!(bucket.site_total(&site("b.com")), 10);
        assert!(bucket.is_consistent());
    }

    #[test]
    fn bucket_serializes_with_hour_keys() {
        let mut bucket = DayBucket::default();
        bucket.add(&site("a.com"), 9, 1500);
        let value = serde_json::to_value(&bucket).unwrap();
        assert_eq!(
            value,
            json!({"total": {"a.com": 1500}, "hourly": {"9": {"a.com": 1500}}})
        );
    }

    #[test]
    fn store_records_and_reads_back() {
        let mut store = AggregateStore::new(MemoryStore::new());
        let t0 = at(2025, 1, 15, 14, 0, 0);

        store.record_interval(&site("a.com"), &t0, &ms(t0, 2500)).unwrap();
        store.record_interval(&site("a.com"), &ms(t0, 2500), &ms(t0, 3000)).unwrap();

        let aggregates = store.read_aggregates().unwrap();
        let bucket = &aggregates.current[&day("2025-01-15")];
        assert_eq!(bucket.site_total(&site("a.com")), 3000);
        assert_eq!(bucket.hour_total(14, &site("a.com")), 3000);
    }

    #[test]
    fn store_discard_leaves_storage_untouched() {
        let mut store = AggregateStore::new(MemoryStore::new());
        let t0 = at(2025, 1, 15, 14, 0, 0);

        let result = store.record_interval(&site("a.com"), &t0, &ms(t0, -5));

        assert!(matches!(result, Err(TrackError::DiscardedInterval { .. })));
        assert_eq!(store.kv().entries().count(), 0);
    }

    #[test]
    fn store_rollover_writes_current_date() {
        let mut store = AggregateStore::new(MemoryStore::new());
        let t0 = at(2025, 1, 15, 14, 0, 0);
        store.record_interval(&site("a.com"), &t0, &ms(t0, 1000)).unwrap();

        let next_day = at(2025, 1, 16, 0, 0, 1);
        assert!(store.rollover_if_needed(&next_day).unwrap());
        assert!(!store.rollover_if_needed(&next_day).unwrap());

        let values = store.kv().get(&[CURRENT_DATE]).unwrap();
        assert_eq!(values[CURRENT_DATE], json!("2025-01-16"));
        let aggregates = store.read_aggregates().unwrap();
        assert_eq!(aggregates.historical[&day("2025-01-15")].day_total(), 1000);
    }

    #[test]
    fn migrate_rewrites_legacy_keys_and_merges() {
        let mut kv = MemoryStore::new();
        kv.set(BTreeMap::from([
            (
                HISTORICAL_DATA.to_string(),
                json!({
                    "14/01/2025": {"total": {"a.com": 10}, "hourly": {"10": {"a.com": 10}}},
                    "1/14/2025": {"a.com": 5},
                    "garbage": {"a.com": 1},
                    "2025-01-13": "not a bucket"
                }),
            ),
            (
                DAILY_DATA.to_string(),
                json!({"15/01/2025": {"total": {"b.com": 3}, "hourly": {"11": {"b.com": 3}}}}),
            ),
        ]))
        .unwrap();
        let mut store = AggregateStore::new(kv);

        let report = store.migrate_keys().unwrap();

        assert_eq!(report.rekeyed, 3);
        assert_eq!(report.dropped, 2);
        let raw = store.kv().get(&[HISTORICAL_DATA, DAILY_DATA]).unwrap();
        assert_eq!(
            raw[HISTORICAL_DATA],
            json!({"2025-01-14": {
                "total": {"a.com": 15},
                "hourly": {"0": {"a.com": 5}, "10": {"a.com": 10}}
            }})
        );
        assert!(raw[DAILY_DATA].get("2025-01-15").is_some());
        assert!(!store.migrate_keys().unwrap().needs_rewrite());
    }

    #[test]
    fn load_resolves_duplicates_in_favour_of_current() {
        let mut kv = MemoryStore::new();
        kv.set(BTreeMap::from([
            (HISTORICAL_DATA.to_string(), json!({"2025-01-15": {"a.com": 1}})),
            (DAILY_DATA.to_string(), json!({"2025-01-15": {"a.com": 9}})),
        ]))
        .unwrap();
        let store = AggregateStore::new(kv);

        let aggregates = store.read_aggregates().unwrap();

        assert!(aggregates.historical.is_empty());
        assert_eq!(aggregates.current[&day("2025-01-15")].day_total(), 9);
    }
}
