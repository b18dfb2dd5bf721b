//! Day report: time by category, site and hour for one day.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use wt_core::{
    Aggregates, CategoryKey, CategoryResolver, DayKey, category_info, category_totals,
    format_duration, lookup_day, sorted_sites,
};

#[derive(Debug, Serialize)]
pub struct DayReport {
    pub day: DayKey,
    pub total_ms: u64,
    pub categories: Vec<CategoryLine>,
    pub sites: Vec<SiteLine>,
    pub hourly_ms: [u64; 24],
}

#[derive(Debug, Serialize)]
pub struct CategoryLine {
    pub key: CategoryKey,
    pub name: String,
    pub color: &'static str,
    pub ms: u64,
    pub percent: u64,
}

#[derive(Debug, Serialize)]
pub struct SiteLine {
    pub site: String,
    pub ms: u64,
    pub category: CategoryKey,
}

pub fn build(aggregates: &Aggregates, resolver: &CategoryResolver, day: DayKey) -> DayReport {
    let bucket = lookup_day(aggregates, day);
    let total_ms = bucket.day_total();

    let categories = category_totals(bucket.total(), resolver)
        .into_iter()
        .map(|(key, ms)| {
            let info = category_info(&key);
            let name = if info.key == key.as_str() {
                info.name.to_string()
            } else {
                key.to_string()
            };
            CategoryLine {
                name,
                color: info.color,
                ms,
                percent: percent(ms, total_ms),
                key,
            }
        })
        .collect();

    let sites = sorted_sites(bucket.total())
        .into_iter()
        .map(|(site, ms)| SiteLine {
            site: site.to_string(),
            ms,
            category: resolver.category_for(site),
        })
        .collect();

    DayReport {
        day,
        total_ms,
        categories,
        sites,
        hourly_ms: bucket.hour_totals(),
    }
}

/// Rounded share of `part` in `total`.
fn percent(part: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    (part * 100 + total / 2) / total
}

pub fn run<W: Write>(
    writer: &mut W,
    aggregates: &Aggregates,
    resolver: &CategoryResolver,
    day: DayKey,
    json: bool,
) -> Result<()> {
    let report = build(aggregates, resolver, day);

    if json {
        serde_json::to_writer_pretty(&mut *writer, &report)?;
        writeln!(writer)?;
        return Ok(());
    }

    if report.total_ms == 0 {
        writeln!(writer, "{}: no activity recorded", report.day)?;
        return Ok(());
    }

    writeln!(writer, "{}: {}", report.day, format_duration(report.total_ms))?;

    writeln!(writer)?;
    writeln!(writer, "Categories:")?;
    for line in &report.categories {
        writeln!(
            writer,
            "  {:<14} {:>8} {:>4}%",
            line.name,
            format_duration(line.ms),
            line.percent
        )?;
    }

    writeln!(writer)?;
    writeln!(writer, "Sites:")?;
    for line in &report.sites {
        writeln!(
            writer,
            "  {:<24} {:>8}  {}",
            line.site,
            format_duration(line.ms),
            line.category
        )?;
    }

    writeln!(writer)?;
    writeln!(writer, "Hours:")?;
    for (hour, ms) in report.hourly_ms.iter().enumerate().filter(|(_, ms)| **ms > 0) {
        writeln!(writer, "  {hour:02}:00 {:>8}", format_duration(*ms))?;
    }

    Ok(())
}
