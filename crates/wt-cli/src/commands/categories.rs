//! Category rule management.

use std::io::Write;

use anyhow::{Context, Result};

use wt_core::category::normalize_domain;
use wt_core::{Clock, KeyValueStore, Tracker, category_info};

pub fn list<W: Write, S: KeyValueStore, C: Clock>(
    writer: &mut W,
    tracker: &Tracker<S, C>,
    json: bool,
) -> Result<()> {
    let rules = tracker.read_category_rules();

    if json {
        serde_json::to_writer_pretty(&mut *writer, rules)?;
        writeln!(writer)?;
        return Ok(());
    }

    if rules.is_empty() {
        writeln!(writer, "No category rules.")?;
        return Ok(());
    }

    for (domain, category) in rules {
        let info = category_info(category);
        if info.key == category.as_str() {
            writeln!(writer, "{domain:<24} {category} ({})", info.name)?;
        } else {
            writeln!(writer, "{domain:<24} {category}")?;
        }
    }
    Ok(())
}

pub fn set<W: Write, S: KeyValueStore, C: Clock>(
    writer: &mut W,
    tracker: &mut Tracker<S, C>,
    domain: &str,
    category: &str,
) -> Result<()> {
    tracker
        .set_category_rule(domain, category)
        .with_context(|| format!("failed to set category for {domain}"))?;
    let domain = normalize_domain(domain)?;
    let category = tracker
        .read_category_rules()
        .get(&domain)
        .map_or_else(|| category.to_string(), ToString::to_string);
    writeln!(writer, "{domain} is now {category}")?;
    Ok(())
}

pub fn remove<W: Write, S: KeyValueStore, C: Clock>(
    writer: &mut W,
    tracker: &mut Tracker<S, C>,
    domain: &str,
) -> Result<()> {
    let removed = tracker
        .remove_category_rule(domain)
        .with_context(|| format!("failed to remove category for {domain}"))?;
    if removed {
        writeln!(writer, "Removed rule for {domain}")?;
    } else {
        writeln!(writer, "No rule for {domain}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::DateTime;
    use wt_core::{ManualClock, MemoryStore};

    fn tracker(clock: &ManualClock) -> Tracker<MemoryStore, &ManualClock> {
        Tracker::start(MemoryStore::new(), clock, 30).unwrap()
    }

    fn clock() -> ManualClock {
        ManualClock::new(DateTime::parse_from_rfc3339("2025-01-15T10:00:00+00:00").unwrap())
    }

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn list_shows_seeded_rules_with_names() {
        let clock = clock();
        let tracker = tracker(&clock);
        let mut buf = Vec::new();

        list(&mut buf, &tracker, false).unwrap();

        let text = output(buf);
        assert!(text.contains("github.com               WORK (Work)\n"));
        assert!(text.contains("twitch.tv                ENTERTAINMENT (Entertainment)\n"));
    }

    #[test]
    fn set_normalizes_and_reports() {
        let clock = clock();
        let mut tracker = tracker(&clock);
        let mut buf = Vec::new();

        set(&mut buf, &mut tracker, "News.YCombinator.com", "learning").unwrap();

        assert_eq!(output(buf), "news.ycombinator.com is now LEARNING\n");
    }

    #[test]
    fn set_rejects_empty_domain() {
        let clock = clock();
        let mut tracker = tracker(&clock);
        let mut buf = Vec::new();

        let err = set(&mut buf, &mut tracker, "  ", "WORK").unwrap_err();

        assert!(err.to_string().contains("failed to set category"));
    }

    #[test]
    fn remove_reports_missing_rule() {
        let clock = clock();
        let mut tracker = tracker(&clock);
        let mut buf = Vec::new();

        remove(&mut buf, &mut tracker, "github.com").unwrap();
        remove(&mut buf, &mut tracker, "github.com").unwrap();

        assert_eq!(output(buf), "Removed rule for github.com\nNo rule for github.com\n");
    }

    #[test]
    fn list_json_is_a_map() {
        let clock = clock();
        let tracker = tracker(&clock);
        let mut buf = Vec::new();

        list(&mut buf, &tracker, true).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["notion.so"], "WORK");
    }
}
