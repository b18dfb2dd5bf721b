//! Status command for showing what is stored.

use std::io::Write;

use anyhow::{Context, Result};

use wt_core::store::CURRENT_DATE;
use wt_core::{
    AggregateStore, CategoryResolver, DayKey, Instant, KeyValueStore, format_duration, lookup_day,
};
use wt_db::Database;

use crate::Config;

pub fn run<W: Write>(
    writer: &mut W,
    store: &AggregateStore<Database>,
    config: &Config,
    now: &Instant,
) -> Result<()> {
    let aggregates = store.read_aggregates().context("failed to read aggregates")?;
    let rules = CategoryResolver::load(store.kv()).context("failed to read category rules")?;
    let current_date = store
        .kv()
        .get(&[CURRENT_DATE])
        .context("failed to read current date")?
        .remove(CURRENT_DATE)
        .and_then(|value| value.as_str().map(str::to_string));

    writeln!(writer, "Web time tracker status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(
        writer,
        "Current date: {}",
        current_date.as_deref().unwrap_or("never rolled over")
    )?;

    let today = lookup_day(&aggregates, DayKey::key_for(now));
    writeln!(
        writer,
        "Today: {} across {} sites",
        format_duration(today.day_total()),
        today.total().len()
    )?;
    writeln!(
        writer,
        "Days: {} open, {} closed (kept for {} days)",
        aggregates.current.len(),
        aggregates.historical.len(),
        config.retention_days
    )?;
    writeln!(writer, "Category rules: {}", rules.rules().len())?;

    let stats = store.kv().key_stats()?;
    if stats.is_empty() {
        writeln!(writer, "No data stored.")?;
        return Ok(());
    }
    writeln!(writer, "Stored keys:")?;
    for stat in stats {
        writeln!(writer, "- {}: {} bytes", stat.key, stat.bytes)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::DateTime;
    use insta::assert_snapshot;
    use wt_core::SiteId;

    #[test]
    fn status_command_summarizes_storage() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("wt.db");
        let mut store = AggregateStore::new(Database::open(&db_path).unwrap());
        let start = DateTime::parse_from_rfc3339("2025-01-15T09:00:00+00:00").unwrap();
        let end = DateTime::parse_from_rfc3339("2025-01-15T09:01:30+00:00").unwrap();
        store
            .record_interval(&SiteId::new("github.com").unwrap(), &start, &end)
            .unwrap();

        let config = Config {
            database_path: db_path.clone(),
            ..Config::default()
        };
        let mut output = Vec::new();
        run(&mut output, &store, &config, &end).unwrap();

        let output = String::from_utf8(output).unwrap();
        let daily_bytes = store.kv().get(&["dailyData"]).unwrap()["dailyData"].to_string().len();
        let output = output
            .replace(&db_path.display().to_string(), "[TEMP]/wt.db")
            .replace(&format!("dailyData: {daily_bytes} bytes"), "dailyData: [N] bytes");
        assert_snapshot!(output, @r"
Web time tracker status
Database: [TEMP]/wt.db
Current date: never rolled over
Today: 1m 30s across 1 sites
Days: 1 open, 0 closed (kept for 30 days)
Category rules: 0
Stored keys:
- dailyData: [N] bytes
- historicalData: 2 bytes
");
    }

    #[test]
    fn status_on_empty_database() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("wt.db");
        let store = AggregateStore::new(Database::open(&db_path).unwrap());
        let config = Config {
            database_path: db_path,
            ..Config::default()
        };
        let now = DateTime::parse_from_rfc3339("2025-01-15T09:00:00+00:00").unwrap();
        let mut output = Vec::new();

        run(&mut output, &store, &config, &now).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Today: 0s across 0 sites\n"));
        assert!(output.ends_with("No data stored.\n"));
    }
}
