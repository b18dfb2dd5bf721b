//! Month calendar of tracked time.

use std::io::Write;

use anyhow::Result;
use chrono::Datelike;

use wt_core::{Aggregates, DayKey, MonthCalendar, format_duration, month_calendar};

const WEEKDAYS: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];

pub fn run<W: Write>(
    writer: &mut W,
    aggregates: &Aggregates,
    year: i32,
    month: u32,
    today: DayKey,
) -> Result<()> {
    let calendar = month_calendar(aggregates, year, month, today)?;
    write_grid(writer, &calendar)?;

    let active: Vec<_> = calendar.days.iter().filter(|day| day.total_ms > 0).collect();
    writeln!(writer)?;
    if active.is_empty() {
        writeln!(writer, "No activity recorded.")?;
        return Ok(());
    }

    let total: u64 = active.iter().map(|day| day.total_ms).sum();
    let noun = if active.len() == 1 { "day" } else { "days" };
    writeln!(writer, "Total: {} over {} {noun}", format_duration(total), active.len())?;
    for day in active {
        let marker = if day.is_today { "  (today)" } else { "" };
        writeln!(writer, "  {} {:>8}{marker}", day.day, format_duration(day.total_ms))?;
    }
    Ok(())
}

fn write_grid<W: Write>(writer: &mut W, calendar: &MonthCalendar) -> Result<()> {
    let title = calendar
        .days
        .first()
        .map(|day| day.day.date().format("%B %Y").to_string())
        .unwrap_or_default();
    writeln!(writer, "{title}")?;

    let header: String = WEEKDAYS.iter().map(|name| format!("{name:>3} ")).collect();
    writeln!(writer, "{}", header.trim_end())?;

    let blanks = usize::try_from(calendar.leading_blanks).unwrap_or(0);
    let mut cells: Vec<String> = vec!["    ".to_string(); blanks];
    cells.extend(calendar.days.iter().map(|day| {
        let marker = if day.total_ms > 0 { '*' } else { ' ' };
        format!("{:>3}{marker}", day.day.date().day())
    }));

    for week in cells.chunks(7) {
        writeln!(writer, "{}", week.concat().trim_end())?;
    }
    Ok(())
}
