//! Erasing tracked data.

use std::io::Write;

use anyhow::{Context, Result};

use wt_core::{Clock, DayKey, KeyValueStore, Tracker};

/// What to erase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Today,
    All,
}

pub fn run<W: Write, S: KeyValueStore, C: Clock>(
    writer: &mut W,
    tracker: &mut Tracker<S, C>,
    scope: Scope,
) -> Result<()> {
    match scope {
        Scope::Today => {
            tracker.reset_today().context("failed to reset today's data")?;
            writeln!(writer, "Reset data for {}", DayKey::today(tracker.clock()))?;
        }
        Scope::All => {
            tracker.reset_all_data().context("failed to reset all data")?;
            writeln!(writer, "Reset all data; default category rules restored")?;
        }
    }
    Ok(())
}
