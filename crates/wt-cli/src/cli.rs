//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Per-site web time tracker.
///
/// Turns browser focus, navigation and idle events into daily per-site
/// totals, and reports on them.
#[derive(Debug, Parser)]
#[command(name = "wt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Track activity from host events read as JSON lines on stdin.
    Run,

    /// Show today's time by category, site and hour.
    Today {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one day's time by category, site and hour.
    Day {
        /// The day, as YYYY-MM-DD.
        key: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show a month calendar of tracked time.
    Month {
        /// Year (defaults to the current year).
        #[arg(long)]
        year: Option<i32>,

        /// Month number 1-12 (defaults to the current month).
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
    },

    /// Manage domain category rules.
    #[command(subcommand)]
    Categories(CategoriesAction),

    /// Erase tracked data.
    Reset {
        /// Erase only today's data.
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        today: bool,

        /// Erase all days and category rules.
        #[arg(long)]
        all: bool,
    },

    /// Show storage and tracking status.
    Status,
}

/// Category rule actions.
#[derive(Debug, Subcommand)]
pub enum CategoriesAction {
    /// List category rules.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Assign a domain to a category.
    Set {
        /// Domain or domain fragment (e.g. `github.com`).
        domain: String,

        /// Category key (e.g. `WORK`).
        category: String,
    },

    /// Remove a domain rule.
    Remove {
        /// Domain of the rule to remove.
        domain: String,
    },
}
