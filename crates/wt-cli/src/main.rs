use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wt_cli::commands::{categories, day, month, reset, run, status};
use wt_cli::{CategoriesAction, Cli, Commands, Config};
use wt_core::{AggregateStore, CategoryResolver, Clock, DayKey, SystemClock, Tracker};
use wt_db::Database;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

/// Open the database and run startup maintenance.
fn start_tracker(config_path: Option<&Path>) -> Result<(Tracker<Database, SystemClock>, Config)> {
    let (db, config) = open_database(config_path)?;
    let tracker =
        Tracker::start(db, SystemClock, config.retention_days).context("failed to start tracker")?;
    Ok((tracker, config))
}

/// Open the database for reporting, without writing to it.
fn open_reports(
    config_path: Option<&Path>,
) -> Result<(AggregateStore<Database>, CategoryResolver)> {
    let (db, _config) = open_database(config_path)?;
    let resolver = CategoryResolver::load(&db).context("failed to read category rules")?;
    Ok((AggregateStore::new(db), resolver))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr; stdout carries command output
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config_path = cli.config.as_deref();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::Run) => {
            let (mut tracker, config) = start_tracker(config_path)?;
            run::run(&mut tracker, config.tick_interval())?;
        }
        Some(Commands::Today { json }) => {
            let (store, resolver) = open_reports(config_path)?;
            let aggregates = store.read_aggregates().context("failed to read aggregates")?;
            day::run(&mut out, &aggregates, &resolver, DayKey::today(&SystemClock), *json)?;
        }
        Some(Commands::Day { key, json }) => {
            let day_key = DayKey::parse(key)
                .with_context(|| format!("invalid day {key}, expected YYYY-MM-DD"))?;
            let (store, resolver) = open_reports(config_path)?;
            let aggregates = store.read_aggregates().context("failed to read aggregates")?;
            day::run(&mut out, &aggregates, &resolver, day_key, *json)?;
        }
        Some(Commands::Month { year, month: month_number }) => {
            let today = DayKey::today(&SystemClock);
            let (store, _resolver) = open_reports(config_path)?;
            let aggregates = store.read_aggregates().context("failed to read aggregates")?;
            month::run(
                &mut out,
                &aggregates,
                year.unwrap_or_else(|| today.year()),
                month_number.unwrap_or_else(|| today.month()),
                today,
            )?;
        }
        Some(Commands::Categories(action)) => {
            let (mut tracker, _config) = start_tracker(config_path)?;
            match action {
                CategoriesAction::List { json } => categories::list(&mut out, &tracker, *json)?,
                CategoriesAction::Set { domain, category } => {
                    categories::set(&mut out, &mut tracker, domain, category)?;
                }
                CategoriesAction::Remove { domain } => {
                    categories::remove(&mut out, &mut tracker, domain)?;
                }
            }
        }
        Some(Commands::Reset { today, all: _ }) => {
            let (mut tracker, _config) = start_tracker(config_path)?;
            let scope = if *today {
                reset::Scope::Today
            } else {
                reset::Scope::All
            };
            reset::run(&mut out, &mut tracker, scope)?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(config_path)?;
            let store = AggregateStore::new(db);
            status::run(&mut out, &store, &config, &SystemClock.now())?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    out.flush()?;
    Ok(())
}
