//! CLI subcommand implementations.

pub mod categories;
pub mod day;
pub mod month;
pub mod reset;
pub mod run;
pub mod status;
