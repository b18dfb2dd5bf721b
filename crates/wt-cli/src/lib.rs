//! Web time tracker CLI library.
//!
//! This crate provides the CLI interface and the browser bridge for the
//! web time tracker.

pub mod bridge;
mod cli;
pub mod commands;
mod config;

pub use cli::{CategoriesAction, Cli, Commands};
pub use config::Config;
