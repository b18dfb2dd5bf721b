//! Core domain logic for the web time tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Day keys: canonical, sortable per-day bucket identifiers
//! - Aggregates: per-site daily and hourly time with rollover and retention
//! - Categories: resolving sites to user or built-in categories
//! - Activity session: turning browser focus and idle events into intervals
//! - Summaries: read-only views the dashboard renders

pub mod aggregate;
pub mod category;
pub mod clock;
pub mod day_key;
mod error;
pub mod session;
pub mod store;
pub mod summary;
mod tracker;
pub mod types;

pub use aggregate::{
    AggregateStore, Aggregates, DEFAULT_RETENTION_DAYS, DayBucket, LoadReport, MAX_INTERVAL_MS,
};
pub use category::{
    BUILTIN_CATEGORIES, BuiltinCategory, CategoryResolver, CategoryRules, category_info,
};
pub use clock::{Clock, Instant, ManualClock, SystemClock};
pub use day_key::DayKey;
pub use error::{DiscardReason, StorageSource, TrackError};
pub use session::{ActivitySession, Host, HostEvent, IdleState, SessionState, WindowFocus};
pub use store::{KeyValueStore, MemoryStore};
pub use summary::{
    CalendarDay, MonthCalendar, category_totals, format_duration, lookup_day, month_calendar,
    sorted_sites,
};
pub use tracker::Tracker;
pub use types::{CategoryKey, SiteId, ValidationError, WindowId};
