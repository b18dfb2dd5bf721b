//! Error taxonomy for the time-accounting engine.
//!
//! None of these are fatal to the process. Event handlers log them and
//! carry on; the worst outcome is a few seconds of untracked time.

use thiserror::Error;

use crate::types::ValidationError;

/// Boxed storage-layer error, so the engine stays generic over backends.
pub type StorageSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the time-accounting engine.
#[derive(Debug, Error)]
pub enum TrackError {
    /// An interval was rejected instead of accumulated.
    #[error("discarded interval for {site}: {reason} ({duration_ms} ms)")]
    DiscardedInterval {
        site: String,
        duration_ms: i64,
        reason: DiscardReason,
    },

    /// The persistent key/value store could not be read or written.
    #[error("storage unavailable while trying to {operation}")]
    StorageUnavailable {
        operation: &'static str,
        #[source]
        source: StorageSource,
    },

    /// A day-key did not match any known format.
    #[error("invalid date key: {key}")]
    InvalidDateKey { key: String },

    /// The host could not report the active tab of a window.
    #[error("lookup failed for window {window}: {message}")]
    LookupFailure { window: String, message: String },

    /// A category rule supplied by the settings UI was malformed.
    #[error("invalid category rule: {0}")]
    InvalidRule(#[from] ValidationError),
}

/// Why an interval candidate was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// End was at or before start (clock went backwards, or zero length).
    NotPositive,
    /// Longer than a day; usually system sleep or a stale start instant.
    TooLong,
}

impl std::fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPositive => write!(f, "non-positive duration"),
            Self::TooLong => write!(f, "longer than one day"),
        }
    }
}

impl TrackError {
    pub(crate) fn storage<E>(operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::StorageUnavailable {
            operation,
            source: Box::new(source),
        }
    }
}
