//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The URL could not be parsed.
    #[error("invalid URL: {value}")]
    InvalidUrl { value: String },

    /// The URL has no trackable host (e.g. `about:blank`, `file://`).
    #[error("URL has no trackable host: {value}")]
    NoHost { value: String },
}

/// Generates a validated, normalized string newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal, $normalize:expr
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new value after normalization and validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let normalize: fn(&str) -> String = $normalize;
                let id = normalize(&id.into());
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A normalized hostname identifying a website (e.g. `github.com`).
    ///
    /// Lowercased, trimmed, without a trailing dot. Never carries a port, path or query.
    SiteId, "site", |s| s.trim().trim_end_matches('.').to_ascii_lowercase()
);

define_string_id!(
    /// A category key such as `WORK` or `OTHER`.
    ///
    /// Keys are stored upper case so `work` and `WORK` name the same category.
    CategoryKey, "category", |s| s.trim().to_ascii_uppercase()
);

impl SiteId {
    /// Derives the site from a navigated URL's host component.
    ///
    /// Only `http` and `https` pages are tracked; browser-internal pages,
    /// local files and the like have no site.
    pub fn from_url(raw: &str) -> Result<Self, ValidationError> {
        let parsed = url::Url::parse(raw).map_err(|_| ValidationError::InvalidUrl {
            value: raw.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::NoHost {
                value: raw.to_string(),
            });
        }
        match parsed.host_str() {
            Some(host) => Self::new(host),
            None => Err(ValidationError::NoHost {
                value: raw.to_string(),
            }),
        }
    }
}

impl CategoryKey {
    /// The sentinel category for sites no rule matches.
    pub fn other() -> Self {
        Self("OTHER".to_string())
    }

    /// Returns true for the `OTHER` sentinel.
    pub fn is_other(&self) -> bool {
        self.0 == "OTHER"
    }
}

/// A browser window identifier as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
