//! Site categorization.
//!
//! A site resolves to a category in this order:
//! 1. a user rule whose domain equals the site
//! 2. the longest user rule whose domain is a substring of the site
//! 3. the first built-in category listing a domain contained in the site
//! 4. `OTHER`
//!
//! Rules are loaded into memory once, so [`CategoryResolver::category_for`]
//! never touches storage.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::TrackError;
use crate::store::{DOMAIN_CATEGORIES, KeyValueStore};
use crate::types::{CategoryKey, SiteId, ValidationError};

/// A category shipped with the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinCategory {
    pub key: &'static str,
    pub name: &'static str,
    pub color: &'static str,
    pub domains: &'static [&'static str],
}

/// Built-in categories, in match priority order. `OTHER` is the fallback.
pub const BUILTIN_CATEGORIES: &[BuiltinCategory] = &[
    BuiltinCategory {
        key: "WORK",
        name: "Work",
        color: "#4CAF50",
        domains: &[
            "github.com",
            "gitlab.com",
            "stackoverflow.com",
            "jira.com",
            "docs.google.com",
            "slack.com",
            "notion.so",
        ],
    },
    BuiltinCategory {
        key: "ENTERTAINMENT",
        name: "Entertainment",
        color: "#FF5722",
        domains: &[
            "youtube.com",
            "netflix.com",
            "twitch.tv",
            "spotify.com",
            "reddit.com",
            "instagram.com",
            "facebook.com",
            "twitter.com",
        ],
    },
    BuiltinCategory {
        key: "LEARNING",
        name: "Learning",
        color: "#2196F3",
        domains: &[
            "coursera.org",
            "udemy.com",
            "edx.org",
            "medium.com",
            "wikipedia.org",
            "khan-academy.org",
            "freecodecamp.org",
        ],
    },
    BuiltinCategory {
        key: "PRODUCTIVITY",
        name: "Productivity",
        color: "#9C27B0",
        domains: &[
            "trello.com",
            "asana.com",
            "calendar.google.com",
            "drive.google.com",
            "dropbox.com",
            "evernote.com",
        ],
    },
    BuiltinCategory {
        key: "OTHER",
        name: "Other",
        color: "#757575",
        domains: &[],
    },
];

/// Display name and color for a category key.
///
/// Custom keys the user invented are presented like `OTHER`.
pub fn category_info(key: &CategoryKey) -> &'static BuiltinCategory {
    BUILTIN_CATEGORIES
        .iter()
        .find(|builtin| builtin.key == key.as_str())
        .unwrap_or(&BUILTIN_CATEGORIES[BUILTIN_CATEGORIES.len() - 1])
}

/// Domain fragment-to-category override table.
pub type CategoryRules = BTreeMap<String, CategoryKey>;

/// Normalizes a rule's domain the same way sites are normalized.
pub fn normalize_domain(domain: &str) -> Result<String, ValidationError> {
    let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return Err(ValidationError::Empty { field: "domain" });
    }
    Ok(domain)
}

/// Resolves sites to categories from an in-memory rule table.
#[derive(Debug, Clone, Default)]
pub struct CategoryResolver {
    rules: CategoryRules,
}

impl CategoryResolver {
    pub const fn new(rules: CategoryRules) -> Self {
        Self { rules }
    }

    /// Loads the override table. Malformed entries are skipped.
    pub fn load<S: KeyValueStore>(kv: &S) -> Result<Self, TrackError> {
        let mut values = kv
            .get(&[DOMAIN_CATEGORIES])
            .map_err(|e| TrackError::storage("load category rules", e))?;
        let rules = match values.remove(DOMAIN_CATEGORIES) {
            Some(Value::Object(entries)) => entries
                .into_iter()
                .filter_map(|(domain, category)| {
                    let parsed = normalize_domain(&domain).ok().zip(
                        category
                            .as_str()
                            .and_then(|category| CategoryKey::new(category).ok()),
                    );
                    if parsed.is_none() {
                        tracing::warn!(%domain, %category, "skipping malformed category rule");
                    }
                    parsed
                })
                .collect(),
            Some(other) => {
                tracing::warn!(value = %other, "category rules are not a map, ignoring");
                CategoryRules::new()
            }
            None => CategoryRules::new(),
        };
        Ok(Self { rules })
    }

    pub const fn rules(&self) -> &CategoryRules {
        &self.rules
    }

    pub fn category_for(&self, site: &SiteId) -> CategoryKey {
        let site = site.as_str();
        if let Some(category) = self.rules.get(site) {
            return category.clone();
        }

        let user_match = self
            .rules
            .iter()
            .filter(|(domain, _)| site.contains(domain.as_str()))
            .fold(None::<(&String, &CategoryKey)>, |best, candidate| match best {
                Some(best) if best.0.len() >= candidate.0.len() => Some(best),
                _ => Some(candidate),
            });
        if let Some((_, category)) = user_match {
            return category.clone();
        }

        BUILTIN_CATEGORIES
            .iter()
            .find(|builtin| builtin.domains.iter().any(|domain| site.contains(domain)))
            .and_then(|builtin| CategoryKey::new(builtin.key).ok())
            .unwrap_or_else(CategoryKey::other)
    }

    /// Adds built-in domains missing from the override table and persists it.
    ///
    /// Existing rules are never overwritten. Returns how many were added.
    pub fn seed_defaults<S: KeyValueStore>(&mut self, kv: &mut S) -> Result<usize, TrackError> {
        let mut seeded = self.rules.clone();
        let mut added = 0;
        for builtin in BUILTIN_CATEGORIES {
            for domain in builtin.domains {
                if !seeded.contains_key(*domain) {
                    seeded.insert((*domain).to_string(), CategoryKey::new(builtin.key)?);
                    added += 1;
                }
            }
        }
        if added > 0 {
            persist(kv, &seeded)?;
            self.rules = seeded;
            tracing::info!(added, "seeded default category rules");
        }
        Ok(added)
    }

    /// Replaces the whole override table, as saved from the settings view.
    pub fn write_rules<S: KeyValueStore>(
        &mut self,
        kv: &mut S,
        rules: BTreeMap<String, String>,
    ) -> Result<(), TrackError> {
        let mut normalized = CategoryRules::new();
        for (domain, category) in rules {
            normalized.insert(normalize_domain(&domain)?, CategoryKey::new(category)?);
        }
        persist(kv, &normalized)?;
        self.rules = normalized;
        Ok(())
    }

    /// Adds or replaces a single rule.
    pub fn set_rule<S: KeyValueStore>(
        &mut self,
        kv: &mut S,
        domain: &str,
        category: &str,
    ) -> Result<(), TrackError> {
        let mut updated = self.rules.clone();
        updated.insert(normalize_domain(domain)?, CategoryKey::new(category)?);
        persist(kv, &updated)?;
        self.rules = updated;
        Ok(())
    }

    /// Removes a rule. Returns false if there was none.
    pub fn remove_rule<S: KeyValueStore>(
        &mut self,
        kv: &mut S,
        domain: &str,
    ) -> Result<bool, TrackError> {
        let domain = normalize_domain(domain)?;
        if !self.rules.contains_key(&domain) {
            return Ok(false);
        }
        let mut updated = self.rules.clone();
        updated.remove(&domain);
        persist(kv, &updated)?;
        self.rules = updated;
        Ok(true)
    }
}

fn persist<S: KeyValueStore>(kv: &mut S, rules: &CategoryRules) -> Result<(), TrackError> {
    let value =
        serde_json::to_value(rules).map_err(|e| TrackError::storage("encode category rules", e))?;
    kv.set(BTreeMap::from([(DOMAIN_CATEGORIES.to_string(), value)]))
        .map_err(|e| TrackError::storage("save category rules", e))
}
