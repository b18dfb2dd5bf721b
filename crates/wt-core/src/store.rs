//! Persistent key/value storage seam.
//!
//! The engine only needs `get(keys)` and `set(map)` over JSON values. The
//! SQLite backend lives in `wt-db`; [`MemoryStore`] backs tests and dry runs.

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;

use serde_json::Value;

/// Key holding the open-day buckets (`current`).
pub const DAILY_DATA: &str = "dailyData";
/// Key holding the closed-day buckets (`historical`).
pub const HISTORICAL_DATA: &str = "historicalData";
/// Key holding the domain-to-category override table.
pub const DOMAIN_CATEGORIES: &str = "domainCategories";
/// Key holding the day the `current` map was last rolled over to.
pub const CURRENT_DATE: &str = "currentDate";

/// A fallible string-keyed store of JSON documents.
///
/// Implementations must apply each `set` atomically: either every entry is
/// written or none is.
pub trait KeyValueStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reads the given keys. Missing keys are absent from the result.
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, Self::Error>;

    /// Writes all entries, replacing existing values.
    fn set(&mut self, entries: BTreeMap<String, Value>) -> Result<(), Self::Error>;

    /// Removes every key.
    fn clear(&mut self) -> Result<(), Self::Error>;
}

/// In-memory store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates every stored key/value pair.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

impl KeyValueStore for MemoryStore {
    type Error = Infallible;

    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, Self::Error> {
        Ok(keys
            .iter()
            .filter_map(|key| {
                self.values
                    .get(*key)
                    .map(|value| ((*key).to_string(), value.clone()))
            })
            .collect())
    }

    fn set(&mut self, entries: BTreeMap<String, Value>) -> Result<(), Self::Error> {
        self.values.extend(entries);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.values.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn get_returns_only_present_keys() {
        let mut store = MemoryStore::new();
        store
            .set(BTreeMap::from([(CURRENT_DATE.to_string(), json!("2025-01-01"))]))
            .unwrap();

        let values = store.get(&[CURRENT_DATE, DAILY_DATA]).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[CURRENT_DATE], json!("2025-01-01"));
    }

    #[test]
    fn clear_removes_everything() {
        let mut store = MemoryStore::new();
        store
            .set(BTreeMap::from([
                (DAILY_DATA.to_string(), json!({})),
                (HISTORICAL_DATA.to_string(), json!({})),
            ]))
            .unwrap();
        store.clear().unwrap();
        assert_eq!(store.entries().count(), 0);
    }
}
