//! The tracker: session, aggregate store and category rules behind one owner.
//!
//! The scheduler holds a single [`Tracker`] and feeds it host events one at a
//! time. Dashboard and settings calls go through the same value, so no two
//! read-modify-write cycles on storage can interleave.

use std::collections::BTreeMap;

use crate::aggregate::{AggregateStore, Aggregates, LoadReport};
use crate::category::{CategoryResolver, CategoryRules};
use crate::clock::{Clock, Instant};
use crate::error::TrackError;
use crate::session::{ActivitySession, Host, HostEvent};
use crate::store::KeyValueStore;
use crate::types::{CategoryKey, SiteId};

/// Owns all tracking state for one browser profile.
#[derive(Debug)]
pub struct Tracker<S, C> {
    store: AggregateStore<S>,
    categories: CategoryResolver,
    session: ActivitySession,
    clock: C,
    retention_days: u32,
}

impl<S: KeyValueStore, C: Clock> Tracker<S, C> {
    /// Opens the tracker over `kv`.
    ///
    /// Runs the startup maintenance: legacy key migration, category seeding,
    /// rollover and retention trim.
    pub fn start(kv: S, clock: C, retention_days: u32) -> Result<Self, TrackError> {
        let mut store = AggregateStore::new(kv);
        let report: LoadReport = store.migrate_keys()?;
        if report.dropped > 0 {
            tracing::warn!(dropped = report.dropped, "discarded unreadable stored days");
        }

        let mut categories = CategoryResolver::load(store.kv())?;
        categories.seed_defaults(store.kv_mut())?;

        let now = clock.now();
        store.rollover_if_needed(&now)?;
        store.trim_historical(&now, retention_days)?;
        tracing::info!(retention_days, rules = categories.rules().len(), "tracker started");

        Ok(Self {
            store,
            categories,
            session: ActivitySession::new(),
            clock,
            retention_days,
        })
    }

    /// Applies one host event at the clock's current time.
    ///
    /// Never fails: errors are logged and the session recovers on its own.
    pub fn handle(&mut self, event: &HostEvent, host: &impl Host) {
        let now = self.clock.now();
        self.session.handle(event, &now, &mut self.store, host);
        if matches!(event, HostEvent::Tick) {
            self.maintain(&now);
        }
    }

    fn maintain(&mut self, now: &Instant) {
        match self.store.rollover_if_needed(now) {
            Ok(true) => tracing::info!(today = %now.date_naive(), "rolled over to a new day"),
            Ok(false) => {}
            Err(error) => tracing::warn!(%error, "rollover failed"),
        }
        if let Err(error) = self.store.trim_historical(now, self.retention_days) {
            tracing::warn!(%error, "retention trim failed");
        }
    }

    pub fn read_aggregates(&self) -> Result<Aggregates, TrackError> {
        self.store.read_aggregates()
    }

    pub const fn read_category_rules(&self) -> &CategoryRules {
        self.categories.rules()
    }

    /// Replaces the category override table.
    pub fn write_category_rules(
        &mut self,
        rules: BTreeMap<String, String>,
    ) -> Result<(), TrackError> {
        self.categories.write_rules(self.store.kv_mut(), rules)
    }

    pub fn set_category_rule(&mut self, domain: &str, category: &str) -> Result<(), TrackError> {
        self.categories.set_rule(self.store.kv_mut(), domain, category)
    }

    pub fn remove_category_rule(&mut self, domain: &str) -> Result<bool, TrackError> {
        self.categories.remove_rule(self.store.kv_mut(), domain)
    }

    pub fn category_for(&self, site: &SiteId) -> CategoryKey {
        self.categories.category_for(site)
    }

    pub const fn categories(&self) -> &CategoryResolver {
        &self.categories
    }

    /// Forgets today's time. The running interval keeps going.
    pub fn reset_today(&mut self) -> Result<(), TrackError> {
        let now = self.clock.now();
        self.store.reset_today(&now)?;
        tracing::info!(day = %now.date_naive(), "reset today's data");
        Ok(())
    }

    /// Erases every stored day and all category rules.
    ///
    /// The built-in rules are written back so categorization keeps working.
    pub fn reset_all_data(&mut self) -> Result<(), TrackError> {
        self.store.reset_all_data()?;
        self.categories = CategoryResolver::default();
        self.categories.seed_defaults(self.store.kv_mut())?;
        self.session = ActivitySession::new();
        tracing::info!("reset all data");
        Ok(())
    }

    pub const fn session(&self) -> &ActivitySession {
        &self.session
    }

    pub const fn store(&self) -> &AggregateStore<S> {
        &self.store
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    pub const fn retention_days(&self) -> u32 {
        self.retention_days
    }

    pub fn into_store(self) -> AggregateStore<S> {
        self.store
    }
}
