//! Activity session state machine.
//!
//! Tracks which site currently has the user's attention and since when.
//! Every transition away from a tracked site first closes the outgoing
//! interval into the [`AggregateStore`]; the store is passed in explicitly so
//! the owner decides how writes are serialized.
//!
//! # States
//!
//! - `Idle`: nothing is being timed (no focused window, non-web page, user
//!   away, or a lookup failed)
//! - `Tracking`: a site has been focused since `since`
//!
//! Failures never leave the machine half-updated: a lookup error forces
//! `Idle` and the in-flight interval is dropped; store errors are logged
//! and the interval start is reset anyway.

use serde::{Deserialize, Deserializer, Serialize};

use crate::aggregate::AggregateStore;
use crate::clock::Instant;
use crate::error::TrackError;
use crate::store::KeyValueStore;
use crate::types::{SiteId, WindowId};

/// System idle detector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleState {
    Active,
    Idle,
    Locked,
}

/// An event delivered by the browser host, or the periodic timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// The user switched to another tab.
    TabActivated {
        window: WindowId,
        #[serde(default)]
        url: Option<String>,
    },
    /// A tab finished loading.
    NavigationComplete {
        window: WindowId,
        #[serde(default)]
        url: Option<String>,
        /// Whether the tab is the active one in its window.
        #[serde(default = "default_active")]
        active: bool,
    },
    /// Browser window focus moved; `None` means no browser window is focused.
    ///
    /// Accepts `null`, an absent field, or the browser's `-1` for "no window".
    WindowFocusChanged {
        #[serde(default, deserialize_with = "focused_window")]
        window: Option<WindowId>,
    },
    IdleStateChanged {
        state: IdleState,
    },
    /// Periodic flush timer.
    Tick,
    /// The browser is shutting down.
    Suspend,
}

const fn default_active() -> bool {
    true
}

fn focused_window<'de, D>(deserializer: D) -> Result<Option<WindowId>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<i64>::deserialize(deserializer)? {
        Some(id) if id < 0 => Ok(None),
        Some(id) => u32::try_from(id)
            .map(|id| Some(WindowId(id)))
            .map_err(|_| serde::de::Error::custom(format!("window id out of range: {id}"))),
        None => Ok(None),
    }
}

/// Queries the session needs to make of the browser.
pub trait Host {
    /// URL of the active tab in `window`; `Ok(None)` when the tab has no URL yet.
    fn active_tab_url(&self, window: WindowId) -> Result<Option<String>, TrackError>;
}

/// Whether a site is being timed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Tracking { site: SiteId, since: Instant },
}

/// Which browser window has focus, as far as the session knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFocus {
    /// No focus event seen yet; the first tab event's window is adopted.
    Unknown,
    Window(WindowId),
    /// Focus left the browser.
    None,
}

/// In-memory tracking state. Never persisted; a restart begins idle.
#[derive(Debug)]
pub struct ActivitySession {
    state: SessionState,
    focus: WindowFocus,
    user_idle: bool,
    /// Site to resume when the user comes back or focus returns.
    resume_site: Option<SiteId>,
    last_flush: Option<Instant>,
}

impl Default for ActivitySession {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivitySession {
    pub const fn new() -> Self {
        Self {
            state: SessionState::Idle,
            focus: WindowFocus::Unknown,
            user_idle: false,
            resume_site: None,
            last_flush: None,
        }
    }

    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    pub const fn active_site(&self) -> Option<&SiteId> {
        match &self.state {
            SessionState::Tracking { site, .. } => Some(site),
            SessionState::Idle => None,
        }
    }

    pub const fn interval_start(&self) -> Option<&Instant> {
        match &self.state {
            SessionState::Tracking { since, .. } => Some(since),
            SessionState::Idle => None,
        }
    }

    /// When an interval was last credited to the store.
    pub const fn last_flush(&self) -> Option<&Instant> {
        self.last_flush.as_ref()
    }

    pub const fn focus(&self) -> WindowFocus {
        self.focus
    }

    pub const fn is_user_idle(&self) -> bool {
        self.user_idle
    }

    /// Applies one event at `now`.
    pub fn handle<S: KeyValueStore>(
        &mut self,
        event: &HostEvent,
        now: &Instant,
        store: &mut AggregateStore<S>,
        host: &impl Host,
    ) {
        match event {
            HostEvent::TabActivated { window, url } => {
                self.on_tab(*window, url.as_deref(), now, store);
            }
            HostEvent::NavigationComplete {
                window,
                url,
                active,
            } => {
                if *active {
                    self.on_tab(*window, url.as_deref(), now, store);
                }
            }
            HostEvent::WindowFocusChanged { window } => {
                self.on_window_focus(*window, now, store, host);
            }
            HostEvent::IdleStateChanged { state } => self.on_idle_state(*state, now, store),
            HostEvent::Tick => self.flush(now, store),
            HostEvent::Suspend => {
                self.close(now, store);
            }
        }
    }

    fn on_tab<S: KeyValueStore>(
        &mut self,
        window: WindowId,
        url: Option<&str>,
        now: &Instant,
        store: &mut AggregateStore<S>,
    ) {
        match self.focus {
            WindowFocus::Window(focused) if focused != window => {
                tracing::debug!(%window, %focused, "ignoring tab event from unfocused window");
                return;
            }
            WindowFocus::None => {
                tracing::debug!(%window, "ignoring tab event while browser is unfocused");
                return;
            }
            WindowFocus::Unknown => self.focus = WindowFocus::Window(window),
            WindowFocus::Window(_) => {}
        }

        let site = url.and_then(site_for_url);
        if self.user_idle {
            self.resume_site = site;
            return;
        }
        self.close(now, store);
        self.start(site, now);
    }

    fn on_window_focus<S: KeyValueStore>(
        &mut self,
        window: Option<WindowId>,
        now: &Instant,
        store: &mut AggregateStore<S>,
        host: &impl Host,
    ) {
        let closed = self.close(now, store);
        let Some(window) = window else {
            self.focus = WindowFocus::None;
            self.resume_site = None;
            return;
        };
        self.focus = WindowFocus::Window(window);

        match host.active_tab_url(window) {
            Ok(url) => {
                let site = url.as_deref().and_then(site_for_url);
                if self.user_idle {
                    self.resume_site = site;
                } else {
                    self.start(site, now);
                }
            }
            Err(error) => {
                tracing::warn!(%error, ?closed, "active tab lookup failed, going idle");
                self.state = SessionState::Idle;
                self.resume_site = None;
            }
        }
    }

    fn on_idle_state<S: KeyValueStore>(
        &mut self,
        state: IdleState,
        now: &Instant,
        store: &mut AggregateStore<S>,
    ) {
        match state {
            IdleState::Active => {
                self.user_idle = false;
                if matches!(self.state, SessionState::Tracking { .. }) {
                    self.flush(now, store);
                } else if self.focus != WindowFocus::None {
                    let site = self.resume_site.take();
                    self.start(site, now);
                }
            }
            IdleState::Idle | IdleState::Locked => {
                let closed = self.close(now, store);
                if closed.is_some() {
                    self.resume_site = closed;
                }
                self.user_idle = true;
                tracing::debug!(?state, "user away, tracking paused");
            }
        }
    }

    /// Credits the running interval and keeps timing the same site.
    fn flush<S: KeyValueStore>(&mut self, now: &Instant, store: &mut AggregateStore<S>) {
        if let Some(site) = self.close(now, store) {
            self.start(Some(site), now);
        }
    }

    fn start(&mut self, site: Option<SiteId>, now: &Instant) {
        self.state = match site {
            Some(site) => SessionState::Tracking { site, since: *now },
            None => SessionState::Idle,
        };
    }

    /// Ends the running interval, crediting it to the store. Always leaves
    /// the session `Idle` and returns the site that was being tracked.
    fn close<S: KeyValueStore>(
        &mut self,
        now: &Instant,
        store: &mut AggregateStore<S>,
    ) -> Option<SiteId> {
        let SessionState::Tracking { site, since } =
            std::mem::replace(&mut self.state, SessionState::Idle)
        else {
            return None;
        };

        match store.record_interval(&site, &since, now) {
            Ok(_) => self.last_flush = Some(*now),
            Err(TrackError::DiscardedInterval { duration_ms: 0, .. }) => {}
            Err(error @ TrackError::DiscardedInterval { .. }) => {
                tracing::warn!(%error, "interval discarded");
            }
            Err(error) => {
                tracing::warn!(%error, %site, "failed to record interval, time lost");
            }
        }
        Some(site)
    }
}

fn site_for_url(url: &str) -> Option<SiteId> {
    match SiteId::from_url(url) {
        Ok(site) => Some(site),
        Err(error) => {
            tracing::debug!(%error, "page is not tracked");
            None
        }
    }
}
