//! Browser bridge: host events arrive as JSON lines.
//!
//! The companion extension writes one [`HostEvent`] per line, for example
//! `{"event":"tab_activated","window":1,"url":"https://github.com/x"}`.
//! The bridge remembers the last active tab URL it saw per window so the
//! session can resolve a window when focus moves to it.
//!
//! Line format, tagged by `event`:
//! - `tab_activated`: `window`, optional `url`
//! - `navigation_complete`: `window`, optional `url`, `active` (default true)
//! - `window_focus_changed`: `window`; `null`, absent or `-1` means no
//!   browser window has focus
//! - `idle_state_changed`: `state` of `active`, `idle` or `locked`
//! - `tick`, `suspend`: no fields

use std::collections::HashMap;

use wt_core::{Host, HostEvent, TrackError, WindowId};

/// Decodes event lines and answers active-tab lookups.
#[derive(Debug, Default)]
pub struct BridgeHost {
    active_tabs: HashMap<WindowId, Option<String>>,
}

impl BridgeHost {
    /// Parses one input line. Blank and malformed lines yield `None`.
    pub fn decode(&mut self, line: &str) -> Option<HostEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str::<HostEvent>(line) {
            Ok(event) => {
                self.observe(&event);
                Some(event)
            }
            Err(error) => {
                tracing::warn!(%error, line, "ignoring malformed host event");
                None
            }
        }
    }

    fn observe(&mut self, event: &HostEvent) {
        match event {
            HostEvent::TabActivated { window, url }
            | HostEvent::NavigationComplete {
                window,
                url,
                active: true,
            } => {
                self.active_tabs.insert(*window, url.clone());
            }
            _ => {}
        }
    }
}

impl Host for BridgeHost {
    fn active_tab_url(&self, window: WindowId) -> Result<Option<String>, TrackError> {
        self.active_tabs
            .get(&window)
            .cloned()
            .ok_or_else(|| TrackError::LookupFailure {
                window: window.to_string(),
                message: "no tab seen for this window".to_string(),
            })
    }
}
