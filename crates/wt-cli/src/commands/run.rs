//! The tracking loop.
//!
//! Reads host events from stdin and a periodic flush tick, and feeds both
//! to one [`Tracker`] in arrival order on a single-threaded runtime. Storage
//! calls are synchronous, so one event is fully applied before the next is
//! looked at.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::time::MissedTickBehavior;

use wt_core::{Clock, HostEvent, KeyValueStore, Tracker};

use crate::bridge::BridgeHost;

/// Counters reported when the loop ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    pub events: usize,
    pub ticks: usize,
    pub rejected: usize,
}

/// Runs the loop over stdin until EOF or Ctrl-C.
///
/// Returns without waiting for stdin to close.
pub fn run<S: KeyValueStore, C: Clock>(
    tracker: &mut Tracker<S, C>,
    tick: Duration,
) -> Result<LoopStats> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    let stats = runtime.block_on(async {
        let shutdown = async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::warn!(%error, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };
        serve(tokio::io::stdin(), tracker, tick, shutdown).await
    });
    // A pending stdin read blocks a runtime drop until the next line arrives.
    runtime.shutdown_background();
    stats
}

/// Feeds events from `input` and ticks into `tracker` until `input` ends or
/// `shutdown` resolves. The running interval is closed before returning.
pub async fn serve<R, S, C, F>(
    input: R,
    tracker: &mut Tracker<S, C>,
    tick: Duration,
    shutdown: F,
) -> Result<LoopStats>
where
    R: AsyncRead + Unpin,
    S: KeyValueStore,
    C: Clock,
    F: Future<Output = ()>,
{
    let mut lines = BufReader::new(input).lines();
    let mut bridge = BridgeHost::default();
    let mut stats = LoopStats::default();

    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    tokio::pin!(shutdown);
    tracing::info!(tick_ms = tick.as_millis(), "tracking started");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read host events")? else {
                    tracing::info!("input closed");
                    break;
                };
                match bridge.decode(&line) {
                    Some(event) => {
                        tracing::debug!(?event, "host event");
                        tracker.handle(&event, &bridge);
                        stats.events += 1;
                    }
                    None if line.trim().is_empty() => {}
                    None => stats.rejected += 1,
                }
            }
            _ = ticker.tick() => {
                tracker.handle(&HostEvent::Tick, &bridge);
                stats.ticks += 1;
            }
            () = &mut shutdown => {
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    tracker.handle(&HostEvent::Suspend, &bridge);
    tracing::info!(
        events = stats.events,
        ticks = stats.ticks,
        rejected = stats.rejected,
        "tracking stopped"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;

    use chrono::{DateTime, Duration as ChronoDuration};
    use wt_core::{DayKey, Instant, MemoryStore, SiteId};

    /// Long enough that no tick fires during a test.
    const SLOW_TICK: Duration = Duration::from_secs(3600);

    /// Moves forward one second every time it is read.
    struct SteppingClock {
        now: Cell<Instant>,
    }

    impl Clock for SteppingClock {
        fn now(&self) -> Instant {
            let now = self.now.get();
            self.now.set(now + ChronoDuration::seconds(1));
            now
        }
    }

    fn tracker() -> Tracker<MemoryStore, SteppingClock> {
        let clock = SteppingClock {
            now: Cell::new(DateTime::parse_from_rfc3339("2025-01-15T10:00:00+00:00").unwrap()),
        };
        Tracker::start(MemoryStore::new(), clock, 30).unwrap()
    }

    fn site_total(tracker: &Tracker<MemoryStore, SteppingClock>, site: &str) -> u64 {
        let aggregates = tracker.read_aggregates().unwrap();
        let day = DayKey::parse("2025-01-15").unwrap();
        aggregates.current[&day].site_total(&SiteId::new(site).unwrap())
    }

    #[tokio::test]
    async fn events_are_applied_in_order_and_closed_at_eof() {
        let mut tracker = tracker();
        let input = concat!(
            r#"{"event":"tab_activated","window":1,"url":"https://github.com/a"}"#,
            "\n",
            "\n",
            "garbage\n",
            r#"{"event":"tab_activated","window":1,"url":"https://youtube.com/watch"}"#,
            "\n",
        );

        let stats = serve(input.as_bytes(), &mut tracker, SLOW_TICK, std::future::pending())
            .await
            .unwrap();

        assert_eq!(
            stats,
            LoopStats {
                events: 2,
                ticks: 0,
                rejected: 1
            }
        );
        assert_eq!(site_total(&tracker, "github.com"), 1000);
        assert_eq!(site_total(&tracker, "youtube.com"), 1000);
        assert!(tracker.session().active_site().is_none());
    }

    #[tokio::test]
    async fn focus_change_resolves_tab_seen_earlier() {
        let mut tracker = tracker();
        let input = concat!(
            r#"{"event":"tab_activated","window":2,"url":"https://docs.rs/"}"#,
            "\n",
            r#"{"event":"window_focus_changed","window":1}"#,
            "\n",
            r#"{"event":"window_focus_changed","window":2}"#,
            "\n",
        );

        serve(input.as_bytes(), &mut tracker, SLOW_TICK, std::future::pending())
            .await
            .unwrap();

        // One second before focus moves to the unknown window, one after it returns.
        assert_eq!(site_total(&tracker, "docs.rs"), 2000);
        assert!(tracker.session().active_site().is_none());
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let mut tracker = tracker();
        let (_writer, reader) = tokio::io::duplex(64);

        let stats = serve(reader, &mut tracker, SLOW_TICK, async {})
            .await
            .unwrap();

        assert_eq!(stats, LoopStats::default());
    }
}
