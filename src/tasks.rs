//! Background task loops.
//!
//! Every loop parks on the shared shutdown channel and an interval (or the
//! subscription stream); flipping the channel is the only way any of them
//! exits. Intervals use `MissedTickBehavior::Delay` so a slow backend
//! cannot cause tick pile-up.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::auth::TokenHandle;
use crate::correlate::Correlator;
use crate::domain::EventKind;
use crate::router::{RouterClient, TerminalSubscription};
use crate::schedule::{ScheduleCache, ScheduleClient};
use crate::store::BusStateStore;

/// Bus-state snapshot cadence.
const SNAPSHOT_PERIOD: Duration = Duration::from_secs(10 * 60);

/// Backoff between subscription reconnect attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Periodically refresh the schedule cache from the search backend.
///
/// The first fetch runs immediately; afterwards one per period. Transport
/// failures retry on the next tick; semantic empties and shape mismatches
/// leave the last-known-good cache in place.
pub fn spawn_schedule_refresher(
    client: ScheduleClient,
    cache: ScheduleCache,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("schedule refresher stopping");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    match client.fetch_schedule_map().await {
                        Ok(map) => {
                            cache.load(map).await;
                            let buscodes = cache.len().await;
                            debug!(buscodes, "schedule cache updated");
                        }
                        Err(err) if err.is_transport() => {
                            warn!("schedule fetch failed, retrying next tick: {err}");
                        }
                        Err(err) => {
                            warn!("schedule fetch produced no update: {err}");
                        }
                    }
                }
            }
        }
    })
}

/// Periodically snapshot the bus-state store, and once more on shutdown.
pub fn spawn_snapshotter(
    store: BusStateStore,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // Nothing worth snapshotting at startup; first tick lands one
        // period in.
        let mut ticker = interval_at(Instant::now() + SNAPSHOT_PERIOD, SNAPSHOT_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        if let Err(err) = store.snapshot().await {
                            warn!("final bus-state snapshot failed: {err}");
                        } else {
                            info!(path = %store.path().display(), "final bus-state snapshot written");
                        }
                        return;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(err) = store.snapshot().await {
                        warn!("bus-state snapshot failed: {err}");
                    }
                }
            }
        }
    })
}

/// Poll the routing API for one tag.
///
/// A failed or empty tick is skipped, never retried within the period.
pub fn spawn_poller(
    client: RouterClient,
    correlator: Arc<Correlator>,
    tag: String,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // First poll lands one period in, giving the schedule refresher a
        // head start.
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(tag = %tag, "poller stopping");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    let terminals = match client.fetch_terminals(&tag).await {
                        Ok(terminals) => terminals,
                        Err(err) => {
                            warn!(tag = %tag, "terminals query failed, skipping tick: {err}");
                            continue;
                        }
                    };

                    if terminals.total_count < 1 {
                        info!(tag = %tag, "terminals query returned no results");
                        continue;
                    }

                    correlator
                        .process_batch(&tag, &terminals.edges, EventKind::Query)
                        .await;
                }
            }
        }
    })
}

/// Hold a push subscription open for one tag.
///
/// Individual message failures are logged and the subscription keeps
/// running; a dropped connection reconnects after a short delay until
/// shutdown.
pub fn spawn_subscriber(
    ws_url: String,
    token: TokenHandle,
    correlator: Arc<Correlator>,
    tag: String,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if *shutdown.borrow() {
                return;
            }

            let bearer = token.get();

            let connect = tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(tag = %tag, "subscriber stopping");
                        return;
                    }
                    continue;
                }
                connect = TerminalSubscription::connect(&ws_url, bearer.as_deref(), &tag) => connect,
            };

            let mut subscription = match connect {
                Ok(subscription) => subscription,
                Err(err) => {
                    warn!(tag = %tag, "subscription connect failed: {err}");
                    tokio::select! {
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                return;
                            }
                        }
                        _ = sleep(RECONNECT_DELAY) => {}
                    }
                    continue;
                }
            };

            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!(tag = %tag, "subscriber stopping");
                            subscription.close().await;
                            return;
                        }
                    }
                    next = subscription.next_edges() => match next {
                        Some(Ok(edges)) => {
                            correlator
                                .process_batch(&tag, &edges, EventKind::Notification)
                                .await;
                        }
                        Some(Err(err)) => {
                            warn!(tag = %tag, "subscription message failed: {err}");
                        }
                        None => {
                            warn!(tag = %tag, "subscription ended, reconnecting");
                            break;
                        }
                    }
                }
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                _ = sleep(RECONNECT_DELAY) => {}
            }
        }
    })
}
