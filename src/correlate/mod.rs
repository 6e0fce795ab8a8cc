//! Route validation: correlates live terminals against the schedule.
//!
//! Invoked per `(tag, edges, kind)` batch from the poller or the
//! subscriber. For each edge it resolves labels, classifies the routing
//! state against the schedule cache, advances the per-destination state
//! machine, tallies counters, and emits one event; each batch ends with a
//! summary event and a counter reconciliation (polls replace, push
//! notifications merge).

mod event;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::MappingConfig;
use crate::domain::{BusState, Counters, EventKind, RoutingState};
use crate::events::{Event, EventSink};
use crate::notify::{Details, MessageType, Notification, NotificationBuilder, Notifier};
use crate::router::Edge;
use crate::schedule::ScheduleCache;
use crate::store::{BusStateStore, CountersStore};

pub use event::{base_event, resolve_labels, Labels};

/// Correlator settings fixed at startup.
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    /// Nameset mapping; without it the correlator emits base events only.
    pub mapping: Option<MappingConfig>,
    /// Zorro fallback source label.
    pub zorro: String,
    /// TDA fallback source label.
    pub tda: String,
    /// Detector host reported in notifications.
    pub detector_host: String,
}

/// What one batch did, for logging and tests.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Edges that were classified against a schedule entry.
    pub processed: usize,
    /// Edges discarded by the exact-tag guard.
    pub discarded: usize,
    /// Edges whose destination had no schedule entry.
    pub unmatched: usize,
    /// Per-batch classification tallies.
    pub counters: Counters,
    /// Deviation/correction notifications raised by this batch.
    pub notifications: Vec<Notification>,
}

/// Outcome of one state-machine step, for an already-known destination.
struct SwapOutcome {
    prev: RoutingState,
    /// Start of the deviation window, when one is open.
    window_start: Option<DateTime<Utc>>,
}

/// The route-validation engine.
pub struct Correlator {
    config: CorrelatorConfig,
    schedule: ScheduleCache,
    bus_states: BusStateStore,
    counters: CountersStore,
    sink: Arc<dyn EventSink>,
    notifier: Option<Notifier>,
}

impl Correlator {
    pub fn new(
        config: CorrelatorConfig,
        schedule: ScheduleCache,
        bus_states: BusStateStore,
        counters: CountersStore,
        sink: Arc<dyn EventSink>,
        notifier: Option<Notifier>,
    ) -> Self {
        Self {
            config,
            schedule,
            bus_states,
            counters,
            sink,
            notifier,
        }
    }

    /// Process one batch of edges for a tag.
    pub async fn process_batch(
        &self,
        tag: &str,
        edges: &[Edge],
        kind: EventKind,
    ) -> BatchOutcome {
        let mut events: Vec<Event> = Vec::with_capacity(edges.len() + 1);
        let mut batch = Counters::default();
        let mut notifications: Vec<Notification> = Vec::new();

        let mut processed = 0usize;
        let mut discarded = 0usize;
        let mut unmatched = 0usize;

        for edge in edges {
            // The backend fuzz-matches the tags filter; only exact members
            // of the requested tag may be reported.
            if !edge.tags.iter().any(|t| t == tag) {
                discarded += 1;
                continue;
            }

            let mut event = base_event(edge, tag, kind);

            let Some(mapping) = &self.config.mapping else {
                events.push(event);
                continue;
            };

            let labels = resolve_labels(edge, mapping);
            event.put("destinationLabel", Value::String(labels.destination.clone()));
            event.put("sourceLabel", Value::String(labels.source.clone()));

            let Some(entry) = self.schedule.get(&labels.destination).await else {
                event.put("schedule", json!({ "matched": false }));
                unmatched += 1;
                events.push(event);
                continue;
            };

            let state = entry.classify(&labels.source, &self.config.zorro, &self.config.tda);
            batch.increment(state);
            processed += 1;

            event.put(
                "schedule",
                json!({ "matched": true, "status": state.as_str() }),
            );
            events.push(event);

            let now = Utc::now();
            let swap = self.step_state_machine(&labels.destination, state, now).await;

            if let Some(swap) = swap {
                if swap.prev != state {
                    if kind == EventKind::Notification {
                        // Optimistic decrement; the next full poll is the
                        // authoritative reconciliation.
                        batch.decrement(swap.prev);
                    }

                    if let Some(notification) =
                        self.transition_notification(&labels, swap, state, kind, now)
                    {
                        notifications.push(notification);
                    }
                }
            }
        }

        match kind {
            EventKind::Query => self.counters.replace(tag, batch).await,
            EventKind::Notification => self.counters.merge(tag, batch).await,
            EventKind::Summary => {}
        }

        events.push(summary_event(tag, processed, unmatched, discarded, &batch));
        self.sink.publish_all(events);

        if !notifications.is_empty() {
            if let Some(notifier) = &self.notifier {
                if let Err(err) = notifier.send(&notifications).await {
                    warn!(tag, "notification delivery incomplete: {err}");
                }
            }
        }

        debug!(
            tag,
            kind = %kind,
            processed,
            discarded,
            unmatched,
            "batch correlated"
        );

        BatchOutcome {
            processed,
            discarded,
            unmatched,
            counters: batch,
            notifications,
        }
    }

    /// Advance the destination's state machine under the store lock.
    ///
    /// Returns `None` on first observation (no previous state, no
    /// notification, no decrement).
    async fn step_state_machine(
        &self,
        destination: &str,
        state: RoutingState,
        now: DateTime<Utc>,
    ) -> Option<SwapOutcome> {
        self.bus_states
            .with_map(|map| match map.get_mut(destination) {
                None => {
                    map.insert(destination.to_string(), BusState::new(state));
                    None
                }
                Some(bus) => {
                    let prev = bus.swap(state);

                    let window_start = if prev == RoutingState::Primary
                        && state != RoutingState::Primary
                    {
                        bus.mark_transition(now);
                        Some(now)
                    } else if state == RoutingState::Primary {
                        let start = bus.transition;
                        bus.confirm_primary();
                        start
                    } else {
                        bus.transition
                    };

                    Some(SwapOutcome { prev, window_start })
                }
            })
            .await
    }

    /// Build the deviation or correction notification for a transition.
    fn transition_notification(
        &self,
        labels: &Labels,
        swap: SwapOutcome,
        state: RoutingState,
        kind: EventKind,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        let host = self.config.detector_host.clone();

        if swap.prev == RoutingState::Primary && state != RoutingState::Primary {
            let details = Details {
                status: state.as_str().to_string(),
                start: now.to_rfc3339(),
                end: String::new(),
                trigger: state.as_str().to_string(),
                event_type: kind.as_str().to_string(),
                source: labels.source.clone(),
                busname: labels.destination.clone(),
            };

            return Some(
                NotificationBuilder::new(host)
                    .with_message_by_type(MessageType::RouteValidationError)
                    .add_details(MessageType::RouteValidationError, details)
                    .build(),
            );
        }

        if state == RoutingState::Primary && swap.prev != RoutingState::Unknown {
            let details = Details {
                status: state.as_str().to_string(),
                start: swap
                    .window_start
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
                end: now.to_rfc3339(),
                trigger: swap.prev.as_str().to_string(),
                event_type: kind.as_str().to_string(),
                source: labels.source.clone(),
                busname: labels.destination.clone(),
            };

            return Some(
                NotificationBuilder::new(host)
                    .with_message_by_type(MessageType::RouteValidationCorrection)
                    .add_details(MessageType::RouteValidationCorrection, details)
                    .build(),
            );
        }

        None
    }
}

fn summary_event(
    tag: &str,
    processed: usize,
    unmatched: usize,
    discarded: usize,
    batch: &Counters,
) -> Event {
    let mut event = Event::new(EventKind::Summary);

    event.put("tag", Value::String(tag.to_string()));
    event.put("processed", json!(processed));
    event.put("unmatched", json!(unmatched));
    event.put("discarded", json!(discarded));
    event.put(RoutingState::Primary.as_str(), json!(batch.primary));
    event.put(RoutingState::Backup.as_str(), json!(batch.backup));
    event.put(RoutingState::Zorro.as_str(), json!(batch.zorro));
    event.put(RoutingState::Tda.as_str(), json!(batch.tda));
    event.put(RoutingState::Unscheduled.as_str(), json!(batch.unscheduled));

    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScheduleEntry;
    use crate::events::MemorySink;
    use std::collections::HashMap;

    fn edge(tags: &[&str], dest: &str, src: Option<&str>) -> Edge {
        let mut raw = json!({
            "id": format!("t-{dest}"),
            "name": format!("{dest}-OUT"),
            "tags": tags,
            "isSub": true,
            "isDst": true,
            "type": "audio",
            "namesetNames": [
                { "id": "n-1", "name": dest, "nameset": { "id": "ns-1", "name": "BUSCODES" } }
            ]
        });

        if let Some(src) = src {
            raw["routedPhysicalSource"] = json!({
                "id": format!("s-{src}"),
                "name": format!("{src}-OUT"),
                "isSrc": true,
                "namesetNames": [
                    { "id": "n-2", "name": src, "nameset": { "id": "ns-1", "name": "BUSCODES" } }
                ]
            });
        }

        serde_json::from_value(raw).unwrap()
    }

    struct Fixture {
        correlator: Correlator,
        schedule: ScheduleCache,
        bus_states: BusStateStore,
        counters: CountersStore,
        sink: Arc<MemorySink>,
    }

    fn fixture() -> Fixture {
        let schedule = ScheduleCache::new();
        let bus_states = BusStateStore::in_memory();
        let counters = CountersStore::new();
        let sink = Arc::new(MemorySink::new());

        let correlator = Correlator::new(
            CorrelatorConfig {
                mapping: Some(MappingConfig {
                    nameset: "BUSCODES".into(),
                    default: "UNKNOWN".into(),
                }),
                zorro: "ZZ".into(),
                tda: "TDA1".into(),
                detector_host: "test-host".into(),
            },
            schedule.clone(),
            bus_states.clone(),
            counters.clone(),
            sink.clone(),
            None,
        );

        Fixture {
            correlator,
            schedule,
            bus_states,
            counters,
            sink,
        }
    }

    async fn load_schedule(fx: &Fixture, buscode: &str, primary: &str, secondary: &str) {
        let mut map = HashMap::new();
        map.insert(
            buscode.to_string(),
            ScheduleEntry {
                primary: primary.into(),
                secondary: secondary.into(),
                start: None,
                end: None,
            },
        );
        fx.schedule.load(map).await;
    }

    #[tokio::test]
    async fn schedule_miss_emits_unmatched_event() {
        let fx = fixture();
        let edges = vec![edge(&["MES"], "MES1", Some("SRC-A"))];

        let outcome = fx
            .correlator
            .process_batch("MES", &edges, EventKind::Query)
            .await;

        assert_eq!(outcome.unmatched, 1);
        assert_eq!(outcome.processed, 0);
        assert_eq!(fx.counters.get("MES").await, Counters::default());

        let events = fx.sink.take();
        // One per-edge event plus the summary.
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].get("schedule"), Some(&json!({ "matched": false })));
        assert!(fx.bus_states.get("MES1").await.is_none());
    }

    #[tokio::test]
    async fn primary_match_classifies_and_counts() {
        let fx = fixture();
        load_schedule(&fx, "MES1", "SRC-A", "SRC-B").await;

        let edges = vec![edge(&["MES"], "MES1", Some("SRC-A"))];
        let outcome = fx
            .correlator
            .process_batch("MES", &edges, EventKind::Query)
            .await;

        assert_eq!(outcome.processed, 1);
        assert_eq!(fx.counters.get("MES").await.primary, 1);

        let events = fx.sink.take();
        assert_eq!(
            events[0].get("schedule"),
            Some(&json!({ "matched": true, "status": "Primary" }))
        );
        assert_eq!(
            fx.bus_states.get("MES1").await.unwrap().state,
            RoutingState::Primary
        );
    }

    #[tokio::test]
    async fn backup_and_fallback_matches() {
        let fx = fixture();
        load_schedule(&fx, "MES1", "SRC-A", "SRC-B").await;

        for (src, expected) in [
            ("SRC-B", "Backup"),
            ("ZZ", "Zorro"),
            ("TDA1", "TDA"),
            ("SRC-X", "UnscheduledAudio"),
        ] {
            let edges = vec![edge(&["MES"], "MES1", Some(src))];
            fx.correlator
                .process_batch("MES", &edges, EventKind::Query)
                .await;

            let events = fx.sink.take();
            assert_eq!(
                events[0].get("schedule").unwrap()["status"],
                json!(expected),
                "source {src}"
            );
        }
    }

    #[tokio::test]
    async fn tag_mismatch_discards_without_event() {
        let fx = fixture();
        load_schedule(&fx, "MES1", "SRC-A", "SRC-B").await;

        let edges = vec![edge(&["MES-EXT"], "MES1", Some("SRC-A"))];
        let outcome = fx
            .correlator
            .process_batch("MES", &edges, EventKind::Query)
            .await;

        assert_eq!(outcome.discarded, 1);
        assert_eq!(outcome.processed, 0);

        let events = fx.sink.take();
        // Only the summary.
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Summary);
        assert_eq!(events[0].get("discarded"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn notification_then_query_reconciles_counters() {
        let fx = fixture();
        load_schedule(&fx, "MES1", "SRC-A", "SRC-B").await;

        // Baseline poll: MES1 on Primary.
        let edges = vec![edge(&["MES"], "MES1", Some("SRC-A"))];
        fx.correlator
            .process_batch("MES", &edges, EventKind::Query)
            .await;
        assert_eq!(fx.counters.get("MES").await.primary, 1);

        // Push: MES1 now on Backup. Optimistic merge nets Primary down.
        let edges = vec![edge(&["MES"], "MES1", Some("SRC-B"))];
        let outcome = fx
            .correlator
            .process_batch("MES", &edges, EventKind::Notification)
            .await;

        assert_eq!(outcome.counters.primary, -1);
        assert_eq!(outcome.counters.backup, 1);

        let merged = fx.counters.get("MES").await;
        assert_eq!(merged.primary, 0);
        assert_eq!(merged.backup, 1);

        // The deviation raised a route-validation-error notification.
        assert_eq!(outcome.notifications.len(), 1);
        let n = &outcome.notifications[0];
        assert!(n.message.summary.contains("Route Validation Error"));
        assert_eq!(n.context.basic[0].details.busname, "MES1");
        assert_eq!(n.context.basic[0].details.status, "Backup");

        // Next full poll is authoritative; no lingering negatives.
        let edges = vec![edge(&["MES"], "MES1", Some("SRC-B"))];
        fx.correlator
            .process_batch("MES", &edges, EventKind::Query)
            .await;

        let after = fx.counters.get("MES").await;
        assert_eq!(after.primary, 0);
        assert_eq!(after.backup, 1);
    }

    #[tokio::test]
    async fn return_to_primary_raises_correction() {
        let fx = fixture();
        load_schedule(&fx, "MES1", "SRC-A", "SRC-B").await;

        let primary = vec![edge(&["MES"], "MES1", Some("SRC-A"))];
        let backup = vec![edge(&["MES"], "MES1", Some("SRC-B"))];

        fx.correlator
            .process_batch("MES", &primary, EventKind::Query)
            .await;
        fx.correlator
            .process_batch("MES", &backup, EventKind::Query)
            .await;

        let deviated = fx.bus_states.get("MES1").await.unwrap();
        assert!(deviated.transition.is_some());

        let outcome = fx
            .correlator
            .process_batch("MES", &primary, EventKind::Query)
            .await;

        assert_eq!(outcome.notifications.len(), 1);
        let n = &outcome.notifications[0];
        assert!(n.message.summary.contains("Route Validation Correction"));
        assert_eq!(n.context.basic[0].details.trigger, "Backup");
        assert!(!n.context.basic[0].details.start.is_empty());
        assert!(!n.context.basic[0].details.end.is_empty());
    }

    #[tokio::test]
    async fn three_primary_confirmations_heal_the_record() {
        let fx = fixture();
        load_schedule(&fx, "MES1", "SRC-A", "SRC-B").await;

        let primary = vec![edge(&["MES"], "MES1", Some("SRC-A"))];
        let backup = vec![edge(&["MES"], "MES1", Some("SRC-B"))];

        fx.correlator
            .process_batch("MES", &primary, EventKind::Query)
            .await;
        fx.correlator
            .process_batch("MES", &backup, EventKind::Query)
            .await;

        for _ in 0..3 {
            fx.correlator
                .process_batch("MES", &primary, EventKind::Query)
                .await;
        }

        let healed = fx.bus_states.get("MES1").await.unwrap();
        assert_eq!(healed.state, RoutingState::Primary);
        assert!(healed.transition.is_none());
        assert_eq!(healed.heals, 0);
    }

    #[tokio::test]
    async fn summary_counts_balance() {
        let fx = fixture();
        load_schedule(&fx, "MES1", "SRC-A", "SRC-B").await;
        load_schedule_extra(&fx).await;

        let edges = vec![
            edge(&["MES"], "MES1", Some("SRC-A")),
            edge(&["MES"], "MES2", Some("SRC-B")),
            edge(&["MES"], "MES3", Some("SRC-A")), // no schedule entry
            edge(&["OTHER"], "MES4", Some("SRC-A")), // wrong tag
        ];

        let outcome = fx
            .correlator
            .process_batch("MES", &edges, EventKind::Query)
            .await;

        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.unmatched, 1);
        assert_eq!(outcome.discarded, 1);

        let events = fx.sink.take();
        let summary = events.last().unwrap();
        assert_eq!(summary.kind, EventKind::Summary);

        let total: i64 = ["Primary", "Backup", "Zorro", "TDA", "UnscheduledAudio"]
            .iter()
            .map(|k| summary.get(k).and_then(Value::as_i64).unwrap())
            .sum();
        assert_eq!(total, summary.get("processed").and_then(Value::as_i64).unwrap());
    }

    async fn load_schedule_extra(fx: &Fixture) {
        let mut map = HashMap::new();
        map.insert(
            "MES1".to_string(),
            ScheduleEntry {
                primary: "SRC-A".into(),
                secondary: "SRC-B".into(),
                start: None,
                end: None,
            },
        );
        map.insert(
            "MES2".to_string(),
            ScheduleEntry {
                primary: "SRC-A".into(),
                secondary: "SRC-B".into(),
                start: None,
                end: None,
            },
        );
        fx.schedule.load(map).await;
    }

    #[tokio::test]
    async fn without_mapping_only_base_events_flow() {
        let schedule = ScheduleCache::new();
        let bus_states = BusStateStore::in_memory();
        let counters = CountersStore::new();
        let sink = Arc::new(MemorySink::new());

        let correlator = Correlator::new(
            CorrelatorConfig {
                mapping: None,
                zorro: String::new(),
                tda: String::new(),
                detector_host: "test-host".into(),
            },
            schedule,
            bus_states.clone(),
            counters.clone(),
            sink.clone(),
            None,
        );

        let edges = vec![edge(&["MES"], "MES1", Some("SRC-A"))];
        correlator
            .process_batch("MES", &edges, EventKind::Query)
            .await;

        let events = sink.take();
        assert_eq!(events.len(), 2);
        assert!(events[0].get("destinationLabel").is_none());
        assert!(events[0].get("schedule").is_none());
        assert_eq!(bus_states.len().await, 0);
    }

    #[tokio::test]
    async fn first_observation_raises_no_notification() {
        let fx = fixture();
        load_schedule(&fx, "MES1", "SRC-A", "SRC-B").await;

        // First sighting lands directly on Backup; that is not a
        // transition, just an initial observation.
        let edges = vec![edge(&["MES"], "MES1", Some("SRC-B"))];
        let outcome = fx
            .correlator
            .process_batch("MES", &edges, EventKind::Query)
            .await;

        assert!(outcome.notifications.is_empty());
        let bus = fx.bus_states.get("MES1").await.unwrap();
        assert_eq!(bus.state, RoutingState::Backup);
        assert!(bus.transition.is_none());
    }
}
