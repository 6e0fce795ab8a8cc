//! Route validation telemetry agent.
//!
//! Watches a GraphQL-based media router and reports, per monitored
//! destination, whether the live routed source matches the scheduled one.
//! Schedules come from a search/analytics backend; live state comes from
//! polling plus optional push subscriptions; deviations from the scheduled
//! primary source raise operator notifications.

pub mod agent;
pub mod auth;
pub mod config;
pub mod correlate;
pub mod domain;
pub mod events;
pub mod notify;
pub mod router;
pub mod schedule;
pub mod store;
pub mod tasks;
